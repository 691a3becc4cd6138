//! S-52 color palette.
//!
//! Colors are addressed by the 5-character tokens of the presentation library
//! (`DEPDW`, `LITRD`, `NODTA`, ...). The table below is the IHO day-bright
//! palette; a palette reload swaps the table and flags every cached symbol
//! for rebuild.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    pub fn normalize(&self) -> [f32; 4] {
        [
            self.0[0] as f32 / 255.0,
            self.0[1] as f32 / 255.0,
            self.0[2] as f32 / 255.0,
            self.0[3] as f32 / 255.0,
        ]
    }

    pub fn to_array(&self) -> [u8; 4] {
        self.0
    }

    /// Per-channel complement, used for the text drop shadow.
    pub fn opposite(&self) -> Self {
        Self([255 - self.0[0], 255 - self.0[1], 255 - self.0[2], self.0[3]])
    }

    pub fn with_alpha(&self, a: u8) -> Self {
        Self([self.0[0], self.0[1], self.0[2], a])
    }
}

// IHO S-52 DAY_BRIGHT table (CIE converted to sRGB). Order is irrelevant;
// lookup is linear over this short list.
const DAY_BRIGHT: &[(&str, [u8; 3])] = &[
    ("NODTA", [163, 180, 183]),
    ("CURSR", [235, 125, 54]),
    ("CHBLK", [7, 7, 7]),
    ("CHGRD", [125, 137, 140]),
    ("CHGRF", [163, 180, 183]),
    ("CHRED", [228, 33, 56]),
    ("CHGRN", [67, 189, 7]),
    ("CHYLW", [244, 218, 23]),
    ("CHMGD", [197, 69, 195]),
    ("CHMGF", [211, 166, 233]),
    ("CHBRN", [158, 121, 58]),
    ("CHWHT", [250, 250, 250]),
    ("SCLBR", [235, 125, 54]),
    ("CHCOR", [235, 125, 54]),
    ("LITRD", [228, 33, 56]),
    ("LITGN", [67, 189, 7]),
    ("LITYW", [244, 218, 23]),
    ("ISDNG", [197, 69, 195]),
    ("DNGHL", [228, 33, 56]),
    ("TRFCD", [197, 69, 195]),
    ("TRFCF", [211, 166, 233]),
    ("LANDA", [201, 185, 122]),
    ("LANDF", [158, 121, 58]),
    ("CSTLN", [82, 90, 92]),
    ("SNDG1", [125, 137, 140]),
    ("SNDG2", [7, 7, 7]),
    ("DEPSC", [82, 90, 92]),
    ("DEPCN", [125, 137, 140]),
    ("DEPDW", [255, 255, 255]),
    ("DEPMD", [216, 240, 245]),
    ("DEPMS", [187, 226, 240]),
    ("DEPVS", [156, 210, 234]),
    ("DEPIT", [141, 183, 153]),
    ("RADHI", [67, 189, 7]),
    ("RADLO", [49, 133, 0]),
    ("ARPAT", [36, 121, 82]),
    ("NINFO", [235, 125, 54]),
    ("RESBL", [36, 80, 224]),
    ("ADINF", [167, 154, 12]),
    ("RESGR", [125, 137, 140]),
    ("SHIPS", [7, 7, 7]),
    ("PSTRK", [7, 7, 7]),
    ("SYTRK", [125, 137, 140]),
    ("PLRTE", [220, 64, 37]),
    ("APLRT", [235, 125, 54]),
    ("UINFD", [7, 7, 7]),
    ("UINFF", [125, 137, 140]),
    ("UIBCK", [250, 250, 250]),
    ("UIAFD", [156, 210, 234]),
    ("UINFR", [228, 33, 56]),
    ("UINFG", [67, 189, 7]),
    ("UINFO", [235, 125, 54]),
    ("UINFB", [36, 80, 224]),
    ("UINFM", [197, 69, 195]),
    ("UIBDR", [125, 137, 140]),
    ("UIAFF", [201, 185, 122]),
    ("OUTLW", [7, 7, 7]),
    ("OUTLL", [201, 185, 122]),
    ("RES01", [163, 180, 183]),
    ("RES02", [163, 180, 183]),
    ("RES03", [163, 180, 183]),
    ("BKAJ1", [7, 7, 7]),
    ("BKAJ2", [44, 44, 44]),
];

/// Look up a color token in the active palette. Unknown tokens fall back to
/// `NODTA` so a stale presentation library cannot blank the chart.
pub fn palette(token: &str) -> Color {
    for (name, rgb) in DAY_BRIGHT {
        if *name == token {
            return Color::rgb(rgb[0], rgb[1], rgb[2]);
        }
    }
    log::warn!("unknown color token {token:?}, substituting NODTA");
    Color::rgb(163, 180, 183)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tokens_resolve() {
        assert_eq!(palette("DEPDW"), Color::rgb(255, 255, 255));
        assert_eq!(palette("LITRD"), Color::rgb(228, 33, 56));
        assert_eq!(palette("CHBLK"), Color::rgb(7, 7, 7));
    }

    #[test]
    fn unknown_token_falls_back_to_nodta() {
        assert_eq!(palette("ZZZZZ"), palette("NODTA"));
    }

    #[test]
    fn opposite_is_involutive() {
        let c = palette("LITRD");
        assert_eq!(c.opposite().opposite(), c);
    }
}
