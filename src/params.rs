//! Mariner parameter registry.
//!
//! A keyed-number store for the runtime toggles the S-52 presentation model
//! exposes to the mariner (IMO PS 1.2). The engine treats these as stable for
//! the duration of a frame; the host mutates them between frames.

/// Keys of the mariner parameter registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum MarParam {
    /// Anti-aliased rendering of lines and symbol edges.
    Antialias,
    /// Show text commands (TE/TX). 0 disables all text.
    ShowText,
    /// Two's-complement bitmask of suppressed text view groups.
    TextViewGroupFilter,
    /// Render area patterns (AP).
    AreaPattern,
    /// Render the DRGARE dredged-area pattern.
    DispDrgArePattern,
    /// Search for an inside point when the area centroid falls outside.
    DispCentroids,
    /// Draw light sectors at their nominal range (VALNMR).
    FullSectors,
    /// Vector stabilization: 0 none, 1 ground, 2 water.
    VecStab,
    /// Vector length in minutes for ownship/vessel course vectors.
    VecMul,
    /// Ship outline threshold behavior (draw scaled silhouette over symbol).
    ShipsOutline,
    /// Drop-shadow under text.
    UseTxtShadow,
    /// Dotpitch override in millimeters for X (0 = use display value).
    DotpitchMmX,
    /// Dotpitch override in millimeters for Y (0 = use display value).
    DotpitchMmY,
    /// Display-priority override for mariner objects.
    PrioOverride,
    /// Number of entries; keep last.
    _Count,
}

const N_PARAM: usize = MarParam::_Count as usize;

/// Read-mostly keyed-number store with S-52 defaults.
#[derive(Debug, Clone)]
pub struct MarinerParams {
    values: [f64; N_PARAM],
}

impl Default for MarinerParams {
    fn default() -> Self {
        let mut values = [0.0; N_PARAM];
        values[MarParam::Antialias as usize] = 1.0;
        values[MarParam::ShowText as usize] = 1.0;
        values[MarParam::AreaPattern as usize] = 1.0;
        values[MarParam::DispCentroids as usize] = 0.0;
        values[MarParam::DispDrgArePattern as usize] = 1.0;
        values[MarParam::VecMul as usize] = 6.0;
        values[MarParam::ShipsOutline as usize] = 1.0;
        values[MarParam::UseTxtShadow as usize] = 1.0;
        Self { values }
    }
}

impl MarinerParams {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, key: MarParam) -> f64 {
        self.values[key as usize]
    }

    #[inline]
    pub fn set(&mut self, key: MarParam, value: f64) {
        self.values[key as usize] = value;
    }

    /// Boolean view of a toggle parameter.
    #[inline]
    pub fn is_on(&self, key: MarParam) -> bool {
        self.values[key as usize] != 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_s52_presentation() {
        let params = MarinerParams::new();
        assert!(params.is_on(MarParam::ShowText));
        assert!(params.is_on(MarParam::AreaPattern));
        assert!(!params.is_on(MarParam::DispCentroids));
        assert_eq!(params.get(MarParam::VecStab), 0.0);
    }

    #[test]
    fn set_get_roundtrip() {
        let mut params = MarinerParams::new();
        params.set(MarParam::VecStab, 2.0);
        assert_eq!(params.get(MarParam::VecStab), 2.0);
        assert!(params.is_on(MarParam::VecStab));
    }
}
