//! Glyph atlas and text layout.
//!
//! At init a UTF-8 glyph range is rasterized into a single 512×512 alpha
//! texture at four font sizes (base, +6, +12, +18 points). Layout produces a
//! packed vertex buffer of six `(x, y, z, s, t)` vertices per glyph; the pen
//! advances with per-glyph kerning, and a newline drops a line and steps the
//! size class down one. The engine draws the same buffer twice when the text
//! drop shadow is enabled.

use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use ahash::{HashMap, HashMapExt};

use crate::error::{Result, S52Error};

pub const ATLAS_SIZE: u32 = 512;
pub const SIZE_CLASSES: usize = 4;

/// Packed text vertex, matching the text pipeline's vertex layout.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TextVertex {
    pub position: [f32; 3],
    pub tex: [f32; 2],
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct GlyphEntry {
    /// u0, v0, u1, v1 in the atlas.
    pub uv: [f32; 4],
    /// Horizontal bearing (px_bounds.min.x).
    pub left: f32,
    /// Vertical bearing above the baseline (screen-style px_bounds.min.y).
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub advance: f32,
}

/// Row-based packer over the single atlas page.
struct AtlasPacker {
    size: u32,
    x: u32,
    y: u32,
    row_height: u32,
}

impl AtlasPacker {
    fn new(size: u32) -> Self {
        Self {
            size,
            x: 0,
            y: 0,
            row_height: 0,
        }
    }

    /// One pixel of padding between entries keeps linear sampling clean.
    fn pack(&mut self, w: u32, h: u32) -> Option<(u32, u32)> {
        let (pw, ph) = (w + 1, h + 1);
        if self.x + pw > self.size {
            self.x = 0;
            self.y += self.row_height;
            self.row_height = 0;
        }
        if self.y + ph > self.size || pw > self.size {
            return None;
        }
        let slot = (self.x, self.y);
        self.x += pw;
        self.row_height = self.row_height.max(ph);
        Some(slot)
    }
}

pub struct TextAtlas {
    /// R8 coverage, `ATLAS_SIZE`² bytes, row-major.
    pub(crate) pixels: Vec<u8>,
    pub(crate) entries: HashMap<(char, u8), GlyphEntry>,
    pub(crate) line_height: [f32; SIZE_CLASSES],
    /// Kerning source; synthetic test atlases have none.
    font: Option<(FontArc, [f32; SIZE_CLASSES])>,
}

impl TextAtlas {
    /// Rasterize the printable Latin-1 range at the four size classes. The
    /// host supplies the font bytes; there is no file or fontconfig lookup
    /// in here.
    pub fn from_font_bytes(font_data: &[u8], base_px: f32) -> Result<Self> {
        let font = FontArc::try_from_vec(font_data.to_vec())
            .map_err(|e| S52Error::ShaderCompile(format!("font parse: {e}")))?;

        let mut pixels = vec![0u8; (ATLAS_SIZE * ATLAS_SIZE) as usize];
        let mut entries = HashMap::new();
        let mut packer = AtlasPacker::new(ATLAS_SIZE);
        let mut line_height = [0.0f32; SIZE_CLASSES];
        let mut px_sizes = [0.0f32; SIZE_CLASSES];

        for class in 0..SIZE_CLASSES {
            let px = base_px + 6.0 * class as f32;
            px_sizes[class] = px;
            let scale = PxScale::from(px);
            let scaled = font.as_scaled(scale);
            line_height[class] = scaled.ascent() - scaled.descent() + scaled.line_gap();

            for code in 0x20u32..=0xFF {
                let Some(ch) = char::from_u32(code) else {
                    continue;
                };
                let gid = font.glyph_id(ch);
                let advance = scaled.h_advance(gid);
                let glyph = gid.with_scale_and_position(scale, point(0.0, 0.0));
                let Some(outline) = font.outline_glyph(glyph) else {
                    // whitespace and undefined glyphs still advance the pen
                    entries.insert(
                        (ch, class as u8),
                        GlyphEntry {
                            uv: [0.0; 4],
                            left: 0.0,
                            top: 0.0,
                            width: 0.0,
                            height: 0.0,
                            advance,
                        },
                    );
                    continue;
                };
                let bounds = outline.px_bounds();
                let w = bounds.width().ceil() as u32;
                let h = bounds.height().ceil() as u32;
                let Some((ax, ay)) = packer.pack(w, h) else {
                    log::warn!("glyph atlas full at {ch:?} size class {class}");
                    break;
                };
                outline.draw(|gx, gy, cov| {
                    let px_x = ax + gx;
                    let px_y = ay + gy;
                    if px_x < ATLAS_SIZE && px_y < ATLAS_SIZE {
                        let idx = (px_y * ATLAS_SIZE + px_x) as usize;
                        pixels[idx] = pixels[idx].max((cov * 255.0) as u8);
                    }
                });
                let inv = 1.0 / ATLAS_SIZE as f32;
                entries.insert(
                    (ch, class as u8),
                    GlyphEntry {
                        uv: [
                            ax as f32 * inv,
                            ay as f32 * inv,
                            (ax + w) as f32 * inv,
                            (ay + h) as f32 * inv,
                        ],
                        left: bounds.min.x,
                        top: bounds.min.y,
                        width: w as f32,
                        height: h as f32,
                        advance,
                    },
                );
            }
        }

        Ok(Self {
            pixels,
            entries,
            line_height,
            font: Some((font, px_sizes)),
        })
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn line_height(&self, size_class: u8) -> f32 {
        self.line_height[(size_class as usize).min(SIZE_CLASSES - 1)]
    }

    fn kern(&self, prev: char, next: char, size_class: u8) -> f32 {
        let Some((font, px_sizes)) = &self.font else {
            return 0.0;
        };
        let scale = PxScale::from(px_sizes[(size_class as usize).min(SIZE_CLASSES - 1)]);
        let scaled = font.as_scaled(scale);
        scaled.kern(font.glyph_id(prev), font.glyph_id(next))
    }

    /// Lay out `text` with the anchor pen at `(x, y, z)` (Y up), appending
    /// six vertices per visible glyph to `out`. Returns the final pen
    /// position. A newline resets X, drops one line height and steps the
    /// size class down.
    pub fn layout(
        &self,
        text: &str,
        mut size_class: u8,
        x: f32,
        y: f32,
        z: f32,
        out: &mut Vec<TextVertex>,
    ) -> (f32, f32) {
        let mut pen_x = x;
        let mut pen_y = y;
        let mut prev: Option<char> = None;

        for ch in text.chars() {
            if ch == '\n' {
                pen_x = x;
                pen_y -= self.line_height(size_class);
                size_class = size_class.saturating_sub(1);
                prev = None;
                continue;
            }
            let Some(entry) = self
                .entries
                .get(&(ch, size_class.min(SIZE_CLASSES as u8 - 1)))
            else {
                prev = Some(ch);
                continue;
            };
            if let Some(p) = prev {
                pen_x += self.kern(p, ch, size_class);
            }
            if entry.width > 0.0 && entry.height > 0.0 {
                let x0 = pen_x + entry.left;
                let x1 = x0 + entry.width;
                let y1 = pen_y - entry.top; // glyph top, Y up
                let y0 = y1 - entry.height;
                let [u0, v0, u1, v1] = entry.uv;
                let quad = [
                    ([x0, y0, z], [u0, v1]),
                    ([x1, y0, z], [u1, v1]),
                    ([x0, y1, z], [u0, v0]),
                    ([x0, y1, z], [u0, v0]),
                    ([x1, y0, z], [u1, v1]),
                    ([x1, y1, z], [u1, v0]),
                ];
                for (position, tex) in quad {
                    out.push(TextVertex { position, tex });
                }
            }
            pen_x += entry.advance;
            prev = Some(ch);
        }
        (pen_x, pen_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_atlas() -> TextAtlas {
        let mut entries = HashMap::new();
        for class in 0..SIZE_CLASSES as u8 {
            for ch in ['A', 'B', 'i'] {
                entries.insert(
                    (ch, class),
                    GlyphEntry {
                        uv: [0.0, 0.0, 0.1, 0.1],
                        left: 1.0,
                        top: -8.0,
                        width: if ch == 'i' { 2.0 } else { 6.0 },
                        height: 8.0,
                        advance: if ch == 'i' { 3.0 } else { 7.0 },
                    },
                );
            }
            entries.insert(
                (' ', class),
                GlyphEntry {
                    uv: [0.0; 4],
                    left: 0.0,
                    top: 0.0,
                    width: 0.0,
                    height: 0.0,
                    advance: 4.0,
                },
            );
        }
        TextAtlas {
            pixels: vec![0; (ATLAS_SIZE * ATLAS_SIZE) as usize],
            entries,
            line_height: [10.0, 12.0, 14.0, 16.0],
            font: None,
        }
    }

    #[test]
    fn six_vertices_per_visible_glyph() {
        let atlas = synthetic_atlas();
        let mut verts = Vec::new();
        atlas.layout("AB i", 0, 0.0, 0.0, 0.0, &mut verts);
        // space packs no quad
        assert_eq!(verts.len(), 3 * 6);
    }

    #[test]
    fn pen_advances_and_spaces_count() {
        let atlas = synthetic_atlas();
        let mut verts = Vec::new();
        let (pen_x, pen_y) = atlas.layout("A B", 0, 10.0, 5.0, 0.0, &mut verts);
        assert_eq!(pen_x, 10.0 + 7.0 + 4.0 + 7.0);
        assert_eq!(pen_y, 5.0);
    }

    #[test]
    fn newline_resets_x_drops_line_and_size_class() {
        let atlas = synthetic_atlas();
        let mut verts = Vec::new();
        let (pen_x, pen_y) = atlas.layout("A\nB", 2, 0.0, 100.0, 0.0, &mut verts);
        assert_eq!(pen_y, 100.0 - 14.0); // line height of class 2
        assert_eq!(pen_x, 7.0); // reset, then one advance
        assert_eq!(verts.len(), 2 * 6);
    }

    #[test]
    fn quads_sit_above_the_baseline() {
        let atlas = synthetic_atlas();
        let mut verts = Vec::new();
        atlas.layout("A", 0, 0.0, 0.0, 0.5, &mut verts);
        let ys: Vec<f32> = verts.iter().map(|v| v.position[1]).collect();
        assert_eq!(ys.iter().cloned().fold(f32::MAX, f32::min), 0.0);
        assert_eq!(ys.iter().cloned().fold(f32::MIN, f32::max), 8.0);
        assert!(verts.iter().all(|v| v.position[2] == 0.5));
    }
}
