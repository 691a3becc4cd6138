//! TE/TX rendering and the window/world string helpers.
//!
//! Glyph quads are laid out against the atlas in window pixels at the
//! feature's anchor (projected to the window), cached per object and text
//! content, and drawn in the Last cycle. A drop shadow one pixel down-right
//! in the opposite color precedes the main color when enabled.

use std::hash::{Hash, Hasher};

use crate::color::palette;
use crate::error::Result;
use crate::params::MarParam;
use crate::plib::{S52Object, TextDef, TextSource};
use crate::text_atlas::TextVertex;

use super::symbols::symbol_anchors;
use super::types::{Cycle, GeomSource, PlanTex, Planner};

/// Resolve a text command's string against the feature's attributes.
/// `None` means nothing to draw (absent attribute).
pub(crate) fn resolve_text(obj: &S52Object, def: &TextDef) -> Option<String> {
    match &def.source {
        TextSource::Literal(s) => {
            if s.is_empty() {
                None
            } else {
                Some(s.clone())
            }
        }
        TextSource::Attribute { format, attr } => {
            let value = obj.feature.attribute(attr)?;
            Some(if format.contains("%s") {
                format.replace("%s", value)
            } else {
                value.to_owned()
            })
        }
    }
}

/// Text view-group suppression: a set bit in the filter mask mutes the
/// group.
pub(crate) fn group_suppressed(p: &Planner, group: u32) -> bool {
    let filter = p.env.params.get(MarParam::TextViewGroupFilter) as i64 as u32;
    filter & (1 << (group % 32)) != 0
}

fn text_key(obj: &S52Object, def: &TextDef, text: &str) -> (u32, u64) {
    let mut hasher = ahash::AHasher::default();
    text.hash(&mut hasher);
    def.size.hash(&mut hasher);
    (obj.feature.id().0, hasher.finish())
}

/// Lay out (or reuse) the object's text and record it at its anchor.
pub(crate) fn plan_text(p: &mut Planner, obj: &mut S52Object, def: &TextDef) -> Result<()> {
    if p.cycle == Cycle::Pick {
        return Ok(());
    }
    if !p.env.params.is_on(MarParam::ShowText) {
        return Ok(());
    }
    if group_suppressed(p, def.group) {
        return Ok(());
    }
    let Some(text) = resolve_text(obj, def) else {
        return Ok(());
    };
    let Some(atlas) = p.atlas else {
        return Ok(());
    };

    let anchors = symbol_anchors(p, obj);
    let Some(&(wx, wy)) = anchors.first() else {
        return Ok(());
    };
    let view = p.env.view;
    let vp = (
        view.vp_x as f64,
        view.vp_y as f64,
        view.vp_w as f64,
        view.vp_h as f64,
    );
    let (px, py, _) = p.stacks.prj_to_win(wx, wy, 0.0, vp);
    let px = px + def.xoffs_mm * view.px_per_mm_x();
    let py = py + def.yoffs_mm * view.px_per_mm_y();

    // baseline-relative quads cached at the origin, translated at draw time
    let key = text_key(obj, def, &text);
    if p.text_cache.get(&key).is_none() {
        let mut verts = Vec::new();
        atlas.layout(&text, def.size, 0.0, 0.0, 0.0, &mut verts);
        p.text_cache.put(key, verts);
    }
    let verts = p.text_cache.get(&key).cloned().unwrap_or_default();
    if verts.is_empty() {
        return Ok(());
    }

    let color = palette(&def.color);
    let shadow = p.env.params.is_on(MarParam::UseTxtShadow);
    super::frame::with_window_frame(p, |p| {
        p.stacks.set_mode(crate::matrix::MatrixMode::Modelview);
        if shadow {
            p.stacks.push();
            p.stacks.translate(px + 1.0, py - 1.0, 0.0);
            record_quads(p, &verts, color.opposite().normalize());
            p.stacks.pop();
        }
        p.stacks.push();
        p.stacks.translate(px, py, 0.0);
        record_quads(p, &verts, color.normalize());
        p.stacks.pop();
    });
    Ok(())
}

fn record_quads(p: &mut Planner, verts: &[TextVertex], color: [f32; 4]) {
    let uniforms = {
        let mut u = p.uniforms(color);
        u.mode = crate::pipeline::MODE_TEXT;
        u
    };
    let (first, count) = p.pool.push_quads(verts);
    p.record(GeomSource::Quad { first, count }, PlanTex::Atlas, uniforms);
}

/// Free-standing string anchored at a world position.
pub(crate) fn plan_string_world(
    p: &mut Planner,
    wx: f64,
    wy: f64,
    text: &str,
    size: u8,
    color_token: &str,
) {
    let view = p.env.view;
    let vp = (
        view.vp_x as f64,
        view.vp_y as f64,
        view.vp_w as f64,
        view.vp_h as f64,
    );
    let (px, py, _) = p.stacks.prj_to_win(wx, wy, 0.0, vp);
    plan_string_window(p, px, py, color_token, size, text);
}

/// Free-standing string at window pixel coordinates.
pub(crate) fn plan_string_window(
    p: &mut Planner,
    px: f64,
    py: f64,
    color_token: &str,
    size: u8,
    text: &str,
) {
    if p.cycle == Cycle::Pick {
        return;
    }
    let Some(atlas) = p.atlas else {
        return;
    };
    let mut verts = Vec::new();
    atlas.layout(text, size, 0.0, 0.0, 0.0, &mut verts);
    if verts.is_empty() {
        return;
    }
    let color = palette(color_token).normalize();
    super::frame::with_window_frame(p, |p| {
        p.stacks.set_mode(crate::matrix::MatrixMode::Modelview);
        p.stacks.push();
        p.stacks.translate(px, py, 0.0);
        record_quads(p, &verts, color);
        p.stacks.pop();
    });
}
