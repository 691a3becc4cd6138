//! Area rendering: color fills (AC) and tiled patterns (AP).
//!
//! Pattern fill is shader-driven: the tile is prerendered once into its own
//! texture, and area fragments derive repeat texture coordinates from their
//! world position against a grid anchored at the feature extent's floored
//! lower-left. The NODATA backdrop and the dash/dot line masks are built
//! from bitmasks expanded into alpha textures at init.

use crate::color::palette;
use crate::error::Result;
use crate::geo::GeoKind;
use crate::params::MarParam;
use crate::pipeline::{LineVertex, Topo, MODE_PATTERN};
use crate::plib::S52Object;
use crate::primitive::DrawMode;

use super::symbols::world_per_symbol_unit;
use super::types::{GeomSource, PlanTex, Planner};

/// Dash: 3.6 mm on, 1.8 mm off, folded into a 32-bit repeat.
pub const DASH_MASK: u32 = 0xFFFF_F000;
/// Dot: 0.6 mm on, 1.2 mm off.
pub const DOT_MASK: u32 = 0x0303_0303;

/// 32×32 NODATA diagonal hatch, one u32 per row.
pub const NODATA_MASK: [u32; 32] = {
    let mut rows = [0u32; 32];
    let mut i = 0;
    while i < 32 {
        // two diagonal stripes, 4 bits wide, 16 apart
        let base: u32 = 0x000F_000F;
        rows[i] = base.rotate_left((i as u32) % 32);
        i += 1;
    }
    rows
};

/// Expand one mask row into RGBA bytes (white, alpha from the bit).
pub fn expand_mask_row(mask: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 * 4);
    for bit in 0..32 {
        let on = mask & (1 << (31 - bit)) != 0;
        let a = if on { 255 } else { 0 };
        out.extend_from_slice(&[255, 255, 255, a]);
    }
    out
}

/// Expand a 32-row bitmask block into a 32×32 RGBA alpha stencil.
pub fn expand_mask_block(rows: &[u32; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 * 32 * 4);
    for row in rows {
        out.extend_from_slice(&expand_mask_row(*row));
    }
    out
}

/// Pattern grid anchor. W floors by the tile width, S by twice the tile
/// height: staggered rows need the doubled step to keep phase while panning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GridRef {
    pub ll_x: f64,
    pub ll_y: f64,
    pub tile_w: f64,
    pub tile_h: f64,
}

pub(crate) fn get_grid_ref(ext_w: f64, ext_s: f64, tile_w: f64, tile_h: f64) -> GridRef {
    GridRef {
        ll_x: (ext_w / tile_w).floor() * tile_w,
        ll_y: (ext_s / (2.0 * tile_h)).floor() * (2.0 * tile_h),
        tile_w,
        tile_h,
    }
}

/// Record every span of the object's tessellated primitive under the given
/// uniform set. Translate sentinels adjust the modelview between spans.
pub(crate) fn plan_feature_prim(
    p: &mut Planner,
    obj: &mut S52Object,
    color: [f32; 4],
    tex: PlanTex,
    pattern: Option<(GridRef, f64, f64)>,
) {
    let Some(prim) = obj.feature.prim() else {
        return;
    };
    struct Step {
        kind: StepKind,
    }
    enum StepKind {
        Draw { first: u32, count: u32, topo: Topo },
        Translate([f32; 3]),
    }
    let steps: Vec<Step> = prim
        .spans()
        .iter()
        .filter_map(|span| {
            if span.mode == DrawMode::Translate {
                let v = prim.vertices()[span.first as usize];
                Some(Step {
                    kind: StepKind::Translate(v),
                })
            } else if span.count > 0 {
                let topo = match span.mode {
                    DrawMode::Points => Topo::Points,
                    DrawMode::Lines => Topo::Lines,
                    DrawMode::LineStrip | DrawMode::LineLoop => Topo::LineStrip,
                    DrawMode::TriangleStrip | DrawMode::TriangleFan => Topo::TriangleStrip,
                    _ => Topo::Triangles,
                };
                Some(Step {
                    kind: StepKind::Draw {
                        first: span.first,
                        count: span.count,
                        topo,
                    },
                })
            } else {
                None
            }
        })
        .collect();

    let mut pushed = false;
    for step in steps {
        match step.kind {
            StepKind::Translate(v) => {
                if !pushed {
                    p.stacks.set_mode(crate::matrix::MatrixMode::Modelview);
                    p.stacks.push();
                    pushed = true;
                }
                p.stacks.translate(v[0] as f64, v[1] as f64, v[2] as f64);
            }
            StepKind::Draw { first, count, topo } => {
                let mut uniforms = p.uniforms(color);
                if let Some((grid, w, h)) = pattern {
                    if p.pick_color.is_none() {
                        uniforms.mode = MODE_PATTERN;
                        uniforms.pattern_origin = [grid.ll_x as f32, grid.ll_y as f32];
                        uniforms.pattern_tile = [w as f32, h as f32];
                    }
                }
                p.record(
                    GeomSource::FeaturePrim {
                        first,
                        count,
                        topo,
                        buffer: None,
                    },
                    tex.clone(),
                    uniforms,
                );
            }
        }
    }
    if pushed {
        p.stacks.pop();
    }
}

/// AC: area color fill, with the light-sector and VRM/EBL special cases.
pub(crate) fn plan_ac(
    p: &mut Planner,
    obj: &mut S52Object,
    color_token: &str,
    trans: u8,
) -> Result<()> {
    if obj.feature.kind() == GeoKind::Point && obj.feature.name() == "LIGHTS" {
        super::lines::plan_sector_disks(p, obj, color_token);
        return Ok(());
    }
    if obj.feature.name() == "vrmebl" {
        return super::lines::plan_vrm_ring(p, obj, color_token);
    }
    if obj.feature.kind() != GeoKind::Area {
        return Ok(());
    }
    let mut color = palette(color_token).normalize();
    color[3] = 1.0 - (trans.min(4) as f32) * 0.25;
    plan_feature_prim(p, obj, color, PlanTex::None, None);
    Ok(())
}

const AP_SKIP_CLASSES: [&str; 4] = ["UNSARE", "M_COVR", "M_CSCL", "M_QUAL"];

/// AP: pattern fill over the tessellated area.
pub(crate) fn plan_ap(p: &mut Planner, obj: &mut S52Object, name: &str) -> Result<()> {
    if !p.env.params.is_on(MarParam::AreaPattern) {
        return Ok(());
    }
    let class = obj.feature.name();
    if AP_SKIP_CLASSES.contains(&class) {
        return Ok(());
    }
    if class == "DRGARE" && !p.env.params.is_on(MarParam::DispDrgArePattern) {
        return Ok(());
    }
    if obj.feature.kind() != GeoKind::Area {
        return Ok(());
    }

    let (tile_units_w, tile_units_h, color_token) = match p.symbols.get(name) {
        Some(sym) => {
            let (w, h) = sym
                .tile
                .map(|t| (t.width, t.height))
                .unwrap_or((sym.size.0.max(1.0), sym.size.1.max(1.0)));
            let token = sym
                .sublists
                .first()
                .map(|(t, _)| t.clone())
                .unwrap_or_else(|| "CHGRD".to_owned());
            (w, h, token)
        }
        None => {
            log::debug!("pattern {name} has no definition");
            return Ok(());
        }
    };

    let (wpu_x, wpu_y) = world_per_symbol_unit(p);
    let tile_w = tile_units_w * wpu_x;
    let tile_h = tile_units_h * wpu_y;
    if tile_w <= 0.0 || tile_h <= 0.0 {
        return Ok(());
    }

    let Some(ext) = obj.feature.ext() else {
        return Ok(());
    };
    // grid anchored at the feature extent so panning keeps the phase; the
    // viewport trim only decides whether the fill happens at all (the
    // shader wraps, so no tile loop remains to bound)
    let view = p.env.view.projected_extent();
    if !ext.intersects(&view) {
        return Ok(());
    }
    let grid = get_grid_ref(ext.w, ext.s, tile_w, tile_h);

    if !p.pending_tiles.iter().any(|n| n == name) {
        p.pending_tiles.push(name.to_owned());
    }

    let color = palette(&color_token).normalize();
    plan_feature_prim(
        p,
        obj,
        color,
        PlanTex::Pattern(name.to_owned()),
        Some((grid, tile_w, tile_h)),
    );
    Ok(())
}

/// The NODATA backdrop: one view-covering quad sampling the hatch mask,
/// tiled every 32 dots of screen.
pub(crate) fn plan_nodata_backdrop(p: &mut Planner) {
    let view = p.env.view.projected_extent();
    let mpp = p.env.view.meters_per_pixel_x();
    let tile = 32.0 * mpp;
    let color = palette("CHGRD").normalize();

    let corners = [
        (view.w, view.s),
        (view.e, view.s),
        (view.w, view.n),
        (view.w, view.n),
        (view.e, view.s),
        (view.e, view.n),
    ];
    let verts: Vec<LineVertex> = corners
        .iter()
        .map(|&(x, y)| LineVertex {
            position: [x as f32, y as f32, 0.0],
            dist: 0.0,
        })
        .collect();

    let mut uniforms = p.uniforms(color);
    uniforms.mode = MODE_PATTERN;
    uniforms.pattern_origin = [view.w as f32, view.s as f32];
    uniforms.pattern_tile = [tile as f32, tile as f32];
    let (first, count) = p.pool.push_chart(&verts);
    p.record(
        GeomSource::Chart {
            first,
            count,
            topo: Topo::Triangles,
        },
        PlanTex::Nodata,
        uniforms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_row_expands_msb_first() {
        let row = expand_mask_row(0x8000_0001);
        assert_eq!(row.len(), 128);
        assert_eq!(row[3], 255); // first pixel alpha on
        assert_eq!(row[4 + 3], 0); // second off
        assert_eq!(row[31 * 4 + 3], 255); // last on
    }

    #[test]
    fn nodata_block_is_32x32_rgba() {
        let block = expand_mask_block(&NODATA_MASK);
        assert_eq!(block.len(), 32 * 32 * 4);
        // hatch is neither empty nor full
        let on = block.chunks(4).filter(|px| px[3] == 255).count();
        assert!(on > 0 && on < 32 * 32);
    }

    #[test]
    fn grid_ref_rounds_w_and_s_asymmetrically() {
        let grid = get_grid_ref(103.0, 77.0, 10.0, 10.0);
        assert_eq!(grid.ll_x, 100.0); // floor by tile_w
        assert_eq!(grid.ll_y, 60.0); // floor by 2 * tile_h
        assert_eq!(grid.tile_w, 10.0);
    }

    #[test]
    fn grid_ref_negative_coordinates_floor_down() {
        let grid = get_grid_ref(-103.0, -77.0, 10.0, 10.0);
        assert_eq!(grid.ll_x, -110.0);
        assert_eq!(grid.ll_y, -80.0);
    }
}
