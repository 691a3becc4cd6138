//! Raster overlays: RADAR sweeps and bathymetric images.
//!
//! A raster layer owns its pixel data and geographic bounds; the engine
//! uploads bathymetry once and refreshes RADAR layers with a subimage write
//! every frame. The quad is anchored by projecting the corner coordinates.

use crate::pipeline::MODE_BLIT;
use crate::text_atlas::TextVertex;

use super::types::{GeomSource, PlanTex, Planner};

#[derive(Debug)]
pub struct RasterLayer {
    /// Host-chosen id; keys the engine's texture registry.
    pub id: u32,
    /// RGBA8, row-major, `w * h * 4` bytes.
    pub data: Vec<u8>,
    pub w: u32,
    pub h: u32,
    /// Geographic bounds: south, west, north, east degrees.
    pub bounds: (f64, f64, f64, f64),
    /// RADAR layers re-upload every frame; bathymetry uploads once.
    pub is_radar: bool,
    pub(crate) texture: Option<wgpu::Texture>,
}

impl RasterLayer {
    pub fn new(id: u32, w: u32, h: u32, data: Vec<u8>, bounds: (f64, f64, f64, f64), is_radar: bool) -> Self {
        Self {
            id,
            data,
            w,
            h,
            bounds,
            is_radar,
            texture: None,
        }
    }
}

/// Record the raster quad over its projected bounds. Texture upload is the
/// engine's business; this only records geometry and the sampling plan.
pub(crate) fn plan_raster(p: &mut Planner, layer: &RasterLayer, alpha: f32) {
    if p.cycle == super::types::Cycle::Pick {
        return;
    }
    let (s, w, n, e) = layer.bounds;
    let Ok((x0, y0)) = p.env.prj.geo_to_prj(w, s) else {
        return;
    };
    let Ok((x1, y1)) = p.env.prj.geo_to_prj(e, n) else {
        return;
    };

    let quad = [
        ([x0 as f32, y0 as f32, 0.0], [0.0, 1.0]),
        ([x1 as f32, y0 as f32, 0.0], [1.0, 1.0]),
        ([x0 as f32, y1 as f32, 0.0], [0.0, 0.0]),
        ([x0 as f32, y1 as f32, 0.0], [0.0, 0.0]),
        ([x1 as f32, y0 as f32, 0.0], [1.0, 1.0]),
        ([x1 as f32, y1 as f32, 0.0], [1.0, 0.0]),
    ];
    let verts: Vec<TextVertex> = quad
        .iter()
        .map(|&(position, tex)| TextVertex { position, tex })
        .collect();

    let mut uniforms = p.uniforms([1.0, 1.0, 1.0, alpha]);
    uniforms.mode = MODE_BLIT;
    let (first, count) = p.pool.push_quads(&verts);
    p.record(
        GeomSource::Quad { first, count },
        PlanTex::Raster(layer.id),
        uniforms,
    );
}
