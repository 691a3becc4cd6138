//! The S-52 rendering engine.
//!
//! A command interpreter over presentation-library command words, driving a
//! headless wgpu pipeline. Frames run as explicit cycles: `Draw` renders the
//! chart (no text), `Last` renders mariner overlays and text over a snapshot
//! of the chart, `Pick` repeats the scene in color-index dress and reads an
//! 8×8 cursor window back. Draw calls are recorded CPU-side with their
//! composed fixed-function matrices and replayed in one pass per cycle.

use std::num::NonZeroUsize;
use std::path::Path;

use ahash::{HashMap, HashMapExt};
use lru::LruCache;

use crate::error::{Result, S52Error};
use crate::geo::FeatureId;
use crate::matrix::MatrixStacks;
use crate::params::MarinerParams;
use crate::pipeline::GpuState;
use crate::plib::{S52Object, VectorDef};
use crate::projection::Projection;
use crate::tess::Tessellator;
use crate::text_atlas::{TextAtlas, TextVertex};
use crate::view::View;

mod areas;
mod commands;
mod frame;
mod lines;
mod pick;
mod raster;
mod render;
mod symbols;
mod text;
mod types;

pub use pick::{PICK_MAX_OBJECTS, PICK_WINDOW};
pub use raster::RasterLayer;
pub use symbols::{SymbolCache, SymbolPrims, SHIPS_OUTLINE_MM};
pub use types::Cycle;

use types::{CmdFilter, DrawPlan, EngineScratch, Env, FramePool, PickState, Planner};

const MAX_CACHED_TEXTS: usize = 512;

/// One prerendered pattern tile; `disabled` sticks for the session after a
/// failed setup.
pub(crate) struct PatternTile {
    pub bind: Option<wgpu::BindGroup>,
    pub disabled: bool,
}

pub struct S52Engine {
    pub(crate) gpu: GpuState,
    pub(crate) prj: Projection,
    pub(crate) view: View,
    pub(crate) params: MarinerParams,
    pub(crate) stacks: MatrixStacks,
    pub(crate) tess: Tessellator,
    pub(crate) symbols: SymbolCache,

    pub(crate) atlas: Option<TextAtlas>,
    pub(crate) atlas_bind: Option<wgpu::BindGroup>,
    pub(crate) dash_bind: wgpu::BindGroup,
    pub(crate) dot_bind: wgpu::BindGroup,
    pub(crate) nodata_bind: wgpu::BindGroup,
    pub(crate) snapshot_bind: wgpu::BindGroup,
    pub(crate) pattern_tiles: HashMap<String, PatternTile>,
    pub(crate) raster_binds: HashMap<u32, wgpu::BindGroup>,
    pub(crate) text_cache: LruCache<(u32, u64), Vec<TextVertex>>,

    pub(crate) cycle: Cycle,
    pub(crate) plans: Vec<DrawPlan>,
    pub(crate) pool: FramePool,
    pub(crate) pending_tiles: Vec<String>,
    pub(crate) pick: PickState,
    pub(crate) scratch: EngineScratch,

    radar_backdrop: bool,
    initialized: bool,
}

impl S52Engine {
    /// Bring up the headless GPU context and the built-in mask textures.
    /// Display metrics arrive through [`S52Engine::init`].
    pub async fn new_headless(vp_w: u32, vp_h: u32) -> Result<Self> {
        let gpu = GpuState::new_headless(vp_w, vp_h).await?;

        let dash_tex =
            gpu.upload_rgba_texture("stipple_dash", 32, 1, &areas::expand_mask_row(areas::DASH_MASK));
        let dot_tex =
            gpu.upload_rgba_texture("stipple_dot", 32, 1, &areas::expand_mask_row(areas::DOT_MASK));
        let nodata_tex = gpu.upload_rgba_texture(
            "nodata_hatch",
            32,
            32,
            &areas::expand_mask_block(&areas::NODATA_MASK),
        );
        let dash_bind = gpu.bind_texture(&dash_tex.create_view(&Default::default()));
        let dot_bind = gpu.bind_texture(&dot_tex.create_view(&Default::default()));
        let nodata_bind = gpu.bind_texture(&nodata_tex.create_view(&Default::default()));
        let snapshot_bind = gpu.bind_texture(&gpu.snapshot_view);

        Ok(Self {
            gpu,
            prj: Projection::new(),
            view: View::new(0.3, 0.3, vp_w, vp_h),
            params: MarinerParams::new(),
            stacks: MatrixStacks::new(),
            tess: Tessellator::new(),
            symbols: SymbolCache::new(),
            atlas: None,
            atlas_bind: None,
            dash_bind,
            dot_bind,
            nodata_bind,
            snapshot_bind,
            pattern_tiles: HashMap::new(),
            raster_binds: HashMap::new(),
            text_cache: LruCache::new(NonZeroUsize::new(MAX_CACHED_TEXTS).unwrap()),
            cycle: Cycle::None,
            plans: Vec::new(),
            pool: FramePool::default(),
            pending_tiles: Vec::new(),
            pick: PickState::default(),
            scratch: EngineScratch::default(),
            radar_backdrop: false,
            initialized: false,
        })
    }

    /// Bind display metrics. Idempotent after the first success.
    pub fn init(&mut self, dotpitch_mm_x: f64, dotpitch_mm_y: f64, vp_w: u32, vp_h: u32) -> bool {
        if self.initialized {
            return true;
        }
        if dotpitch_mm_x <= 0.0 || dotpitch_mm_y <= 0.0 || vp_w == 0 || vp_h == 0 {
            return false;
        }
        self.view.dotpitch_mm_x = dotpitch_mm_x;
        self.view.dotpitch_mm_y = dotpitch_mm_y;
        self.view.set_viewport(0, 0, vp_w, vp_h);
        self.gpu.resize(vp_w, vp_h);
        self.snapshot_bind = self.gpu.bind_texture(&self.gpu.snapshot_view);
        self.initialized = true;
        true
    }

    // ── configuration ────────────────────────────────────────────────────

    /// Bind the Mercator origin from the first chart's reference position.
    pub fn set_mercator_origin(&mut self, lat_ts: f64, lon_0: f64) -> Result<()> {
        self.prj.set_origin(lat_ts, lon_0)
    }

    pub fn projection(&self) -> &Projection {
        &self.prj
    }

    pub fn params(&self) -> &MarinerParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut MarinerParams {
        &mut self.params
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    /// Register a presentation-library vector definition (symbol, linestyle
    /// or pattern).
    pub fn add_symbol_def(&mut self, def: VectorDef) {
        self.symbols.add_def(def);
    }

    /// Palette or PLib reload: every compiled symbol and pattern tile is
    /// rebuilt before the next frame.
    pub fn reload_symbology(&mut self) {
        self.symbols.invalidate_all();
        self.pattern_tiles.clear();
        self.text_cache.clear();
    }

    /// Build the glyph atlas from raw font bytes.
    pub fn set_font(&mut self, font_data: &[u8], base_px: f32) -> Result<()> {
        let atlas = TextAtlas::from_font_bytes(font_data, base_px)?;
        let tex = self.gpu.upload_r8_texture(
            "glyph_atlas",
            crate::text_atlas::ATLAS_SIZE,
            crate::text_atlas::ATLAS_SIZE,
            atlas.pixels(),
        );
        self.atlas_bind = Some(self.gpu.bind_texture(&tex.create_view(&Default::default())));
        self.atlas = Some(atlas);
        Ok(())
    }

    /// Black chart backdrop under an active RADAR overlay.
    pub fn set_radar_backdrop(&mut self, on: bool) {
        self.radar_backdrop = on;
    }

    // ── view plumbing ────────────────────────────────────────────────────

    pub fn set_view(&mut self, center_lat: f64, center_lon: f64, range_nm: f64, north_deg: f64) {
        self.view.set_view(center_lat, center_lon, range_nm, north_deg);
    }

    pub fn set_viewport(&mut self, x: i32, y: i32, w: u32, h: u32) {
        self.view.set_viewport(x, y, w, h);
        self.gpu.resize(w, h);
        self.snapshot_bind = self.gpu.bind_texture(&self.gpu.snapshot_view);
    }

    pub fn set_projected_view(&mut self, s: f64, w: f64, n: f64, e: f64) -> Result<()> {
        self.view.set_projected_view(s, w, n, e)
    }

    pub fn projected_view(&self) -> (f64, f64, f64, f64) {
        self.view.projected_view()
    }

    pub fn set_geographic_view(&mut self, s: f64, w: f64, n: f64, e: f64) -> Result<()> {
        self.view.set_geographic_view(s, w, n, e)
    }

    pub fn geographic_view(&self) -> (f64, f64, f64, f64) {
        self.view.geographic_view()
    }

    // ── cycles ───────────────────────────────────────────────────────────

    pub fn begin(&mut self, cycle: Cycle) -> bool {
        if self.cycle != Cycle::None || cycle == Cycle::None {
            log::warn!(
                "{}",
                S52Error::CycleOutOfSync("begin while another cycle is active")
            );
            return false;
        }
        if self.prj.is_set() {
            if let Err(e) = self.view.recompute(&self.prj) {
                log::warn!("view recompute failed: {e}");
            }
        }
        self.symbols.build_pending();
        self.pool.begin_frame();
        self.plans.clear();

        frame::matrix_set(&mut self.stacks, &self.view, frame::FrameRef::Prj);
        self.cycle = cycle;

        match cycle {
            Cycle::Draw => {
                self.with_planner(None, |p| areas::plan_nodata_backdrop(p));
            }
            Cycle::Pick => {
                self.pick.reset();
            }
            Cycle::Last => {
                // keep the chart underneath: snapshot for blit-restore
                let mut encoder =
                    self.gpu
                        .device
                        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                            label: Some("snapshot_encoder"),
                        });
                encoder.copy_texture_to_texture(
                    self.gpu.target.as_image_copy(),
                    self.gpu.snapshot.as_image_copy(),
                    wgpu::Extent3d {
                        width: self.gpu.size.0,
                        height: self.gpu.size.1,
                        depth_or_array_layers: 1,
                    },
                );
                self.gpu.queue.submit(std::iter::once(encoder.finish()));
            }
            Cycle::None => unreachable!(),
        }
        true
    }

    pub fn end(&mut self, cycle: Cycle) -> bool {
        if cycle != self.cycle || cycle == Cycle::None {
            log::warn!("{}", S52Error::CycleOutOfSync("end does not match begin"));
            return false;
        }
        let nodata = crate::color::palette("NODTA").normalize();
        let clear = match cycle {
            Cycle::Draw => Some(if self.radar_backdrop {
                wgpu::Color::BLACK
            } else {
                wgpu::Color {
                    r: nodata[0] as f64,
                    g: nodata[1] as f64,
                    b: nodata[2] as f64,
                    a: 1.0,
                }
            }),
            Cycle::Pick => Some(wgpu::Color::BLACK),
            Cycle::Last | Cycle::None => None,
        };
        self.flush(clear);

        if cycle == Cycle::Pick {
            let (cx, cy) = self.pick.cursor;
            let half = PICK_WINDOW / 2;
            let tx = cx.saturating_sub(half);
            // window coordinates are Y-up, texture rows are top-down
            let ty = self.gpu.size.1.saturating_sub(cy.saturating_add(half));
            let mut out = std::mem::take(&mut self.scratch.readback);
            self.gpu.readback_rgba(tx, ty, PICK_WINDOW, PICK_WINDOW, &mut out);
            pick::resolve(&mut self.pick, &out);
            self.scratch.readback = out;
        }

        frame::matrix_del(&mut self.stacks);
        self.cycle = Cycle::None;
        true
    }

    // ── drawing ──────────────────────────────────────────────────────────

    fn with_planner<R>(
        &mut self,
        pick_color: Option<[f32; 4]>,
        f: impl FnOnce(&mut Planner) -> R,
    ) -> R {
        let env = Env {
            view: &self.view,
            prj: &self.prj,
            params: &self.params,
        };
        let mut planner = Planner {
            env,
            stacks: &mut self.stacks,
            pool: &mut self.pool,
            plans: &mut self.plans,
            symbols: &mut self.symbols,
            atlas: self.atlas.as_ref(),
            text_cache: &mut self.text_cache,
            cycle: self.cycle,
            pick_color,
            pending_tiles: &mut self.pending_tiles,
        };
        f(&mut planner)
    }

    fn draw_filtered(&mut self, obj: &mut S52Object, filter: CmdFilter) -> bool {
        if self.cycle == Cycle::None {
            log::warn!("{}", S52Error::CycleOutOfSync("draw outside a cycle"));
            return false;
        }

        // apply the previous pick result when the object comes around again
        if self.pick.picked.contains(&obj.feature.id()) {
            obj.feature.highlight_on();
        }

        // areas that will fill need their triangles ready
        let wants_fill = obj.commands.iter().any(|c| {
            matches!(
                c,
                crate::plib::CommandWord::Ac { .. } | crate::plib::CommandWord::Ap { .. }
            )
        });
        if wants_fill
            && obj.feature.kind() == crate::geo::GeoKind::Area
            && obj.feature.prim().map_or(true, |p| p.vertex_count() == 0)
        {
            if let Err(e) = self.tess.tessellate(&mut obj.feature) {
                self.scratch
                    .warn_once(obj.feature.name(), &format!("tessellation failed: {e}"));
                return false;
            }
        }

        let pick_color = if self.cycle == Cycle::Pick {
            match pick::assign_index(&mut self.pick, obj) {
                Some(color) => Some(color),
                None => {
                    self.scratch.warn_once(
                        obj.feature.name(),
                        &S52Error::PickOverflow(PICK_MAX_OBJECTS).to_string(),
                    );
                    return false;
                }
            }
        } else {
            None
        };

        let plans_start = self.plans.len();
        let planned = self.with_planner(pick_color, |p| commands::plan_object(p, obj, filter));
        if let Err(e) = planned {
            self.scratch.warn_once(obj.feature.name(), &e.to_string());
        }

        // attach the feature's uploaded buffer to the plans just recorded
        let buffer = obj
            .feature
            .prim_mut()
            .and_then(|prim| prim.upload(&self.gpu.device).ok().cloned());
        for plan in &mut self.plans[plans_start..] {
            if let types::GeomSource::FeaturePrim { buffer: slot @ None, .. } = &mut plan.geom {
                *slot = buffer.clone();
            }
        }
        true
    }

    /// Render all non-text commands of one object.
    pub fn draw(&mut self, obj: &mut S52Object) -> bool {
        self.draw_filtered(obj, CmdFilter::NoText)
    }

    /// Render only the TE/TX commands (Last cycle).
    pub fn draw_text(&mut self, obj: &mut S52Object) -> bool {
        if self.cycle != Cycle::Last {
            log::warn!("{}", S52Error::CycleOutOfSync("draw_text outside Last"));
            return false;
        }
        self.draw_filtered(obj, CmdFilter::TextOnly)
    }

    /// Render only the LS/AC commands of a light feature; a no-op for any
    /// other class.
    pub fn draw_lights(&mut self, obj: &mut S52Object) -> bool {
        if obj.feature.name() != "LIGHTS" {
            return true;
        }
        self.draw_filtered(obj, CmdFilter::LightsOnly)
    }

    /// The transition arc between two consecutive route legs.
    pub fn draw_arc(&mut self, a: &S52Object, b: &S52Object) -> bool {
        if self.cycle == Cycle::None {
            return false;
        }
        let result = self.with_planner(None, |p| lines::plan_leg_arc(p, a, b));
        if let Err(e) = result {
            log::warn!("draw_arc: {e}");
            return false;
        }
        true
    }

    /// Lat/lon graticule with degree labels.
    pub fn draw_graticule(&mut self) -> bool {
        if self.cycle == Cycle::None || !self.prj.is_set() {
            return false;
        }
        let (s, w, n, e) = self.view.geographic_view();
        let span = (n - s).abs().max(1e-9);
        let step = [
            1.0 / 60.0,
            5.0 / 60.0,
            10.0 / 60.0,
            0.5,
            1.0,
            5.0,
            10.0,
        ]
        .into_iter()
        .find(|st| span / st <= 8.0)
        .unwrap_or(10.0);

        let color = crate::color::palette("CHGRD").normalize();
        self.with_planner(None, |p| {
            let mut lat = (s / step).ceil() * step;
            while lat <= n {
                let mut pts = Vec::with_capacity(33);
                for i in 0..=32 {
                    let lon = w + (e - w) * i as f64 / 32.0;
                    if let Ok(xy) = p.env.prj.geo_to_prj(lon, lat) {
                        pts.push(xy);
                    }
                }
                lines::plan_world_lines(p, &pts, color, crate::plib::LineStyleKind::Solid, 1);
                if let Some(&(x, y)) = pts.first() {
                    text::plan_string_world(p, x, y, &format!("{lat:.2}"), 0, "CHGRD");
                }
                lat += step;
            }
            let mut lon = (w / step).ceil() * step;
            while lon <= e {
                let mut pts = Vec::with_capacity(33);
                for i in 0..=32 {
                    let lat = s + (n - s) * i as f64 / 32.0;
                    if let Ok(xy) = p.env.prj.geo_to_prj(lon, lat) {
                        pts.push(xy);
                    }
                }
                lines::plan_world_lines(p, &pts, color, crate::plib::LineStyleKind::Solid, 1);
                if let Some(&(x, y)) = pts.first() {
                    text::plan_string_world(p, x, y, &format!("{lon:.2}"), 0, "CHGRD");
                }
                lon += step;
            }
        });
        true
    }

    /// A free string anchored at a projected position.
    pub fn draw_string_world(&mut self, x: f64, y: f64, s: &str, size: u8, _weight: u8) -> bool {
        if self.cycle == Cycle::None {
            return false;
        }
        self.with_planner(None, |p| text::plan_string_world(p, x, y, s, size, "CHBLK"));
        true
    }

    /// A free string at window pixel coordinates in a named color.
    pub fn draw_string_window(&mut self, px: f64, py: f64, color: &str, size: u8, s: &str) -> bool {
        if self.cycle == Cycle::None {
            return false;
        }
        self.with_planner(None, |p| text::plan_string_window(p, px, py, color, size, s));
        true
    }

    // ── rasters ──────────────────────────────────────────────────────────

    /// Draw a raster overlay; RADAR layers re-upload their pixels every
    /// frame, bathymetry uploads once.
    pub fn draw_raster(&mut self, layer: &mut RasterLayer) -> bool {
        if self.cycle == Cycle::None || !self.prj.is_set() {
            return false;
        }
        if layer.w == 0 || layer.h == 0 || layer.data.len() < (layer.w * layer.h * 4) as usize {
            log::warn!("raster {} has inconsistent dimensions", layer.id);
            return false;
        }
        if layer.texture.is_none() {
            let tex = self
                .gpu
                .upload_rgba_texture("raster_layer", layer.w, layer.h, &layer.data);
            self.raster_binds
                .insert(layer.id, self.gpu.bind_texture(&tex.create_view(&Default::default())));
            layer.texture = Some(tex);
        } else if layer.is_radar {
            // dynamic sweep: refresh the whole subimage
            let tex = layer.texture.as_ref().unwrap();
            self.gpu.queue.write_texture(
                tex.as_image_copy(),
                &layer.data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(layer.w * 4),
                    rows_per_image: Some(layer.h),
                },
                wgpu::Extent3d {
                    width: layer.w,
                    height: layer.h,
                    depth_or_array_layers: 1,
                },
            );
        }
        let alpha = if layer.is_radar { 0.75 } else { 1.0 };
        self.with_planner(None, |p| raster::plan_raster(p, layer, alpha));
        true
    }

    /// Release a raster's GPU resources; with `tex_only` the pixel data
    /// survives for a later re-upload.
    pub fn del_raster(&mut self, layer: &mut RasterLayer, tex_only: bool) {
        layer.texture = None;
        self.raster_binds.remove(&layer.id);
        if !tex_only {
            layer.data.clear();
        }
    }

    // ── pick ─────────────────────────────────────────────────────────────

    /// Cursor position for the next Pick cycle, window pixels.
    pub fn set_pick_at(&mut self, px: u32, py: u32) {
        self.pick.cursor = (px, py);
    }

    /// The winning object of the last Pick cycle: `"NAME:ID"` or
    /// `"NAME:ID:rel,rel"`.
    pub fn pick_name(&self) -> Option<&str> {
        self.pick.result.as_deref()
    }

    /// Attribute report of the picked object: `"id,KEY:val,…"`.
    pub fn pick_attributes(&self) -> Option<&str> {
        self.pick.result_summary.as_deref()
    }

    /// The picked object and its relations, for highlighting by the scene.
    pub fn picked_ids(&self) -> &[FeatureId] {
        &self.pick.picked
    }

    // ── framebuffer access ───────────────────────────────────────────────

    /// Tightly packed RGBA8 of the whole color target, top row first.
    pub fn read_fb_pixels(&mut self) -> &[u8] {
        let (w, h) = self.gpu.size;
        let mut out = std::mem::take(&mut self.scratch.readback);
        self.gpu.readback_rgba(0, 0, w, h, &mut out);
        self.scratch.readback = out;
        &self.scratch.readback
    }

    /// Restore the chart snapshot over the whole viewport (Last cycle).
    pub fn draw_fb_pixels(&mut self) -> bool {
        if self.cycle == Cycle::None {
            return false;
        }
        self.plan_snapshot_quad(0.0, 0.0, 0.0, 0.0);
        true
    }

    /// Blit the chart snapshot shifted/zoomed/rotated, for cheap pan-zoom
    /// feedback between full redraws.
    pub fn draw_blit(&mut self, sx: f64, sy: f64, sz: f64, north: f64) -> bool {
        if self.cycle == Cycle::None {
            return false;
        }
        if sx.abs() > 1.0 || sy.abs() > 1.0 {
            return false;
        }
        self.plan_snapshot_quad(sx, sy, sz, north);
        true
    }

    fn plan_snapshot_quad(&mut self, sx: f64, sy: f64, sz: f64, north: f64) {
        self.with_planner(None, |p| {
            let (_, _, w, h) = p.env.view.viewport();
            let (w, h) = (w as f64, h as f64);
            frame::with_window_frame(p, |p| {
                p.stacks.set_mode(crate::matrix::MatrixMode::Modelview);
                p.stacks.push();
                p.stacks.translate(w * 0.5 + sx * w, h * 0.5 + sy * h, 0.0);
                p.stacks.rotate_z(north);
                let zoom = if sz >= 0.0 { 1.0 + sz } else { 1.0 / (1.0 - sz) };
                p.stacks.scale(zoom, zoom, 1.0);
                p.stacks.translate(-w * 0.5, -h * 0.5, 0.0);

                let quad = [
                    ([0.0, 0.0, 0.0], [0.0f32, 1.0f32]),
                    ([w, 0.0, 0.0], [1.0, 1.0]),
                    ([0.0, h, 0.0], [0.0, 0.0]),
                    ([0.0, h, 0.0], [0.0, 0.0]),
                    ([w, 0.0, 0.0], [1.0, 1.0]),
                    ([w, h, 0.0], [1.0, 0.0]),
                ];
                let verts: Vec<TextVertex> = quad
                    .iter()
                    .map(|&([x, y, z], tex)| TextVertex {
                        position: [x as f32, y as f32, z as f32],
                        tex,
                    })
                    .collect();
                let mut uniforms = p.uniforms([1.0, 1.0, 1.0, 1.0]);
                uniforms.mode = crate::pipeline::MODE_BLIT;
                let (first, count) = p.pool.push_quads(&verts);
                p.record(
                    types::GeomSource::Quad { first, count },
                    types::PlanTex::Snapshot,
                    uniforms,
                );
                p.stacks.pop();
            });
        });
    }

    /// Debug capture of the color target (optionally of one object drawn
    /// alone) into a PNG.
    pub fn dump_to_png(
        &mut self,
        path: impl AsRef<Path>,
        obj: Option<&mut S52Object>,
        _w: u32,
        _h: u32,
    ) -> bool {
        if let Some(obj) = obj {
            if self.cycle != Cycle::None {
                log::warn!("dump_to_png with an object requires an idle cycle");
                return false;
            }
            if !self.begin(Cycle::Draw) {
                return false;
            }
            self.draw(obj);
            self.end(Cycle::Draw);
        }
        let (w, h) = self.gpu.size;
        let mut out = std::mem::take(&mut self.scratch.readback);
        self.gpu.readback_rgba(0, 0, w, h, &mut out);
        let ok = if out.len() == (w * h * 4) as usize {
            image::save_buffer(path.as_ref(), &out, w, h, image::ExtendedColorType::Rgba8).is_ok()
        } else {
            false
        };
        self.scratch.readback = out;
        ok
    }

    // ── gates and teardown ───────────────────────────────────────────────

    /// SCAMIN plus the cull/user toggle. An infinite SCAMIN leaves only the
    /// toggle in charge.
    pub fn is_suppressed(&self, obj: &S52Object) -> bool {
        if obj.feature.is_sup() {
            return true;
        }
        self.view.scamin_suppresses(obj.feature.scamin())
    }

    /// Extent test against the projected view.
    pub fn is_offscreen(&self, obj: &S52Object) -> bool {
        match obj.feature.ext() {
            Some(ext) => !ext.intersects(&self.view.projected_extent()),
            None => false,
        }
    }

    /// Release the object's GPU footprint: primitive buffer and cached
    /// text.
    pub fn del(&mut self, obj: &mut S52Object) -> bool {
        obj.feature.done_prim();
        let id = obj.feature.id().0;
        let stale: Vec<(u32, u64)> = self
            .text_cache
            .iter()
            .filter(|((fid, _), _)| *fid == id)
            .map(|(k, _)| *k)
            .collect();
        for key in stale {
            self.text_cache.pop(&key);
        }
        true
    }

    #[inline]
    pub fn cycle(&self) -> Cycle {
        self.cycle
    }
}
