//! Shared engine-internal types: the render cycle, recorded draw plans, the
//! per-frame vertex pool and the planning context the command renderer works
//! through. Plans are plain CPU data so the command walk can be exercised
//! without a GPU device; buffers are attached when the engine resolves them.

use smallvec::SmallVec;

use crate::geo::FeatureId;
use crate::matrix::MatrixStacks;
use crate::params::MarinerParams;
use crate::pipeline::{LineVertex, Topo, Uniforms};
use crate::plib::LineStyleKind;
use crate::projection::Projection;
use crate::text_atlas::{TextAtlas, TextVertex};
use crate::view::View;

/// Frame lifecycle state; exactly one cycle at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    /// Between frames.
    None,
    /// Chart pass: everything but text.
    Draw,
    /// Mariner-overlay and text pass over a snapshot of the chart.
    Last,
    /// Color-index pass plus readback.
    Pick,
}

/// Which command words a draw entry point admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmdFilter {
    /// `draw`: everything except TE/TX.
    NoText,
    /// `draw_text`: TE/TX only.
    TextOnly,
    /// `draw_lights`: LS and AC only.
    LightsOnly,
}

/// Where a plan's vertices live.
#[derive(Debug)]
pub(crate) enum GeomSource {
    /// A span of the object's retained primitive. The engine clones the
    /// uploaded buffer in right after planning, while it still holds the
    /// object borrow; tests leave it `None`.
    FeaturePrim {
        first: u32,
        count: u32,
        topo: Topo,
        buffer: Option<wgpu::Buffer>,
    },
    /// A span of a cached symbol sublist, resolved from the symbol cache at
    /// flush time.
    SymbolPrim {
        name: String,
        sublist: usize,
        first: u32,
        count: u32,
        topo: Topo,
    },
    /// A range of the frame pool's chart (line) vertices.
    Chart { first: u32, count: u32, topo: Topo },
    /// A range of the frame pool's textured-quad vertices.
    Quad { first: u32, count: u32 },
}

/// Which texture a plan samples.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PlanTex {
    None,
    Stipple(LineStyleKind),
    Pattern(String),
    Nodata,
    Atlas,
    Snapshot,
    Raster(u32),
}

/// One recorded draw call, fully resolved but for its GPU buffer.
#[derive(Debug)]
pub(crate) struct DrawPlan {
    pub geom: GeomSource,
    pub tex: PlanTex,
    pub uniforms: Uniforms,
    /// Pick draws run without blending.
    pub opaque: bool,
}

/// Per-frame transient vertex storage, reused across frames (capacity never
/// shrinks below peak).
#[derive(Debug, Default)]
pub(crate) struct FramePool {
    pub chart: Vec<LineVertex>,
    pub quads: Vec<TextVertex>,
}

impl FramePool {
    pub fn begin_frame(&mut self) {
        self.chart.clear();
        self.quads.clear();
    }

    /// Append chart vertices, returning their `(first, count)` range.
    pub fn push_chart(&mut self, verts: &[LineVertex]) -> (u32, u32) {
        let first = self.chart.len() as u32;
        self.chart.extend_from_slice(verts);
        (first, verts.len() as u32)
    }

    pub fn push_quads(&mut self, verts: &[TextVertex]) -> (u32, u32) {
        let first = self.quads.len() as u32;
        self.quads.extend_from_slice(verts);
        (first, verts.len() as u32)
    }
}

/// Read-only inputs of a planning pass.
pub(crate) struct Env<'a> {
    pub view: &'a View,
    pub prj: &'a Projection,
    pub params: &'a MarinerParams,
}

/// The mutable context the command renderer records into.
pub(crate) struct Planner<'a> {
    pub env: Env<'a>,
    pub stacks: &'a mut MatrixStacks,
    pub pool: &'a mut FramePool,
    pub plans: &'a mut Vec<DrawPlan>,
    pub symbols: &'a mut super::symbols::SymbolCache,
    pub atlas: Option<&'a TextAtlas>,
    /// Laid-out static text keyed by (feature id, content hash).
    pub text_cache: &'a mut lru::LruCache<(u32, u64), Vec<TextVertex>>,
    pub cycle: Cycle,
    /// Color-index override during a pick cycle.
    pub pick_color: Option<[f32; 4]>,
    /// Pattern tiles that still need a prerender pass this frame.
    pub pending_tiles: &'a mut Vec<String>,
}

impl<'a> Planner<'a> {
    /// Current composed matrix narrowed for the uniform block.
    pub fn mvp(&self) -> [f32; 16] {
        crate::matrix::to_f32(&self.stacks.composed())
    }

    /// Uniform block under the current matrix with a plain color; the pick
    /// override wins when active.
    pub fn uniforms(&self, color: [f32; 4]) -> Uniforms {
        Uniforms {
            mvp: self.mvp(),
            color: self.pick_color.unwrap_or(color),
            ..Default::default()
        }
    }

    pub fn opaque(&self) -> bool {
        self.cycle == Cycle::Pick
    }

    /// Record a plan, dropping texture-dependent styling during pick.
    pub fn record(&mut self, geom: GeomSource, tex: PlanTex, uniforms: Uniforms) {
        let (tex, uniforms) = if self.cycle == Cycle::Pick {
            // flat index color: no stipple, no pattern, no smoothing
            (
                PlanTex::None,
                Uniforms {
                    mode: crate::pipeline::MODE_SOLID,
                    ..uniforms
                },
            )
        } else {
            (tex, uniforms)
        };
        self.plans.push(DrawPlan {
            geom,
            tex,
            uniforms,
            opaque: self.opaque(),
        });
    }
}

/// One entry of the pick cycle's object list.
#[derive(Debug, Clone)]
pub(crate) struct PickEntry {
    pub index: u32,
    pub id: FeatureId,
    pub name: String,
    pub summary: String,
    pub related: SmallVec<[FeatureId; 2]>,
}

#[derive(Debug, Default)]
pub(crate) struct PickState {
    pub cursor: (u32, u32),
    pub next_index: u32,
    pub entries: Vec<PickEntry>,
    pub result: Option<String>,
    /// "id,KEY:val,…" attribute report of the winner.
    pub result_summary: Option<String>,
    pub picked: Vec<FeatureId>,
}

impl PickState {
    pub fn reset(&mut self) {
        self.next_index = 0;
        self.entries.clear();
        self.result = None;
        self.result_summary = None;
        self.picked.clear();
    }
}

/// Reusable scratch the engine hands around; trimmed by policy, never read
/// and written concurrently (single-threaded contract).
#[derive(Debug, Default)]
pub(crate) struct EngineScratch {
    pub readback: Vec<u8>,
    /// Feature class names already warned about this session.
    pub warned: ahash::HashSet<String>,
}

impl EngineScratch {
    /// Log a per-feature failure once per class name.
    pub fn warn_once(&mut self, name: &str, what: &str) {
        if self.warned.insert(name.to_owned()) {
            log::warn!("{name}: {what} (skipping; further {name} warnings muted)");
        }
    }
}
