//! Symbol cache and SY command rendering.
//!
//! HPGL-style vector definitions are compiled once into per-color-sublist
//! primitives and reused frame after frame; a palette or PLib reload flags
//! every entry for rebuild. The SY renderer places symbols at points, at the
//! nearest-segment midpoint of lines, or at every cached centroid of areas,
//! with dedicated paths for the mariner's own ship, AIS/ARPA targets and the
//! calibration symbols.

use ahash::HashMap;

use crate::color::palette;
use crate::error::Result;
use crate::geo::{Feature, GeoKind};
use crate::params::MarParam;
use crate::pipeline::Topo;
use crate::plib::{S52Object, TileSpec, VectorDef, VectorOp};
use crate::primitive::{DrawMode, Primitive, Span};
use crate::projection::METERS_PER_NM;

use super::types::{GeomSource, PlanTex, Planner};

/// Ship silhouettes shorter than this on screen fall back to the point
/// symbol.
pub const SHIPS_OUTLINE_MM: f64 = 6.0;

const CIRCLE_SEGS: usize = 24;

/// One compiled symbol: a primitive per color sublist, drawn in order.
#[derive(Debug)]
pub struct SymbolPrims {
    pub sublists: Vec<(String, Primitive)>,
    pub pen_width: u8,
    pub symlen: f64,
    pub tile: Option<TileSpec>,
    pub size: (f64, f64),
    pub pivot: (f64, f64),
    /// Rebuild on next use (palette/PLib reload).
    pub create: bool,
}

#[derive(Debug, Default)]
pub struct SymbolCache {
    defs: HashMap<String, VectorDef>,
    built: HashMap<String, SymbolPrims>,
}

impl SymbolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a vector definition from the presentation
    /// library.
    pub fn add_def(&mut self, def: VectorDef) {
        if let Some(built) = self.built.get_mut(&def.name) {
            built.create = true;
        }
        self.defs.insert(def.name.clone(), def);
    }

    pub fn has_def(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// Flag every compiled symbol for rebuild (palette switch).
    pub fn invalidate_all(&mut self) {
        for built in self.built.values_mut() {
            built.create = true;
        }
    }

    /// Drop GPU handles only (device loss); CPU primitives stay valid.
    pub fn invalidate_gpu(&mut self) {
        for built in self.built.values_mut() {
            for (_, prim) in built.sublists.iter_mut() {
                prim.invalidate_gpu();
            }
        }
    }

    /// Compile-on-demand lookup.
    pub fn get(&mut self, name: &str) -> Option<&SymbolPrims> {
        let needs_build = match self.built.get(name) {
            Some(b) => b.create,
            None => true,
        };
        if needs_build {
            let def = self.defs.get(name)?;
            let built = build_symbol(def);
            self.built.insert(name.to_owned(), built);
        }
        self.built.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SymbolPrims> {
        self.get(name)?;
        self.built.get_mut(name)
    }

    /// Rebuild everything flagged `create`; called from `begin` so no build
    /// happens mid-frame.
    pub fn build_pending(&mut self) {
        let names: Vec<String> = self
            .built
            .iter()
            .filter(|(_, b)| b.create)
            .map(|(n, _)| n.clone())
            .collect();
        for name in names {
            if let Some(def) = self.defs.get(&name) {
                let built = build_symbol(def);
                self.built.insert(name, built);
            }
        }
    }
}

/// Compile one vector definition: pivot-relative, Y up, units of 0.01 mm.
fn build_symbol(def: &VectorDef) -> SymbolPrims {
    let mut sublists: Vec<(String, Primitive)> = Vec::new();
    let mut pen_width = def.pen_width;
    let (px, py) = def.pivot;
    let local = |x: f64, y: f64| -> (f32, f32) { ((x - px) as f32, (py - y) as f32) };

    // ops before the first color select draw in the ship's default ink
    let mut current = 0usize;
    sublists.push(("CHBLK".to_owned(), Primitive::new()));

    let mut cursor = (0.0f32, 0.0f32);
    for op in &def.ops {
        match op {
            VectorOp::SetColor(token) => {
                if sublists[current].1.vertex_count() == 0 {
                    sublists[current].0 = token.clone();
                } else {
                    sublists.push((token.clone(), Primitive::new()));
                    current = sublists.len() - 1;
                }
            }
            VectorOp::SetWidth(w) => pen_width = *w,
            VectorOp::MoveTo(x, y) => cursor = local(*x, *y),
            VectorOp::PolyLine(points) => {
                let prim = &mut sublists[current].1;
                prim.begin_prim(DrawMode::LineStrip);
                prim.append_vertex(cursor.0, cursor.1, 0.0);
                for (x, y) in points {
                    let (lx, ly) = local(*x, *y);
                    prim.append_vertex(lx, ly, 0.0);
                    cursor = (lx, ly);
                }
                prim.end_prim();
            }
            VectorOp::Circle { radius, fill } => {
                let prim = &mut sublists[current].1;
                let r = *radius as f32;
                if *fill {
                    prim.begin_prim(DrawMode::Triangles);
                    for i in 0..CIRCLE_SEGS {
                        let a0 = (i as f32 / CIRCLE_SEGS as f32) * std::f32::consts::TAU;
                        let a1 = ((i + 1) as f32 / CIRCLE_SEGS as f32) * std::f32::consts::TAU;
                        prim.append_vertex(cursor.0, cursor.1, 0.0);
                        prim.append_vertex(cursor.0 + r * a0.cos(), cursor.1 + r * a0.sin(), 0.0);
                        prim.append_vertex(cursor.0 + r * a1.cos(), cursor.1 + r * a1.sin(), 0.0);
                    }
                    prim.end_prim();
                } else {
                    prim.begin_prim(DrawMode::LineStrip);
                    for i in 0..=CIRCLE_SEGS {
                        let a = (i as f32 / CIRCLE_SEGS as f32) * std::f32::consts::TAU;
                        prim.append_vertex(cursor.0 + r * a.cos(), cursor.1 + r * a.sin(), 0.0);
                    }
                    prim.end_prim();
                }
            }
            VectorOp::Polygon(points) => {
                if points.len() >= 3 {
                    let prim = &mut sublists[current].1;
                    prim.begin_prim(DrawMode::Triangles);
                    let (x0, y0) = local(points[0].0, points[0].1);
                    for w in points[1..].windows(2) {
                        let (x1, y1) = local(w[0].0, w[0].1);
                        let (x2, y2) = local(w[1].0, w[1].1);
                        prim.append_vertex(x0, y0, 0.0);
                        prim.append_vertex(x1, y1, 0.0);
                        prim.append_vertex(x2, y2, 0.0);
                    }
                    prim.end_prim();
                    cursor = (x0, y0);
                }
            }
            VectorOp::Translate(x, y) => {
                let prim = &mut sublists[current].1;
                let (lx, ly) = local(*x, *y);
                prim.begin_prim(DrawMode::Translate);
                prim.append_vertex(lx, ly, 0.0);
                prim.end_prim();
            }
        }
    }

    SymbolPrims {
        sublists,
        pen_width,
        symlen: def.symlen,
        tile: def.tile,
        size: def.size,
        pivot: def.pivot,
        create: false,
    }
}

fn span_topo(mode: DrawMode) -> Topo {
    match mode {
        DrawMode::Points => Topo::Points,
        DrawMode::Lines => Topo::Lines,
        DrawMode::LineStrip | DrawMode::LineLoop => Topo::LineStrip,
        DrawMode::Triangles => Topo::Triangles,
        DrawMode::TriangleStrip | DrawMode::TriangleFan => Topo::TriangleStrip,
        DrawMode::Translate => Topo::Points, // not drawn
    }
}

pub(crate) enum SymStep {
    Draw {
        sublist: usize,
        color: [f32; 4],
        span: Span,
    },
    Translate([f32; 3]),
}

/// Copy the per-span plan of a symbol out of the cache so the borrow does
/// not outlive the recording below.
pub(crate) fn collect_steps(sym: &SymbolPrims) -> Vec<SymStep> {
    let mut steps = Vec::new();
    for (idx, (token, prim)) in sym.sublists.iter().enumerate() {
        let color = palette(token).normalize();
        for span in prim.spans() {
            if span.mode == DrawMode::Translate {
                let v = prim.vertices()[span.first as usize];
                steps.push(SymStep::Translate(v));
            } else if span.count > 0 {
                steps.push(SymStep::Draw {
                    sublist: idx,
                    color,
                    span: *span,
                });
            }
        }
    }
    steps
}

/// World units spanned by one 0.01 mm symbol unit at the current view.
pub(crate) fn world_per_symbol_unit(p: &Planner) -> (f64, f64) {
    let v = p.env.view;
    (
        v.meters_per_pixel_x() * 0.01 / v.dotpitch_mm_x,
        v.meters_per_pixel_y() * 0.01 / v.dotpitch_mm_y,
    )
}

/// Place one symbol at a projected position, rotated `rot_deg` plus the view
/// heading, scaled so 0.01 mm of definition is one dot on screen.
pub(crate) fn plan_symbol(p: &mut Planner, name: &str, world: (f64, f64), rot_deg: f64) -> bool {
    plan_symbol_scaled(p, name, world, rot_deg, None)
}

/// `world_scale` overrides the default to-scale factor (ship silhouettes).
pub(crate) fn plan_symbol_scaled(
    p: &mut Planner,
    name: &str,
    world: (f64, f64),
    rot_deg: f64,
    world_scale: Option<(f64, f64)>,
) -> bool {
    let steps = match p.symbols.get(name) {
        Some(sym) => collect_steps(sym),
        None => {
            log::debug!("symbol {name} has no definition");
            return false;
        }
    };

    let (sx, sy) = world_scale.unwrap_or_else(|| world_per_symbol_unit(p));

    p.stacks.set_mode(crate::matrix::MatrixMode::Modelview);
    p.stacks.push();
    p.stacks.translate(world.0, world.1, 0.0);
    p.stacks.rotate_z(rot_deg + p.env.view.north_deg);
    p.stacks.scale(sx, sy, 1.0);

    for step in steps {
        match step {
            SymStep::Translate(v) => {
                p.stacks.translate(v[0] as f64, v[1] as f64, v[2] as f64);
            }
            SymStep::Draw {
                sublist,
                color,
                span,
            } => {
                let uniforms = p.uniforms(color);
                p.record(
                    GeomSource::SymbolPrim {
                        name: name.to_owned(),
                        sublist,
                        first: span.first,
                        count: span.count,
                        topo: span_topo(span.mode),
                    },
                    PlanTex::None,
                    uniforms,
                );
            }
        }
    }

    p.stacks.pop();
    true
}

pub(crate) fn attr_f64(feature: &Feature, key: &str) -> Option<f64> {
    feature.attribute(key).and_then(|v| v.parse::<f64>().ok())
}

/// Representative position for a SY command by feature kind. Lines anchor at
/// the midpoint of the segment whose midpoint is nearest the view center;
/// areas at every cached centroid.
pub(crate) fn symbol_anchors(p: &mut Planner, obj: &mut S52Object) -> Vec<(f64, f64)> {
    match obj.feature.kind() {
        GeoKind::Point => match obj.feature.ring(0) {
            Some((_, pts)) => vec![(pts[0][0], pts[0][1])],
            None => Vec::new(),
        },
        GeoKind::Line => {
            let Some((npt, pts)) = obj.feature.ring(0) else {
                return Vec::new();
            };
            let n = obj.feature.geo_size().min(npt);
            if n < 2 {
                return Vec::new();
            }
            let (cx, cy) = p.env.view.projected_center();
            let mut best = f64::INFINITY;
            let mut anchor = (pts[0][0], pts[0][1]);
            for w in pts[..n].windows(2) {
                let mx = (w[0][0] + w[1][0]) * 0.5;
                let my = (w[0][1] + w[1][1]) * 0.5;
                let d = (mx - cx) * (mx - cx) + (my - cy) * (my - cy);
                if d < best {
                    best = d;
                    anchor = (mx, my);
                }
            }
            vec![anchor]
        }
        GeoKind::Area => {
            if !obj.feature.has_centroid() {
                let view = p.env.view.projected_extent();
                let search = p.env.params.is_on(MarParam::DispCentroids);
                crate::centroid::compute_centroids(&mut obj.feature, &view, search);
            }
            let mut anchors = Vec::new();
            if obj.feature.has_centroid() {
                while let Some(c) = obj.feature.next_centroid() {
                    anchors.push(c);
                }
            }
            anchors
        }
        GeoKind::Meta => Vec::new(),
    }
}

/// Course/speed pair for vector symbols under the current stabilization
/// mode: 0 none, 1 ground (COG/SOG), 2 water (CTW/STW).
pub(crate) fn vector_course_speed(feature: &Feature, vecstb: f64) -> Option<(f64, f64)> {
    match vecstb as i64 {
        1 => Some((attr_f64(feature, "cogcrs")?, attr_f64(feature, "sogspd")?)),
        2 => Some((attr_f64(feature, "ctwcrs")?, attr_f64(feature, "stwspd")?)),
        _ => None,
    }
}

/// Position `minutes` down the course vector, meters.
pub(crate) fn vector_point(origin: (f64, f64), course_deg: f64, speed_kt: f64, minutes: f64) -> (f64, f64) {
    let dist = speed_kt * METERS_PER_NM * minutes / 60.0;
    let rad = course_deg.to_radians();
    (origin.0 + dist * rad.sin(), origin.1 + dist * rad.cos())
}

/// The SY dispatcher: first the special symbol names, then the generic path.
pub(crate) fn plan_sy(p: &mut Planner, obj: &mut S52Object, name: &str, rot_deg: f64) -> Result<()> {
    match name {
        "OWNSHP01" | "OWNSHP05" | "AISVES01" | "AISSLP01" | "AISDEF01" | "ARPATG01" => {
            plan_vessel(p, obj, name);
            Ok(())
        }
        "VECGND01" | "VECWTR01" => {
            plan_vector_symbol(p, obj, name);
            Ok(())
        }
        "OSPSIX02" | "AISSIX01" | "ARPSIX01" => {
            plan_time_ticks(p, obj, name, 6.0);
            Ok(())
        }
        "OSPONE02" | "AISONE01" | "ARPONE01" => {
            plan_time_ticks(p, obj, name, 1.0);
            Ok(())
        }
        "SCALEB10" => {
            plan_scale_bar(p, 10.0);
            Ok(())
        }
        "SCALEB11" => {
            plan_scale_bar(p, 100.0);
            Ok(())
        }
        "NORTHAR1" => {
            plan_window_symbol(p, name, (25.0, -25.0), -p.env.view.north_deg);
            Ok(())
        }
        "UNITMTR1" => {
            plan_window_symbol(p, name, (10.0, 10.0), 0.0);
            Ok(())
        }
        "CHKSYM01" => {
            plan_window_symbol(p, name, (5.0, -10.0), 0.0);
            Ok(())
        }
        "BLKADJ01" => {
            plan_window_symbol(p, name, (12.0, -10.0), 0.0);
            Ok(())
        }
        "SOUNDG" => {
            plan_sounding(p, obj);
            Ok(())
        }
        _ => {
            // generic path, LOWACC01 and LIGHTS05 included: orientation from
            // the PLib rotation plus the object's own ORIENT when present
            let orient = attr_f64(&obj.feature, "ORIENT").unwrap_or(0.0);
            let anchors = symbol_anchors(p, obj);
            for world in anchors {
                plan_symbol(p, name, world, rot_deg + orient);
            }
            Ok(())
        }
    }
}

/// Own ship / vessel: point symbol, or the silhouette to scale once its
/// projected length beats the outline threshold.
fn plan_vessel(p: &mut Planner, obj: &mut S52Object, name: &str) {
    let Some((_, pts)) = obj.feature.ring(0) else {
        return;
    };
    let world = (pts[0][0], pts[0][1]);
    let heading = attr_f64(&obj.feature, "headng")
        .or_else(|| attr_f64(&obj.feature, "cogcrs"))
        .unwrap_or(0.0);

    let shplen = attr_f64(&obj.feature, "shplen").unwrap_or(0.0);
    let view = p.env.view;
    let outline_px = SHIPS_OUTLINE_MM / view.dotpitch_mm_y;
    let ship_px = shplen / view.meters_per_pixel_y();

    if p.env.params.is_on(MarParam::ShipsOutline) && ship_px > outline_px && shplen > 0.0 {
        // silhouette stretched so its nominal length covers shplen meters
        let nominal_units = p.symbols.get(name).map(|s| s.size.1).unwrap_or(0.0);
        if nominal_units > 0.0 {
            let per_unit = shplen / nominal_units;
            plan_symbol_scaled(p, name, world, heading, Some((per_unit, per_unit)));
            return;
        }
    }
    plan_symbol(p, name, world, heading);
}

fn plan_vector_symbol(p: &mut Planner, obj: &mut S52Object, name: &str) {
    let Some((_, pts)) = obj.feature.ring(0) else {
        return;
    };
    let origin = (pts[0][0], pts[0][1]);
    let vecstb = match name {
        "VECGND01" => 1.0,
        "VECWTR01" => 2.0,
        _ => p.env.params.get(MarParam::VecStab),
    };
    let Some((course, speed)) = vector_course_speed(&obj.feature, vecstb) else {
        return;
    };
    let minutes = p.env.params.get(MarParam::VecMul);
    let tip = vector_point(origin, course, speed, minutes);
    super::lines::plan_world_lines(
        p,
        &[origin, tip],
        palette("SHIPS").normalize(),
        crate::plib::LineStyleKind::Solid,
        1,
    );
    plan_symbol(p, name, tip, course);
}

/// Tick symbols at every `interval_min` multiple along the course vector.
fn plan_time_ticks(p: &mut Planner, obj: &mut S52Object, name: &str, interval_min: f64) {
    let Some((_, pts)) = obj.feature.ring(0) else {
        return;
    };
    let origin = (pts[0][0], pts[0][1]);
    let vecstb = p.env.params.get(MarParam::VecStab);
    let Some((course, speed)) = vector_course_speed(&obj.feature, vecstb) else {
        return;
    };
    let minutes = p.env.params.get(MarParam::VecMul);
    let mut t = interval_min;
    while t <= minutes + 1e-9 {
        let pos = vector_point(origin, course, speed, t);
        plan_symbol(p, name, pos, course);
        t += interval_min;
    }
}

/// A symbol anchored in window millimeters; negative offsets hang from the
/// opposite edge.
fn plan_window_symbol(p: &mut Planner, name: &str, offset_mm: (f64, f64), rot_deg: f64) {
    let view = p.env.view;
    let px = if offset_mm.0 >= 0.0 {
        offset_mm.0 * view.px_per_mm_x()
    } else {
        view.vp_w as f64 + offset_mm.0 * view.px_per_mm_x()
    };
    let py = if offset_mm.1 >= 0.0 {
        offset_mm.1 * view.px_per_mm_y()
    } else {
        view.vp_h as f64 + offset_mm.1 * view.px_per_mm_y()
    };
    // window frame: one symbol unit is 0.01 mm of screen
    super::frame::with_window_frame(p, |p| {
        let unit = (0.01 / p.env.view.dotpitch_mm_x, 0.01 / p.env.view.dotpitch_mm_y);
        plan_symbol_scaled(p, name, (px, py), rot_deg - p.env.view.north_deg, Some(unit));
    });
}

/// Vertical scale bar at the left edge: `len_mm` of screen.
fn plan_scale_bar(p: &mut Planner, len_mm: f64) {
    let view = p.env.view;
    let x = 5.0 * view.px_per_mm_x();
    let y0 = 5.0 * view.px_per_mm_y();
    let y1 = y0 + len_mm * view.px_per_mm_y();
    let color = palette("SCLBR").normalize();
    super::frame::with_window_frame(p, |p| {
        super::lines::plan_window_lines(p, &[(x, y0), (x, y1)], color, 2);
    });
}

/// Sounding: the depth value as small chart-gray digits at the point.
fn plan_sounding(p: &mut Planner, obj: &mut S52Object) {
    let Some((_, pts)) = obj.feature.ring(0) else {
        return;
    };
    let depth = pts[0][2];
    let text = if depth < 31.0 {
        format!("{:.1}", depth)
    } else {
        format!("{}", depth.round() as i64)
    };
    let color = if depth <= 10.0 { "SNDG2" } else { "SNDG1" };
    super::text::plan_string_world(p, pts[0][0], pts[0][1], &text, 0, color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plib::VectorKind;

    fn buoy_def() -> VectorDef {
        VectorDef::builder("BOYLAT23", VectorKind::Symbol)
            .pivot(100.0, 100.0)
            .size(200.0, 200.0)
            .op(VectorOp::SetColor("CHBLK".into()))
            .op(VectorOp::MoveTo(100.0, 100.0))
            .op(VectorOp::Circle {
                radius: 80.0,
                fill: false,
            })
            .op(VectorOp::SetColor("CHYLW".into()))
            .op(VectorOp::Polygon(vec![
                (40.0, 40.0),
                (160.0, 40.0),
                (100.0, 160.0),
            ]))
            .build()
    }

    #[test]
    fn build_splits_color_sublists_in_order() {
        let sym = build_symbol(&buoy_def());
        assert_eq!(sym.sublists.len(), 2);
        assert_eq!(sym.sublists[0].0, "CHBLK");
        assert_eq!(sym.sublists[1].0, "CHYLW");
        // outline circle: closed strip
        let outline = &sym.sublists[0].1;
        assert_eq!(outline.spans()[0].mode, DrawMode::LineStrip);
        assert_eq!(outline.spans()[0].count as usize, CIRCLE_SEGS + 1);
        // filled triangle fan-expanded
        let fill = &sym.sublists[1].1;
        assert_eq!(fill.spans()[0].mode, DrawMode::Triangles);
        assert_eq!(fill.spans()[0].count, 3);
        assert!(outline.spans_consistent() && fill.spans_consistent());
    }

    #[test]
    fn vertices_are_pivot_relative_y_up() {
        let def = VectorDef::builder("T", VectorKind::Symbol)
            .pivot(100.0, 100.0)
            .op(VectorOp::SetColor("CHBLK".into()))
            .op(VectorOp::MoveTo(100.0, 40.0))
            .op(VectorOp::PolyLine(vec![(100.0, 160.0)]))
            .build();
        let sym = build_symbol(&def);
        let verts = sym.sublists[0].1.vertices();
        // above the pivot in HPGL (smaller y) becomes +y locally
        assert_eq!(verts[0], [0.0, 60.0, 0.0]);
        assert_eq!(verts[1], [0.0, -60.0, 0.0]);
    }

    #[test]
    fn cache_rebuilds_after_invalidate() {
        let mut cache = SymbolCache::new();
        cache.add_def(buoy_def());
        assert!(cache.get("BOYLAT23").is_some());
        assert!(!cache.get("BOYLAT23").unwrap().create);
        cache.invalidate_all();
        assert!(cache.built.get("BOYLAT23").unwrap().create);
        cache.build_pending();
        assert!(!cache.built.get("BOYLAT23").unwrap().create);
        assert!(cache.get("NOSUCH00").is_none());
    }

    #[test]
    fn vector_point_goes_north_for_course_zero() {
        let (x, y) = vector_point((10.0, 20.0), 0.0, 10.0, 6.0);
        assert!((x - 10.0).abs() < 1e-9);
        // 10 kt for 6 min = 1 NM
        assert!((y - (20.0 + METERS_PER_NM)).abs() < 1e-9);
    }
}
