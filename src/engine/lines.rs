//! Line rendering: simple linestyles (LS), complex linestyles (LC),
//! light-sector legs and disks, VRM/EBL rings and route-leg arcs.
//!
//! Lines render from world coordinates under the chart projection. Dash and
//! dot styles sample a one-row mask texture whose U coordinate is the
//! running length in screen pixels over 32; pens wider than one dot are
//! expanded into triangle pairs on the CPU.

use crate::color::palette;
use crate::error::{Result, S52Error};
use crate::geo::{Extent, Feature, GeoKind};
use crate::params::MarParam;
use crate::pipeline::{LineVertex, Topo, Uniforms, MODE_STIPPLE};
use crate::plib::{LineStyleKind, S52Object};
use crate::projection::METERS_PER_NM;

use super::symbols::{attr_f64, world_per_symbol_unit};
use super::types::{GeomSource, PlanTex, Planner};

/// S-52 pen width unit, millimeters.
pub const PEN_UNIT_MM: f64 = 0.32;

// Cohen–Sutherland region codes
const INSIDE: u8 = 0;
const LEFT: u8 = 1;
const RIGHT: u8 = 2;
const BOTTOM: u8 = 4;
const TOP: u8 = 8;

fn out_code(x: f64, y: f64, r: &Extent) -> u8 {
    let mut code = INSIDE;
    if x < r.w {
        code |= LEFT;
    } else if x > r.e {
        code |= RIGHT;
    }
    if y < r.s {
        code |= BOTTOM;
    } else if y > r.n {
        code |= TOP;
    }
    code
}

/// Cohen–Sutherland segment clip. Both endpoints of the result lie in or on
/// the rectangle; `None` when the segment misses it entirely.
pub fn clip_segment(
    mut x0: f64,
    mut y0: f64,
    mut x1: f64,
    mut y1: f64,
    rect: &Extent,
) -> Option<((f64, f64), (f64, f64))> {
    let mut code0 = out_code(x0, y0, rect);
    let mut code1 = out_code(x1, y1, rect);

    loop {
        if code0 | code1 == 0 {
            return Some(((x0, y0), (x1, y1)));
        }
        if code0 & code1 != 0 {
            return None;
        }
        let code_out = if code0 != 0 { code0 } else { code1 };
        let (x, y);
        if code_out & TOP != 0 {
            x = x0 + (x1 - x0) * (rect.n - y0) / (y1 - y0);
            y = rect.n;
        } else if code_out & BOTTOM != 0 {
            x = x0 + (x1 - x0) * (rect.s - y0) / (y1 - y0);
            y = rect.s;
        } else if code_out & RIGHT != 0 {
            y = y0 + (y1 - y0) * (rect.e - x0) / (x1 - x0);
            x = rect.e;
        } else {
            y = y0 + (y1 - y0) * (rect.w - x0) / (x1 - x0);
            x = rect.w;
        }
        if code_out == code0 {
            x0 = x;
            y0 = y;
            code0 = out_code(x0, y0, rect);
        } else {
            x1 = x;
            y1 = y;
            code1 = out_code(x1, y1, rect);
        }
    }
}

fn pen_width_px(p: &Planner, width: u8) -> f64 {
    (width.max(1) as f64) * PEN_UNIT_MM / p.env.view.dotpitch_mm_x
}

fn stipple_tex(style: LineStyleKind) -> PlanTex {
    match style {
        LineStyleKind::Solid => PlanTex::None,
        other => PlanTex::Stipple(other),
    }
}

fn line_uniforms(p: &Planner, color: [f32; 4], style: LineStyleKind) -> Uniforms {
    let mut u = p.uniforms(color);
    if style != LineStyleKind::Solid && p.pick_color.is_none() {
        u.mode = MODE_STIPPLE;
        u.stipple_px = 32.0;
    }
    u
}

/// Record a polyline in world coordinates. Wide pens become triangle pairs;
/// the running pixel distance rides along for the stipple shader either way.
pub(crate) fn plan_world_lines(
    p: &mut Planner,
    pts: &[(f64, f64)],
    color: [f32; 4],
    style: LineStyleKind,
    width: u8,
) {
    if pts.len() < 2 {
        return;
    }
    let mpp = p.env.view.meters_per_pixel_x();
    let width_px = pen_width_px(p, width);
    let uniforms = line_uniforms(p, color, style);

    if width_px <= 1.5 {
        let mut verts = Vec::with_capacity(pts.len());
        let mut dist_px = 0.0f64;
        let mut prev = pts[0];
        for (i, &(x, y)) in pts.iter().enumerate() {
            if i > 0 {
                dist_px += ((x - prev.0).hypot(y - prev.1)) / mpp;
            }
            prev = (x, y);
            verts.push(LineVertex {
                position: [x as f32, y as f32, 0.0],
                dist: dist_px as f32,
            });
        }
        let (first, count) = p.pool.push_chart(&verts);
        p.record(
            GeomSource::Chart {
                first,
                count,
                topo: Topo::LineStrip,
            },
            stipple_tex(style),
            uniforms,
        );
        return;
    }

    // quad expansion: two triangles per segment, distance per endpoint
    let half_w = width_px * mpp * 0.5;
    let mut verts = Vec::with_capacity((pts.len() - 1) * 6);
    let mut dist_px = 0.0f64;
    for w in pts.windows(2) {
        let (x0, y0) = w[0];
        let (x1, y1) = w[1];
        let len = (x1 - x0).hypot(y1 - y0);
        if len <= 0.0 {
            continue;
        }
        let nx = -(y1 - y0) / len * half_w;
        let ny = (x1 - x0) / len * half_w;
        let d0 = dist_px as f32;
        dist_px += len / mpp;
        let d1 = dist_px as f32;
        let quad = [
            ([x0 + nx, y0 + ny], d0),
            ([x0 - nx, y0 - ny], d0),
            ([x1 + nx, y1 + ny], d1),
            ([x1 + nx, y1 + ny], d1),
            ([x0 - nx, y0 - ny], d0),
            ([x1 - nx, y1 - ny], d1),
        ];
        for ([x, y], dist) in quad {
            verts.push(LineVertex {
                position: [x as f32, y as f32, 0.0],
                dist,
            });
        }
    }
    let (first, count) = p.pool.push_chart(&verts);
    p.record(
        GeomSource::Chart {
            first,
            count,
            topo: Topo::Triangles,
        },
        stipple_tex(style),
        uniforms,
    );
}

/// Polyline in window pixels; the window matrix frame must be active.
pub(crate) fn plan_window_lines(p: &mut Planner, pts: &[(f64, f64)], color: [f32; 4], width: u8) {
    if pts.len() < 2 {
        return;
    }
    let width_px = pen_width_px(p, width);
    let uniforms = p.uniforms(color);
    let mut verts = Vec::new();
    if width_px <= 1.5 {
        let mut dist = 0.0f64;
        let mut prev = pts[0];
        for (i, &(x, y)) in pts.iter().enumerate() {
            if i > 0 {
                dist += (x - prev.0).hypot(y - prev.1);
            }
            prev = (x, y);
            verts.push(LineVertex {
                position: [x as f32, y as f32, 0.0],
                dist: dist as f32,
            });
        }
        let (first, count) = p.pool.push_chart(&verts);
        p.record(
            GeomSource::Chart {
                first,
                count,
                topo: Topo::LineStrip,
            },
            PlanTex::None,
            uniforms,
        );
        return;
    }
    let half = width_px * 0.5;
    for w in pts.windows(2) {
        let (x0, y0) = w[0];
        let (x1, y1) = w[1];
        let len = (x1 - x0).hypot(y1 - y0);
        if len <= 0.0 {
            continue;
        }
        let nx = -(y1 - y0) / len * half;
        let ny = (x1 - x0) / len * half;
        for [x, y] in [
            [x0 + nx, y0 + ny],
            [x0 - nx, y0 - ny],
            [x1 + nx, y1 + ny],
            [x1 + nx, y1 + ny],
            [x0 - nx, y0 - ny],
            [x1 - nx, y1 - ny],
        ] {
            verts.push(LineVertex {
                position: [x as f32, y as f32, 0.0],
                dist: 0.0,
            });
        }
    }
    let (first, count) = p.pool.push_chart(&verts);
    p.record(
        GeomSource::Chart {
            first,
            count,
            topo: Topo::Triangles,
        },
        PlanTex::None,
        uniforms,
    );
}

fn active_line_points(obj: &S52Object) -> Vec<(f64, f64)> {
    let Some((npt, pts)) = obj.feature.ring(0) else {
        return Vec::new();
    };
    let n = obj.feature.geo_size().min(npt).max(0);
    pts[..n].iter().map(|pt| (pt[0], pt[1])).collect()
}

/// LS dispatcher, including the special mariner-object paths.
pub(crate) fn plan_ls(
    p: &mut Planner,
    obj: &mut S52Object,
    style: LineStyleKind,
    width: u8,
    color_token: &str,
) -> Result<()> {
    let color = palette(color_token).normalize();

    // light-sector legs: dashed radials at the sector limit bearings
    if obj.feature.name() == "LIGHTS"
        && obj.feature.kind() == GeoKind::Point
        && obj.feature.attribute("SECTR1").is_some()
    {
        plan_sector_legs(p, obj, color);
        return Ok(());
    }

    match obj.feature.name() {
        "afgves" | "afgshp" => {
            plan_afterglow(p, obj, color);
            return Ok(());
        }
        "ownshp" => {
            plan_ownshp_lines(p, obj, color, width);
            return Ok(());
        }
        "vessel" => {
            // close-quarters situation switches the target's lines to dash
            let style = if obj.feature.attribute("_close_quarters").is_some() {
                LineStyleKind::Dashed
            } else {
                style
            };
            let pts = active_line_points(obj);
            if pts.len() >= 2 {
                plan_world_lines(p, &pts, color, style, width);
            }
            return Ok(());
        }
        "leglin" => {
            return plan_leglin_lines(p, obj, color, width);
        }
        "pastrk" => {
            plan_pastrk_lines(p, obj, color, style, width);
            return Ok(());
        }
        _ => {}
    }

    let pts = active_line_points(obj);
    if pts.len() < 2 {
        return Ok(());
    }
    plan_world_lines(p, &pts, color, style, width);
    Ok(())
}

/// Own-ship heading line out to the view edge plus the beam bearing stub.
fn plan_ownshp_lines(p: &mut Planner, obj: &mut S52Object, color: [f32; 4], width: u8) {
    let Some((_, pts)) = obj.feature.ring(0) else {
        return;
    };
    let origin = (pts[0][0], pts[0][1]);
    let Some(heading) = attr_f64(&obj.feature, "headng") else {
        return;
    };
    let view = p.env.view.projected_extent();
    let reach = (view.e - view.w) + (view.n - view.s);
    let rad = heading.to_radians();
    let tip = (origin.0 + reach * rad.sin(), origin.1 + reach * rad.cos());
    if let Some((a, b)) = clip_segment(origin.0, origin.1, tip.0, tip.1, &view) {
        plan_world_lines(p, &[a, b], color, LineStyleKind::Solid, width);
    }
    // beam bearing stub, 10 mm each side
    let beam = heading + 90.0;
    let brad = beam.to_radians();
    let half = 10.0 / p.env.view.dotpitch_mm_x * p.env.view.meters_per_pixel_x();
    let p0 = (origin.0 - half * brad.sin(), origin.1 - half * brad.cos());
    let p1 = (origin.0 + half * brad.sin(), origin.1 + half * brad.cos());
    plan_world_lines(p, &[p0, p1], color, LineStyleKind::Solid, width);
}

/// Afterglow trail: alpha-decaying points from newest to oldest, bucketed
/// into four fades.
fn plan_afterglow(p: &mut Planner, obj: &mut S52Object, color: [f32; 4]) {
    let pts = active_line_points(obj);
    if pts.is_empty() {
        return;
    }
    let buckets = 4usize;
    let chunk = pts.len().div_ceil(buckets);
    for (i, part) in pts.chunks(chunk).enumerate() {
        let alpha = 1.0 - i as f32 / buckets as f32;
        let mut c = color;
        c[3] *= alpha;
        let verts: Vec<LineVertex> = part
            .iter()
            .map(|&(x, y)| LineVertex {
                position: [x as f32, y as f32, 0.0],
                dist: 0.0,
            })
            .collect();
        let uniforms = p.uniforms(c);
        let (first, count) = p.pool.push_chart(&verts);
        p.record(
            GeomSource::Chart {
                first,
                count,
                topo: Topo::Points,
            },
            PlanTex::None,
            uniforms,
        );
    }
}

/// Pull a route leg's endpoints back by the connecting-arc radii: the leg's
/// own `_wholin_dist` shortens its end, the previous leg's (carried by the
/// scene on `_prev_wholin_dist`) shortens its start.
fn wholin_shorten(feature: &Feature, a: (f64, f64), b: (f64, f64)) -> ((f64, f64), (f64, f64)) {
    let end_cut = attr_f64(feature, "_wholin_dist").unwrap_or(0.0) * METERS_PER_NM;
    let start_cut = attr_f64(feature, "_prev_wholin_dist").unwrap_or(0.0) * METERS_PER_NM;
    let len = (b.0 - a.0).hypot(b.1 - a.1);
    if len > start_cut + end_cut && len > 0.0 {
        let ux = (b.0 - a.0) / len;
        let uy = (b.1 - a.1) / len;
        return (
            (a.0 + ux * start_cut, a.1 + uy * start_cut),
            (b.0 - ux * end_cut, b.1 - uy * end_cut),
        );
    }
    (a, b)
}

/// Route leg under LS: a dotted line with its ends pulled back by the turn
/// radii so the transition arcs can take over the corners.
fn plan_leglin_lines(
    p: &mut Planner,
    obj: &mut S52Object,
    color: [f32; 4],
    width: u8,
) -> Result<()> {
    let pts = active_line_points(obj);
    if pts.len() != 2 {
        return Err(S52Error::BadGeometry("leglin must have exactly 2 vertices"));
    }
    let view = p.env.view.projected_extent();
    let Some((a, b)) = clip_segment(pts[0].0, pts[0].1, pts[1].0, pts[1].1, &view) else {
        return Ok(());
    };
    let (a, b) = wholin_shorten(&obj.feature, a, b);
    plan_world_lines(p, &[a, b], color, LineStyleKind::Dotted, width);
    Ok(())
}

/// Past-track: the recorded trail in the commanded style, with a small
/// cross tick at every fix (the time labels ride in on TE during Last).
fn plan_pastrk_lines(
    p: &mut Planner,
    obj: &mut S52Object,
    color: [f32; 4],
    style: LineStyleKind,
    width: u8,
) {
    let pts = active_line_points(obj);
    if pts.len() < 2 {
        return;
    }
    plan_world_lines(p, &pts, color, style, width);

    // 2 mm across the track at each fix
    let half = 2.0 / p.env.view.dotpitch_mm_x * p.env.view.meters_per_pixel_x();
    let mut ticks: Vec<LineVertex> = Vec::with_capacity(pts.len() * 2);
    for (i, &(x, y)) in pts.iter().enumerate() {
        let (dx, dy) = if i + 1 < pts.len() {
            (pts[i + 1].0 - x, pts[i + 1].1 - y)
        } else {
            (x - pts[i - 1].0, y - pts[i - 1].1)
        };
        let len = dx.hypot(dy);
        if len <= 0.0 {
            continue;
        }
        let tx = -dy / len * half;
        let ty = dx / len * half;
        ticks.push(LineVertex {
            position: [(x + tx) as f32, (y + ty) as f32, 0.0],
            dist: 0.0,
        });
        ticks.push(LineVertex {
            position: [(x - tx) as f32, (y - ty) as f32, 0.0],
            dist: 0.0,
        });
    }
    if ticks.is_empty() {
        return;
    }
    let uniforms = p.uniforms(color);
    let (first, count) = p.pool.push_chart(&ticks);
    p.record(
        GeomSource::Chart {
            first,
            count,
            topo: Topo::Lines,
        },
        PlanTex::None,
        uniforms,
    );
}

/// Radius of a light's sector graphics in world meters: 20 mm of screen
/// (25 mm when flagged extended), or VALNMR nautical miles under
/// `FullSectors`.
pub(crate) fn sector_radius_world(p: &Planner, obj: &S52Object) -> f64 {
    let view = p.env.view;
    if p.env.params.is_on(MarParam::FullSectors) {
        if let Some(valnmr) = attr_f64(&obj.feature, "VALNMR") {
            return valnmr * METERS_PER_NM;
        }
    }
    let extend = obj
        .feature
        .attribute("extend_arc_radius")
        .map(|v| v == "Y")
        .unwrap_or(false);
    let mm = if extend { 25.0 } else { 20.0 };
    mm / view.dotpitch_mm_y * view.meters_per_pixel_y()
}

fn bearing_dir(deg: f64) -> (f64, f64) {
    let r = deg.to_radians();
    (r.sin(), r.cos())
}

fn plan_sector_legs(p: &mut Planner, obj: &mut S52Object, color: [f32; 4]) {
    let Some((_, pts)) = obj.feature.ring(0) else {
        return;
    };
    let origin = (pts[0][0], pts[0][1]);
    let radius = sector_radius_world(p, obj);
    for key in ["SECTR1", "SECTR2"] {
        let Some(bearing) = attr_f64(&obj.feature, key) else {
            continue;
        };
        // sector bearings are toward the light; legs point seaward
        let (dx, dy) = bearing_dir(bearing + 180.0);
        let tip = (origin.0 + radius * dx, origin.1 + radius * dy);
        plan_world_lines(p, &[origin, tip], color, LineStyleKind::Dashed, 1);
    }
}

/// Partial-disk pair for a light sector: outer black ring, inner colored
/// ring, spanning SECTR1..SECTR2 seaward.
pub(crate) fn plan_sector_disks(p: &mut Planner, obj: &mut S52Object, color_token: &str) {
    let Some((_, pts)) = obj.feature.ring(0) else {
        return;
    };
    let origin = (pts[0][0], pts[0][1]);
    let (Some(s1), Some(s2)) = (
        attr_f64(&obj.feature, "SECTR1"),
        attr_f64(&obj.feature, "SECTR2"),
    ) else {
        return;
    };
    let radius = sector_radius_world(p, obj);
    let sweep = (s2 - s1).rem_euclid(360.0);
    let steps = ((sweep / 4.0).ceil() as usize).max(2);
    let mpp = p.env.view.meters_per_pixel_y();

    // ring thickness in world units: outer 1.5 mm black, inner 1.0 mm color
    let outer_t = 1.5 / p.env.view.dotpitch_mm_y * mpp;
    let inner_t = 1.0 / p.env.view.dotpitch_mm_y * mpp;

    let mut arc = |r0: f64, r1: f64, color: [f32; 4]| {
        let mut verts = Vec::with_capacity((steps + 1) * 2);
        for i in 0..=steps {
            let b = s1 + sweep * i as f64 / steps as f64 + 180.0;
            let (dx, dy) = bearing_dir(b);
            verts.push(LineVertex {
                position: [
                    (origin.0 + r0 * dx) as f32,
                    (origin.1 + r0 * dy) as f32,
                    0.0,
                ],
                dist: 0.0,
            });
            verts.push(LineVertex {
                position: [
                    (origin.0 + r1 * dx) as f32,
                    (origin.1 + r1 * dy) as f32,
                    0.0,
                ],
                dist: 0.0,
            });
        }
        let uniforms = p.uniforms(color);
        let (first, count) = p.pool.push_chart(&verts);
        p.record(
            GeomSource::Chart {
                first,
                count,
                topo: Topo::TriangleStrip,
            },
            PlanTex::None,
            uniforms,
        );
    };

    arc(radius, radius - outer_t, palette("CHBLK").normalize());
    arc(
        radius - outer_t,
        radius - outer_t - inner_t,
        palette(color_token).normalize(),
    );
}

/// VRM ring: radius from the 2-point marker line, solid or every-other
/// segment dashed.
pub(crate) fn plan_vrm_ring(p: &mut Planner, obj: &mut S52Object, color_token: &str) -> Result<()> {
    let pts = active_line_points(obj);
    if pts.len() != 2 {
        return Err(S52Error::BadGeometry("VRM/EBL marker must have 2 vertices"));
    }
    let center = pts[0];
    let radius = (pts[1].0 - center.0).hypot(pts[1].1 - center.1);
    let solid = obj
        .feature
        .attribute("_normallinestyle")
        .map(|v| v == "Y")
        .unwrap_or(true);
    let color = palette(color_token).normalize();

    let segs = 64usize;
    if solid {
        let ring: Vec<(f64, f64)> = (0..=segs)
            .map(|i| {
                let a = std::f64::consts::TAU * i as f64 / segs as f64;
                (center.0 + radius * a.cos(), center.1 + radius * a.sin())
            })
            .collect();
        plan_world_lines(p, &ring, color, LineStyleKind::Solid, 1);
    } else {
        let mut verts = Vec::with_capacity(segs);
        for i in (0..segs).step_by(2) {
            for k in [i, i + 1] {
                let a = std::f64::consts::TAU * k as f64 / segs as f64;
                verts.push(LineVertex {
                    position: [
                        (center.0 + radius * a.cos()) as f32,
                        (center.1 + radius * a.sin()) as f32,
                        0.0,
                    ],
                    dist: 0.0,
                });
            }
        }
        let uniforms = p.uniforms(color);
        let (first, count) = p.pool.push_chart(&verts);
        p.record(
            GeomSource::Chart {
                first,
                count,
                topo: Topo::Lines,
            },
            PlanTex::None,
            uniforms,
        );
    }
    Ok(())
}

/// LC: repeat the linestyle symbol along each clipped segment, batching the
/// partial remainders into one solid LINES span.
pub(crate) fn plan_lc(p: &mut Planner, obj: &mut S52Object, name: &str) -> Result<()> {
    let pts = active_line_points(obj);
    if pts.len() < 2 {
        return Ok(());
    }
    let is_leglin = obj.feature.name() == "leglin";
    if is_leglin && pts.len() != 2 {
        return Err(S52Error::BadGeometry("leglin must have exactly 2 vertices"));
    }

    let (symlen_units, color_token) = match p.symbols.get(name) {
        Some(sym) => (
            sym.symlen,
            sym.sublists
                .first()
                .map(|(t, _)| t.clone())
                .unwrap_or_else(|| "CHBLK".to_owned()),
        ),
        None => {
            log::debug!("linestyle {name} has no definition");
            return Ok(());
        }
    };
    let (wpu_x, _) = world_per_symbol_unit(p);
    let sym_len_world = symlen_units * wpu_x;
    if sym_len_world <= 0.0 {
        return Ok(());
    }

    let view = p.env.view.projected_extent();
    let north = p.env.view.north_deg;
    let color = palette(&color_token).normalize();
    let mut residual: Vec<LineVertex> = Vec::new();

    for w in pts.windows(2) {
        let Some((mut a, mut b)) = clip_segment(w[0].0, w[0].1, w[1].0, w[1].1, &view) else {
            continue;
        };

        if is_leglin {
            // the connecting arc replaces the corner
            let (na, nb) = wholin_shorten(&obj.feature, a, b);
            a = na;
            b = nb;
        }

        let len = (b.0 - a.0).hypot(b.1 - a.1);
        if len <= 0.0 {
            continue;
        }
        let ux = (b.0 - a.0) / len;
        let uy = (b.1 - a.1) / len;
        let ang_deg = uy.atan2(ux).to_degrees();
        let count = (len / sym_len_world).floor() as usize;

        for i in 0..count {
            let sx = a.0 + ux * sym_len_world * i as f64;
            let sy = a.1 + uy * sym_len_world * i as f64;
            // cancel the view-heading term so the symbol tracks the segment
            super::symbols::plan_symbol(p, name, (sx, sy), ang_deg - north);
        }

        let covered = sym_len_world * count as f64;
        if len - covered > 1e-9 {
            let rx = a.0 + ux * covered;
            let ry = a.1 + uy * covered;
            residual.push(LineVertex {
                position: [rx as f32, ry as f32, 0.0],
                dist: 0.0,
            });
            residual.push(LineVertex {
                position: [b.0 as f32, b.1 as f32, 0.0],
                dist: 0.0,
            });
        }
    }

    if !residual.is_empty() {
        let uniforms = p.uniforms(color);
        let (first, count) = p.pool.push_chart(&residual);
        p.record(
            GeomSource::Chart {
                first,
                count,
                topo: Topo::Lines,
            },
            PlanTex::None,
            uniforms,
        );
    }
    Ok(())
}

/// The transition arc between two route legs; `a` ends where `b` starts.
pub(crate) fn plan_leg_arc(p: &mut Planner, a: &S52Object, b: &S52Object) -> Result<()> {
    let pa = active_line_points(a);
    let pb = active_line_points(b);
    if pa.len() != 2 || pb.len() != 2 {
        return Err(S52Error::BadGeometry("leglin must have exactly 2 vertices"));
    }
    let corner = pa[1];
    let cut = attr_f64(&a.feature, "_wholin_dist").unwrap_or(0.0) * METERS_PER_NM;
    if cut <= 0.0 {
        return Ok(());
    }

    let len_a = (corner.0 - pa[0].0).hypot(corner.1 - pa[0].1);
    let len_b = (pb[1].0 - corner.0).hypot(pb[1].1 - corner.1);
    if len_a <= 0.0 || len_b <= 0.0 {
        return Err(S52Error::BadGeometry("degenerate route leg"));
    }
    let u = (
        (corner.0 - pa[0].0) / len_a,
        (corner.1 - pa[0].1) / len_a,
    );
    let v = ((pb[1].0 - corner.0) / len_b, (pb[1].1 - corner.1) / len_b);
    let t1 = (corner.0 - u.0 * cut, corner.1 - u.1 * cut);
    let t2 = (corner.0 + v.0 * cut, corner.1 + v.1 * cut);

    // quadratic bezier through the corner approximates the turn
    let segs = 16usize;
    let mut arc = Vec::with_capacity(segs + 1);
    for i in 0..=segs {
        let t = i as f64 / segs as f64;
        let omt = 1.0 - t;
        let x = omt * omt * t1.0 + 2.0 * omt * t * corner.0 + t * t * t2.0;
        let y = omt * omt * t1.1 + 2.0 * omt * t * corner.1 + t * t * t2.1;
        arc.push((x, y));
    }
    plan_world_lines(
        p,
        &arc,
        palette("PLRTE").normalize(),
        LineStyleKind::Dotted,
        1,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> Extent {
        Extent {
            w: 5.0,
            s: 5.0,
            e: 15.0,
            n: 15.0,
        }
    }

    #[test]
    fn clip_keeps_inner_segment() {
        let r = rect();
        let (a, b) = clip_segment(6.0, 6.0, 14.0, 14.0, &r).unwrap();
        assert_eq!(a, (6.0, 6.0));
        assert_eq!(b, (14.0, 14.0));
    }

    #[test]
    fn clip_trims_crossing_segment() {
        let r = rect();
        let (a, b) = clip_segment(0.0, 0.0, 10.0, 10.0, &r).unwrap();
        assert_eq!(a, (5.0, 5.0));
        assert_eq!(b, (10.0, 10.0));
        // endpoints inside or on the rectangle
        for (x, y) in [a, b] {
            assert!(x >= r.w && x <= r.e && y >= r.s && y <= r.n);
        }
    }

    #[test]
    fn clip_rejects_miss() {
        let r = rect();
        assert!(clip_segment(0.0, 0.0, 4.0, 0.0, &r).is_none());
        assert!(clip_segment(0.0, 20.0, 20.0, 20.5, &r).is_none());
    }

    #[test]
    fn clip_degenerate_outside_is_none() {
        let r = rect();
        assert!(clip_segment(0.0, 0.0, 0.0, 0.0, &r).is_none());
    }
}
