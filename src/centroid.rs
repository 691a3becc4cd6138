//! Centroid engine.
//!
//! Finds representative inside points for area features, used to anchor
//! centered symbols, patterns and labels. The fast path is the signed-area
//! (Green's theorem) centroid of the outer ring; when the area is only
//! partially on screen the ring is clipped to the view rectangle first, and
//! when a concave ring rejects its own centroid the midpoint of the longest
//! *original* clipped edge serves as the inside point.

use crate::geo::{point_in_ring, Extent, Feature, GeoKind};

/// Signed-area centroid of a closed ring (last vertex == first). `None` for
/// degenerate input: fewer than 3 distinct vertices or (near-)zero area.
pub fn ring_centroid(ring: &[[f64; 3]]) -> Option<(f64, f64)> {
    if ring.len() < 4 {
        // a closed triangle carries 4 vertices
        return None;
    }
    let mut area2 = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..ring.len() - 1 {
        let [x0, y0, _] = ring[i];
        let [x1, y1, _] = ring[i + 1];
        let cross = x0 * y1 - x1 * y0;
        area2 += cross;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }
    if area2.abs() < f64::EPSILON * 16.0 {
        return None;
    }
    let factor = 1.0 / (3.0 * area2);
    Some((cx * factor, cy * factor))
}

/// A clipped vertex; `leaving_original` marks that the edge from this vertex
/// to the next lies on the subject polygon's boundary rather than on the
/// clip rectangle (the edge-flag the boundary tessellation of the legacy
/// pipeline reported).
#[derive(Debug, Clone, Copy)]
pub struct ClipVertex {
    pub x: f64,
    pub y: f64,
    pub leaving_original: bool,
}

#[derive(Debug, Clone, Copy)]
enum ClipPlane {
    West(f64),
    East(f64),
    South(f64),
    North(f64),
}

impl ClipPlane {
    fn inside(&self, x: f64, y: f64) -> bool {
        match *self {
            ClipPlane::West(w) => x >= w,
            ClipPlane::East(e) => x <= e,
            ClipPlane::South(s) => y >= s,
            ClipPlane::North(n) => y <= n,
        }
    }

    fn intersect(&self, ax: f64, ay: f64, bx: f64, by: f64) -> (f64, f64) {
        match *self {
            ClipPlane::West(w) | ClipPlane::East(w) => {
                let t = (w - ax) / (bx - ax);
                (w, ay + t * (by - ay))
            }
            ClipPlane::South(s) | ClipPlane::North(s) => {
                let t = (s - ay) / (by - ay);
                (ax + t * (bx - ax), s)
            }
        }
    }
}

/// Clip a ring (closed or open) to the view rectangle, Sutherland–Hodgman
/// over the four half-planes, tracking which output edges are sub-segments
/// of original polygon edges. Returns an open polygon (no repeated last
/// vertex); empty when the ring misses the rectangle entirely.
pub fn clip_ring_to_rect(ring: &[[f64; 3]], rect: &Extent) -> Vec<ClipVertex> {
    let closed = ring.len() >= 2 && ring[0] == ring[ring.len() - 1];
    let n = if closed { ring.len() - 1 } else { ring.len() };
    if n < 3 {
        return Vec::new();
    }

    let mut poly: Vec<ClipVertex> = ring[..n]
        .iter()
        .map(|p| ClipVertex {
            x: p[0],
            y: p[1],
            leaving_original: true,
        })
        .collect();

    for plane in [
        ClipPlane::West(rect.w),
        ClipPlane::East(rect.e),
        ClipPlane::South(rect.s),
        ClipPlane::North(rect.n),
    ] {
        if poly.is_empty() {
            break;
        }
        // `arriving[k]` is the originality of the edge that ends at out[k];
        // shifted to leaving-flags once the plane is done.
        let mut out: Vec<ClipVertex> = Vec::with_capacity(poly.len() + 4);
        let mut arriving: Vec<bool> = Vec::with_capacity(poly.len() + 4);
        for i in 0..poly.len() {
            let a = poly[i];
            let b = poly[(i + 1) % poly.len()];
            let a_in = plane.inside(a.x, a.y);
            let b_in = plane.inside(b.x, b.y);
            let orig = a.leaving_original;
            match (a_in, b_in) {
                (true, true) => {
                    out.push(b);
                    arriving.push(orig);
                }
                (true, false) => {
                    let (ix, iy) = plane.intersect(a.x, a.y, b.x, b.y);
                    out.push(ClipVertex {
                        x: ix,
                        y: iy,
                        leaving_original: false,
                    });
                    arriving.push(orig);
                }
                (false, true) => {
                    let (ix, iy) = plane.intersect(a.x, a.y, b.x, b.y);
                    out.push(ClipVertex {
                        x: ix,
                        y: iy,
                        leaving_original: false,
                    });
                    arriving.push(false); // connector along the clip border
                    out.push(b);
                    arriving.push(orig);
                }
                (false, false) => {}
            }
        }
        let len = out.len();
        for k in 0..len {
            out[k].leaving_original = arriving[(k + 1) % len];
        }
        poly = out;
    }
    poly
}

/// Midpoint of the longest edge that stems from the subject polygon (not
/// from the clip rectangle). For a single-connected area∩rect this point
/// lies inside; elsewhere it is still the best cheap candidate.
pub fn longest_original_edge_midpoint(poly: &[ClipVertex]) -> Option<(f64, f64)> {
    let mut best = 0.0;
    let mut mid = None;
    for i in 0..poly.len() {
        let a = poly[i];
        if !a.leaving_original {
            continue;
        }
        let b = poly[(i + 1) % poly.len()];
        let len2 = (b.x - a.x) * (b.x - a.x) + (b.y - a.y) * (b.y - a.y);
        if len2 > best {
            best = len2;
            mid = Some(((a.x + b.x) * 0.5, (a.y + b.y) * 0.5));
        }
    }
    mid
}

fn clipped_ring_contains(poly: &[ClipVertex], x: f64, y: f64) -> bool {
    let ring: Vec<[f64; 3]> = poly.iter().map(|v| [v.x, v.y, 0.0]).collect();
    point_in_ring(&ring, x, y, false)
}

/// Compute and cache centroids for an area feature against the current view.
/// Returns whether at least one centroid was found. `search_inside` is the
/// `DispCentroids` mariner toggle: hunt for an inside point when the naive
/// centroid falls outside a concave ring.
pub fn compute_centroids(feature: &mut Feature, view: &Extent, search_inside: bool) -> bool {
    if feature.kind() != GeoKind::Area {
        return false;
    }
    let Some((npt, ppt)) = feature.ring(0) else {
        return false;
    };
    let ring: Vec<[f64; 3]> = ppt[..npt].to_vec();

    let fully_visible = feature.ext().map(|e| e.inside(view)).unwrap_or(false);
    let mut found: Vec<(f64, f64)> = Vec::new();

    if fully_visible {
        if let Some((cx, cy)) = ring_centroid(&ring) {
            if point_in_ring(&ring, cx, cy, true) {
                found.push((cx, cy));
            } else if search_inside {
                let clipped = clip_ring_to_rect(&ring, view);
                if let Some((mx, my)) = longest_original_edge_midpoint(&clipped) {
                    if point_in_ring(&ring, mx, my, true) {
                        found.push((mx, my));
                    }
                }
            }
        }
    } else {
        let clipped = clip_ring_to_rect(&ring, view);
        if clipped.len() >= 3 {
            let mut closed: Vec<[f64; 3]> = clipped.iter().map(|v| [v.x, v.y, 0.0]).collect();
            closed.push(closed[0]);
            match ring_centroid(&closed) {
                Some((cx, cy)) if clipped_ring_contains(&clipped, cx, cy) => {
                    found.push((cx, cy));
                }
                Some(_) | None if search_inside => {
                    if let Some((mx, my)) = longest_original_edge_midpoint(&clipped) {
                        if clipped_ring_contains(&clipped, mx, my) {
                            found.push((mx, my));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    feature.new_centroid();
    for (x, y) in &found {
        feature.add_centroid(*x, *y);
    }
    !found.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(pts: &[(f64, f64)]) -> Vec<[f64; 3]> {
        let mut v: Vec<[f64; 3]> = pts.iter().map(|&(x, y)| [x, y, 0.0]).collect();
        v.push(v[0]);
        v
    }

    fn view(w: f64, s: f64, e: f64, n: f64) -> Extent {
        Extent { w, s, e, n }
    }

    #[test]
    fn centroid_of_square() {
        let r = ring(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let (cx, cy) = ring_centroid(&r).unwrap();
        assert!((cx - 5.0).abs() < 1e-12);
        assert!((cy - 5.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_rings_have_no_centroid() {
        assert!(ring_centroid(&[[0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 0.0, 0.0]]).is_none());
        let flat = ring(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)]);
        assert!(ring_centroid(&flat).is_none());
    }

    #[test]
    fn clip_keeps_interior_square() {
        let r = ring(&[(2.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 4.0)]);
        let clipped = clip_ring_to_rect(&r, &view(0.0, 0.0, 10.0, 10.0));
        assert_eq!(clipped.len(), 4);
        assert!(clipped.iter().all(|v| v.leaving_original));
    }

    #[test]
    fn clip_cuts_overhang_and_flags_border_edges() {
        // square sticking out of the east side
        let r = ring(&[(5.0, 2.0), (15.0, 2.0), (15.0, 8.0), (5.0, 8.0)]);
        let clipped = clip_ring_to_rect(&r, &view(0.0, 0.0, 10.0, 10.0));
        assert_eq!(clipped.len(), 4);
        for v in &clipped {
            assert!(v.x <= 10.0 + 1e-12);
        }
        // exactly one edge (the one along x == 10) is non-original
        let borders = clipped.iter().filter(|v| !v.leaving_original).count();
        assert_eq!(borders, 1);
    }

    #[test]
    fn clip_misses_rect_entirely() {
        let r = ring(&[(20.0, 20.0), (30.0, 20.0), (30.0, 30.0), (20.0, 30.0)]);
        assert!(clip_ring_to_rect(&r, &view(0.0, 0.0, 10.0, 10.0)).is_empty());
    }

    #[test]
    fn u_shape_falls_back_to_longest_edge_midpoint() {
        // U opening upward: area centroid lands in the notch, outside
        let u = ring(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (8.0, 10.0),
            (8.0, 2.0),
            (2.0, 2.0),
            (2.0, 10.0),
            (0.0, 10.0),
        ]);
        let (cx, cy) = ring_centroid(&u).unwrap();
        assert!(!point_in_ring(&u, cx, cy, true));

        let mut f = Feature::area(vec![u.clone()]);
        f.set_ext(0.0, 0.0, 10.0, 10.0).unwrap();
        let big_view = view(-100.0, -100.0, 100.0, 100.0);
        assert!(compute_centroids(&mut f, &big_view, true));
        assert!(f.has_centroid());
        let (x, y) = f.next_centroid().unwrap();
        assert!(point_in_ring(&u, x, y, true));

        // without the search toggle, nothing is cached
        let mut g = Feature::area(vec![u]);
        g.set_ext(0.0, 0.0, 10.0, 10.0).unwrap();
        assert!(!compute_centroids(&mut g, &big_view, false));
    }

    #[test]
    fn partially_visible_area_is_clipped_first() {
        let r = ring(&[(-50.0, -50.0), (5.0, -50.0), (5.0, 5.0), (-50.0, 5.0)]);
        let mut f = Feature::area(vec![r]);
        f.set_ext(-50.0, -50.0, 5.0, 5.0).unwrap();
        let v = view(0.0, 0.0, 10.0, 10.0);
        assert!(compute_centroids(&mut f, &v, false));
        let (x, y) = f.next_centroid().unwrap();
        // visible part is [0,5]x[0,5]
        assert!((x - 2.5).abs() < 1e-9 && (y - 2.5).abs() < 1e-9);
    }
}
