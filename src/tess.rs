//! Tessellator driver.
//!
//! Turns an AREA feature's rings into a packed triangle primitive. All rings
//! of a feature go through one fill pass with the even-odd rule, so holes and
//! inconsistent winding both come out right. The tessellator's indexed output
//! is flattened into the primitive's packed vertex array (one `Triangles`
//! span); scratch buffers are pooled and reused across features.

use lyon::math::point;
use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, FillVertexConstructor,
    VertexBuffers,
};

use crate::error::{Result, S52Error};
use crate::geo::{Feature, GeoKind};
use crate::primitive::DrawMode;

struct XyCtor;

impl FillVertexConstructor<[f32; 2]> for XyCtor {
    fn new_vertex(&mut self, vertex: FillVertex) -> [f32; 2] {
        vertex.position().to_array()
    }
}

/// Reusable tessellation state. Never shrinks below peak, which bounds
/// allocation churn across a session.
pub struct Tessellator {
    fill: FillTessellator,
    scratch: VertexBuffers<[f32; 2], u32>,
}

impl Default for Tessellator {
    fn default() -> Self {
        Self::new()
    }
}

impl Tessellator {
    pub fn new() -> Self {
        Self {
            fill: FillTessellator::new(),
            scratch: VertexBuffers::new(),
        }
    }

    /// Tessellate `feature`'s rings into its primitive as one `Triangles`
    /// span. A tessellator failure is returned so the caller can log once
    /// and skip the feature; the frame continues.
    pub fn tessellate(&mut self, feature: &mut Feature) -> Result<()> {
        if feature.kind() != GeoKind::Area {
            return Err(S52Error::BadGeometry("tessellate on non-area feature"));
        }

        let mut builder = Path::builder();
        let ring_count = feature.ring_count();
        let mut any = false;
        for i in 0..ring_count {
            let Some((npt, ppt)) = feature.ring(i) else {
                continue;
            };
            // closed ring: drop the repeated last vertex, close() restores it
            let npt = if npt >= 2 && ppt[0] == ppt[npt - 1] {
                npt - 1
            } else {
                npt
            };
            if npt < 3 {
                continue;
            }
            builder.begin(point(ppt[0][0] as f32, ppt[0][1] as f32));
            for pt in &ppt[1..npt] {
                builder.line_to(point(pt[0] as f32, pt[1] as f32));
            }
            builder.close();
            any = true;
        }
        if !any {
            return Err(S52Error::BadGeometry("no ring with 3 or more vertices"));
        }
        let path = builder.build();

        self.scratch.vertices.clear();
        self.scratch.indices.clear();
        self.fill
            .tessellate_path(
                &path,
                &FillOptions::default().with_fill_rule(FillRule::EvenOdd),
                &mut BuffersBuilder::new(&mut self.scratch, XyCtor),
            )
            .map_err(|e| S52Error::Tessellator(format!("{e:?}")))?;

        // Flatten indexed triangles into the packed span; combine-generated
        // vertices are copied here and the scratch never outlives the call.
        let prim = feature.init_prim();
        prim.begin_prim(DrawMode::Triangles);
        let verts = &self.scratch.vertices;
        for &idx in &self.scratch.indices {
            let v = verts[idx as usize];
            prim.append_vertex(v[0], v[1], 0.0);
        }
        prim.end_prim();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(pts: &[(f64, f64)]) -> Vec<[f64; 3]> {
        pts.iter().map(|&(x, y)| [x, y, 0.0]).collect()
    }

    fn unit_square() -> Vec<[f64; 3]> {
        ring(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)])
    }

    #[test]
    fn square_yields_one_triangle_span() {
        let mut f = Feature::area(vec![unit_square()]);
        Tessellator::new().tessellate(&mut f).unwrap();
        let prim = f.prim().unwrap();
        assert_eq!(prim.spans().len(), 1);
        let span = prim.span(0).unwrap();
        assert_eq!(span.mode, DrawMode::Triangles);
        assert_eq!(span.count as usize % 3, 0);
        assert!(span.count >= 6); // at least two triangles
        assert!(prim.spans_consistent());
    }

    #[test]
    fn hole_reduces_filled_area() {
        let outer = unit_square();
        // CW hole in the middle
        let hole = ring(&[(1.0, 1.0), (1.0, 3.0), (3.0, 3.0), (3.0, 1.0), (1.0, 1.0)]);
        let mut f = Feature::area(vec![outer, hole]);
        Tessellator::new().tessellate(&mut f).unwrap();
        let prim = f.prim().unwrap();

        let mut area = 0.0f64;
        let v = prim.vertices();
        for tri in v.chunks_exact(3) {
            let (a, b, c) = (tri[0], tri[1], tri[2]);
            area += 0.5
                * (((b[0] - a[0]) as f64) * ((c[1] - a[1]) as f64)
                    - ((c[0] - a[0]) as f64) * ((b[1] - a[1]) as f64))
                    .abs();
        }
        assert!((area - 12.0).abs() < 1e-3, "area = {area}"); // 16 - 4
    }

    #[test]
    fn result_is_deterministic_across_runs() {
        let mut t = Tessellator::new();
        let mut a = Feature::area(vec![unit_square()]);
        let mut b = Feature::area(vec![unit_square()]);
        t.tessellate(&mut a).unwrap();
        t.tessellate(&mut b).unwrap();
        assert_eq!(a.prim().unwrap().vertices(), b.prim().unwrap().vertices());
    }

    #[test]
    fn degenerate_ring_is_an_error_not_a_panic() {
        let mut f = Feature::area(vec![ring(&[(0.0, 0.0), (1.0, 1.0)])]);
        assert!(Tessellator::new().tessellate(&mut f).is_err());
    }

    #[test]
    fn non_area_is_rejected() {
        let mut f = Feature::line(vec![[0.0; 3]; 4]);
        assert!(Tessellator::new().tessellate(&mut f).is_err());
    }
}
