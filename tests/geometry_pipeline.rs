//! End-to-end checks of the CPU geometry pipeline: geographic features in,
//! projected and tessellated primitives out, with centroid caching and the
//! SCAMIN gate on top. No GPU device is required for any of this.

use pelorus::centroid::compute_centroids;
use pelorus::geo::{point_in_ring, Extent};
use pelorus::{DrawMode, Feature, GeoKind, Projection, S52Error, Tessellator, TouchRole, View};

fn projection() -> Projection {
    let mut prj = Projection::new();
    prj.set_origin(46.8, -71.2).unwrap();
    prj
}

/// A small closed square of geographic coordinates around the view center.
fn geo_square(half_deg: f64) -> Vec<[f64; 3]> {
    let (lat, lon) = (46.8, -71.2);
    vec![
        [lon - half_deg, lat - half_deg, 0.0],
        [lon + half_deg, lat - half_deg, 0.0],
        [lon + half_deg, lat + half_deg, 0.0],
        [lon - half_deg, lat + half_deg, 0.0],
        [lon - half_deg, lat - half_deg, 0.0],
    ]
}

#[test]
fn chart_load_projects_and_tessellates() {
    let prj = projection();
    let mut feature = Feature::area(vec![geo_square(0.01)]);
    feature.set_name("DEPARE");
    feature.project_geo_to_xy(&prj).unwrap();

    // rings stay closed through projection
    let (npt, pts) = feature.ring(0).unwrap();
    assert_eq!(pts[0], pts[npt - 1]);

    // extent from the projected ring is canonical
    let (w, e) = (pts[0][0], pts[1][0]);
    let (s, n) = (pts[0][1], pts[2][1]);
    feature.set_ext(w, s, e, n).unwrap();
    let ext = feature.ext().unwrap();
    assert!(ext.w <= ext.e && ext.s <= ext.n);

    let mut tess = Tessellator::new();
    tess.tessellate(&mut feature).unwrap();
    let prim = feature.prim().unwrap();
    assert!(prim.spans_consistent());
    let span = prim.span(0).unwrap();
    assert_eq!(span.mode, DrawMode::Triangles);

    // every triangle vertex lies inside the extent
    for v in prim.vertices() {
        assert!(v[0] >= ext.w as f32 - 1.0 && v[0] <= ext.e as f32 + 1.0);
        assert!(v[1] >= ext.s as f32 - 1.0 && v[1] <= ext.n as f32 + 1.0);
    }
}

#[test]
fn centroid_caches_and_resets() {
    let prj = projection();
    let mut feature = Feature::area(vec![geo_square(0.01)]);
    feature.project_geo_to_xy(&prj).unwrap();
    let (npt, pts) = feature.ring(0).unwrap();
    let (w, e) = (pts[0][0], pts[1][0]);
    let (s, n) = (pts[0][1], pts[npt - 2][1]);
    feature.set_ext(w, s, e, n).unwrap();

    let view = Extent {
        w: w - 1000.0,
        s: s - 1000.0,
        e: e + 1000.0,
        n: n + 1000.0,
    };
    assert!(compute_centroids(&mut feature, &view, false));
    assert!(feature.has_centroid());
    let (cx, cy) = feature.next_centroid().unwrap();
    let (_, ring) = feature.ring(0).unwrap();
    assert!(point_in_ring(ring, cx, cy, true));

    feature.reset_centroid();
    assert!(!feature.has_centroid());
}

#[test]
fn scamin_gate_follows_the_view_scale() {
    let prj = projection();
    let mut view = View::new(0.3, 0.3, 800, 600);
    view.set_view(46.8, -71.2, 1.0, 0.0);
    view.recompute(&prj).unwrap();

    // 1 NM over 600 px puts the denominator around 60 000
    let denom = view.scale_denominator();
    assert!(denom > 50_000.0 && denom < 75_000.0, "denom = {denom}");
    assert!(view.scamin_suppresses(49_999.0));
    assert!(!view.scamin_suppresses(denom * 2.0));
    // infinite SCAMIN is never scale-suppressed
    assert!(!view.scamin_suppresses(f64::INFINITY));
}

#[test]
fn touch_roles_and_relations_stay_single() {
    let lights = Feature::point([0.0; 3]);
    let depare = Feature::area(vec![geo_square(0.01)]);
    let mut buoy = Feature::point([0.0; 3]);

    buoy.set_touch(TouchRole::Lights, lights.id()).unwrap();
    buoy.set_touch(TouchRole::Lights, lights.id()).unwrap();
    assert!(matches!(
        buoy.set_touch(TouchRole::Lights, depare.id()),
        Err(S52Error::TouchOccupied(_))
    ));
    buoy.set_touch(TouchRole::Depare, depare.id()).unwrap();
    assert_eq!(buoy.touch(TouchRole::Lights), Some(lights.id()));

    buoy.set_relation(lights.id()).unwrap();
    assert!(buoy.set_relation(depare.id()).is_err());
}

#[test]
fn geographic_wrap_is_legal_projected_is_not() {
    let mut view = View::new(0.3, 0.3, 800, 600);
    assert!(view.set_geographic_view(-10.0, 179.5, 10.0, -179.5).is_ok());
    assert!(matches!(
        view.set_projected_view(0.0, 10.0, 10.0, 0.0),
        Err(S52Error::ExtentInvalid { .. })
    ));
    assert!(matches!(
        view.set_projected_view(0.0, f64::NEG_INFINITY, 10.0, 10.0),
        Err(S52Error::ExtentInvalid { .. })
    ));
}

#[test]
fn meta_feature_has_no_geometry_and_no_kind_confusion() {
    let meta = Feature::meta();
    assert_eq!(meta.kind(), GeoKind::Meta);
    assert_eq!(meta.ring_count(), 0);
    let mut tess = Tessellator::new();
    let mut meta = meta;
    assert!(tess.tessellate(&mut meta).is_err());
}
