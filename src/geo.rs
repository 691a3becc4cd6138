//! S-57 feature records.
//!
//! The in-memory representation of chart features: geometry by kind (META /
//! POINT / LINE / AREA), the attribute dictionary, projected extents, SCAMIN,
//! touch references established by conditional symbology, the centroid cache
//! and the owned GPU primitive. Features are owned by the scene; every
//! cross-feature reference in here is a plain [`FeatureId`], never a pointer.

use std::sync::atomic::{AtomicU32, Ordering};

use ahash::{HashMap, HashMapExt};

use crate::error::{Result, S52Error};
use crate::primitive::Primitive;
use crate::projection::Projection;

/// OGR tags unknown mandatory attribute values with MAXINT-6, which the
/// reader passes through as a string.
const EMPTY_NUMBER_MARKER: &str = "2147483641";

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// Unique, immutable, monotonic at construction, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(pub u32);

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoKind {
    Meta,
    Point,
    Line,
    Area,
}

/// Roles a feature can be "touched" through by conditional-symbology logic.
/// At most one touch per role; the touched feature outlives the toucher
/// (both are scene-scoped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum TouchRole {
    Topmar,
    Lights,
    Depare,
    Depval,
}

impl TouchRole {
    fn name(self) -> &'static str {
        match self {
            TouchRole::Topmar => "TOPMAR",
            TouchRole::Lights => "LIGHTS",
            TouchRole::Depare => "DEPARE",
            TouchRole::Depval => "DEPVAL",
        }
    }
}

/// Canonical projected extent: W ≤ E, S ≤ N, all finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub w: f64,
    pub s: f64,
    pub e: f64,
    pub n: f64,
}

impl Extent {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.w && x <= self.e && y >= self.s && y <= self.n
    }

    pub fn intersects(&self, other: &Extent) -> bool {
        self.w <= other.e && self.e >= other.w && self.s <= other.n && self.n >= other.s
    }

    /// True when `self` lies entirely inside `other`.
    pub fn inside(&self, other: &Extent) -> bool {
        self.w >= other.w && self.e <= other.e && self.s >= other.s && self.n <= other.n
    }
}

#[derive(Debug, Clone)]
enum Geometry {
    Meta,
    Point([f64; 3]),
    Line(Vec<[f64; 3]>),
    /// Ring 0 is the exterior (CCW), the rest are holes (CW). Rings are
    /// closed: first vertex == last vertex.
    Area(Vec<Vec<[f64; 3]>>),
}

/// One S-57 geographic object.
#[derive(Debug)]
pub struct Feature {
    id: FeatureId,
    name: String,
    geometry: Geometry,
    /// Active geometry length; trimming without reallocation.
    data_size: usize,
    extent: Option<Extent>,
    scamin: f64,
    attributes: HashMap<String, String>,
    touch: [Option<FeatureId>; 4],
    relation: Option<FeatureId>,
    centroids: Vec<[f64; 2]>,
    centroid_cursor: usize,
    prim: Option<Primitive>,
    highlight: bool,
    /// Suppressed by culling: outside the current view.
    sup: bool,
    next_poly: Option<Box<Feature>>,
}

impl Feature {
    fn new(geometry: Geometry) -> Self {
        let data_size = match &geometry {
            Geometry::Meta => 0,
            Geometry::Point(_) => 1,
            Geometry::Line(v) => v.len(),
            Geometry::Area(rings) => rings.first().map_or(0, Vec::len),
        };
        Self {
            id: FeatureId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            name: String::new(),
            geometry,
            data_size,
            extent: None,
            scamin: f64::INFINITY,
            attributes: HashMap::new(),
            touch: [None; 4],
            relation: None,
            centroids: Vec::new(),
            centroid_cursor: 0,
            prim: None,
            highlight: false,
            sup: false,
            next_poly: None,
        }
    }

    pub fn point(xyz: [f64; 3]) -> Self {
        Self::new(Geometry::Point(xyz))
    }

    pub fn line(xyz: Vec<[f64; 3]>) -> Self {
        Self::new(Geometry::Line(xyz))
    }

    /// Ring 0 exterior, the rest holes. Unclosed rings are accepted but
    /// logged; the even-odd tessellation still fills them.
    pub fn area(rings: Vec<Vec<[f64; 3]>>) -> Self {
        for (i, ring) in rings.iter().enumerate() {
            if ring.len() >= 2 && ring.first() != ring.last() {
                log::warn!("area ring {i} not closed (first != last vertex)");
            }
        }
        Self::new(Geometry::Area(rings))
    }

    pub fn meta() -> Self {
        Self::new(Geometry::Meta)
    }

    /// Late-bind line geometry onto a META-constructed edge record.
    pub fn set_geo_line(&mut self, xyz: Vec<[f64; 3]>) {
        self.data_size = xyz.len();
        self.geometry = Geometry::Line(xyz);
    }

    #[inline]
    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_owned();
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> GeoKind {
        match self.geometry {
            Geometry::Meta => GeoKind::Meta,
            Geometry::Point(_) => GeoKind::Point,
            Geometry::Line(_) => GeoKind::Line,
            Geometry::Area(_) => GeoKind::Area,
        }
    }

    // ── extent ───────────────────────────────────────────────────────────

    /// Set the projected extent. Rejects non-finite and non-canonical input;
    /// date-line wrapping is a property of the *geographic* view extent only,
    /// never of projected feature extents.
    pub fn set_ext(&mut self, w: f64, s: f64, e: f64, n: f64) -> Result<()> {
        if !(w.is_finite() && s.is_finite() && e.is_finite() && n.is_finite()) || w > e || s > n {
            return Err(S52Error::ExtentInvalid { w, s, e, n });
        }
        self.extent = Some(Extent { w, s, e, n });
        Ok(())
    }

    #[inline]
    pub fn ext(&self) -> Option<Extent> {
        self.extent
    }

    // ── scamin ───────────────────────────────────────────────────────────

    pub fn set_scamin(&mut self, scamin: f64) {
        self.scamin = scamin;
    }

    /// `INFINITY` means "always visible".
    #[inline]
    pub fn scamin(&self) -> f64 {
        self.scamin
    }

    /// Re-read SCAMIN from the attribute dictionary; absent means always
    /// visible.
    pub fn reset_scamin_from_attribute(&mut self) -> f64 {
        self.scamin = self
            .attribute("SCAMIN")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(f64::INFINITY);
        self.scamin
    }

    // ── attributes ───────────────────────────────────────────────────────

    pub fn set_attribute(&mut self, key: &str, value: &str) {
        self.attributes.insert(key.to_owned(), value.to_owned());
    }

    /// Attribute value, or `None` when the key is absent, the value is the
    /// omitted-mandatory marker, or the value is empty.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        match self.attributes.get(key) {
            Some(v) if v == EMPTY_NUMBER_MARKER => None,
            Some(v) if v.is_empty() => None,
            Some(v) => Some(v.as_str()),
            None => None,
        }
    }

    /// "id,KEY:val,…" report line used by cursor pick. OGR-internal keys are
    /// filtered out; newlines in the AIS vessel label are flattened.
    pub fn attribute_summary(&self) -> String {
        let mut out = self.id.to_string();
        let mut keys: Vec<&String> = self
            .attributes
            .keys()
            .filter(|k| {
                !matches!(
                    k.as_str(),
                    "MASK" | "USAG" | "ORNT" | "NAME_RCNM" | "NAME_RCID" | "NINFOM"
                )
            })
            .collect();
        keys.sort();
        for key in keys {
            let value = &self.attributes[key];
            out.push(',');
            out.push_str(key);
            out.push(':');
            if key == "_vessel_label" {
                out.extend(value.chars().map(|c| if c == '\n' { ' ' } else { c }));
            } else {
                out.push_str(value);
            }
        }
        out
    }

    // ── touch / relation ─────────────────────────────────────────────────

    /// Record a touch. Setting the same feature twice is idempotent; a
    /// different feature on an occupied role is an error.
    pub fn set_touch(&mut self, role: TouchRole, other: FeatureId) -> Result<()> {
        match self.touch[role as usize] {
            None => {
                self.touch[role as usize] = Some(other);
                Ok(())
            }
            Some(existing) if existing == other => Ok(()),
            Some(_) => Err(S52Error::TouchOccupied(role.name())),
        }
    }

    #[inline]
    pub fn touch(&self, role: TouchRole) -> Option<FeatureId> {
        self.touch[role as usize]
    }

    /// C_AGGR / C_ASSO back-reference; at most one.
    pub fn set_relation(&mut self, other: FeatureId) -> Result<()> {
        match self.relation {
            None => {
                self.relation = Some(other);
                Ok(())
            }
            Some(existing) if existing == other => Ok(()),
            Some(_) => Err(S52Error::TouchOccupied("C_AGGR/C_ASSO")),
        }
    }

    #[inline]
    pub fn relation(&self) -> Option<FeatureId> {
        self.relation
    }

    // ── geometry access ──────────────────────────────────────────────────

    /// 1 for POINT/LINE, the ring count for AREA, 0 for META.
    pub fn ring_count(&self) -> usize {
        match &self.geometry {
            Geometry::Meta => 0,
            Geometry::Point(_) | Geometry::Line(_) => 1,
            Geometry::Area(rings) => rings.len(),
        }
    }

    /// Uniform ring access: `(vertex_count, triples)`. The vertex count is
    /// the ring's *capacity*; the active length is [`Feature::geo_size`].
    pub fn ring(&self, i: usize) -> Option<(usize, &[[f64; 3]])> {
        match &self.geometry {
            Geometry::Meta => None,
            Geometry::Point(p) => (i == 0).then(|| (1, std::slice::from_ref(p))),
            Geometry::Line(v) => (i == 0).then(|| (v.len(), v.as_slice())),
            Geometry::Area(rings) => rings.get(i).map(|r| (r.len(), r.as_slice())),
        }
    }

    fn capacity(&self) -> usize {
        match &self.geometry {
            Geometry::Meta => 0,
            Geometry::Point(_) => 1,
            Geometry::Line(v) => v.len(),
            Geometry::Area(rings) => rings.first().map_or(0, Vec::len),
        }
    }

    /// Currently active geometry length (≤ capacity).
    #[inline]
    pub fn geo_size(&self) -> usize {
        self.data_size
    }

    /// Trim the active geometry without reallocating.
    pub fn set_geo_size(&mut self, n: usize) -> Result<()> {
        if n > self.capacity() {
            return Err(S52Error::BadGeometry("geo_size exceeds capacity"));
        }
        self.data_size = n;
        Ok(())
    }

    /// Batch-project every ring in place, geographic degrees to meters.
    pub fn project_geo_to_xy(&mut self, prj: &Projection) -> Result<()> {
        match &mut self.geometry {
            Geometry::Meta => Ok(()),
            Geometry::Point(p) => {
                let mut one = [*p];
                prj.project_nv(&mut one)?;
                *p = one[0];
                Ok(())
            }
            Geometry::Line(v) => prj.project_nv(v),
            Geometry::Area(rings) => {
                for ring in rings.iter_mut() {
                    prj.project_nv(ring)?;
                }
                Ok(())
            }
        }
    }

    // ── centroid cache ───────────────────────────────────────────────────

    /// Begin a fresh centroid computation: drop cached points, rewind.
    pub fn new_centroid(&mut self) {
        self.centroids.clear();
        self.centroid_cursor = 0;
    }

    pub fn add_centroid(&mut self, x: f64, y: f64) {
        self.centroids.push([x, y]);
    }

    /// True when at least one centroid is cached; rewinds the iterator so a
    /// new command can replay the list.
    pub fn has_centroid(&mut self) -> bool {
        self.centroid_cursor = 0;
        !self.centroids.is_empty()
    }

    pub fn next_centroid(&mut self) -> Option<(f64, f64)> {
        let p = self.centroids.get(self.centroid_cursor)?;
        self.centroid_cursor += 1;
        Some((p[0], p[1]))
    }

    /// Invalidate the cache (the culled extent moved).
    pub fn reset_centroid(&mut self) {
        self.centroids.clear();
        self.centroid_cursor = 0;
    }

    // ── primitive ────────────────────────────────────────────────────────

    /// Create or reset the tessellation target for this feature.
    pub fn init_prim(&mut self) -> &mut Primitive {
        match &mut self.prim {
            Some(p) => {
                p.clear();
                p
            }
            slot @ None => slot.insert(Primitive::new()),
        }
    }

    #[inline]
    pub fn prim(&self) -> Option<&Primitive> {
        self.prim.as_ref()
    }

    #[inline]
    pub fn prim_mut(&mut self) -> Option<&mut Primitive> {
        self.prim.as_mut()
    }

    /// Release tessellated data and its GPU handle.
    pub fn done_prim(&mut self) {
        self.prim = None;
    }

    // ── flags ────────────────────────────────────────────────────────────

    pub fn highlight_on(&mut self) {
        self.highlight = true;
    }

    pub fn highlight_off(&mut self) {
        self.highlight = false;
    }

    #[inline]
    pub fn is_highlighted(&self) -> bool {
        self.highlight
    }

    pub fn set_sup(&mut self, sup: bool) {
        self.sup = sup;
    }

    #[inline]
    pub fn is_sup(&self) -> bool {
        self.sup
    }

    // ── world multi-polygon chain ────────────────────────────────────────

    /// Insert `next` at the head of this feature's polygon chain.
    pub fn set_next_poly(&mut self, mut next: Box<Feature>) {
        if let Some(old) = self.next_poly.take() {
            next.next_poly = Some(old);
        }
        self.next_poly = Some(next);
    }

    #[inline]
    pub fn next_poly(&self) -> Option<&Feature> {
        self.next_poly.as_deref()
    }

    /// Unlink and drop the whole chain iteratively (a recursive drop of a
    /// long chain would blow the stack).
    pub fn del_next_poly(&mut self) {
        let mut cur = self.next_poly.take();
        while let Some(mut f) = cur {
            cur = f.next_poly.take();
        }
    }

    // ── debug ────────────────────────────────────────────────────────────

    /// Log the feature record; with `coords` the full geometry, otherwise
    /// the extent.
    pub fn dump(&self, coords: bool) {
        log::debug!("S57ID : {}", self.id);
        log::debug!("NAME  : {}", self.name);
        for (k, v) in &self.attributes {
            if k.len() == 6 {
                log::debug!("\t{k} : {v}");
            }
        }
        log::debug!("{:?} ({})", self.kind(), self.geo_size());
        if coords {
            for i in 0..self.ring_count() {
                if let Some((npt, ppt)) = self.ring(i) {
                    for pt in &ppt[..npt] {
                        log::debug!("\t\t({}, {}, {})", pt[0], pt[1], pt[2]);
                    }
                }
            }
        } else if let Some(ext) = self.extent {
            log::debug!("EXTENT: {}, {}  --  {}, {}", ext.s, ext.w, ext.n, ext.e);
        }
    }
}

/// Even-odd (ray casting) inside test against one ring. `closed` rings store
/// the first vertex again at the end; non-closed rings pair each vertex with
/// its predecessor by wrap-around.
pub fn point_in_ring(ring: &[[f64; 3]], x: f64, y: f64, closed: bool) -> bool {
    if ring.is_empty() {
        return false;
    }
    let mut c = false;
    if closed {
        for i in 0..ring.len().saturating_sub(1) {
            let p1 = ring[i];
            let p2 = ring[i + 1];
            if ((p1[1] > y) != (p2[1] > y))
                && (x < (p2[0] - p1[0]) * (y - p1[1]) / (p2[1] - p1[1]) + p1[0])
            {
                c = !c;
            }
        }
    } else {
        let mut j = ring.len() - 1;
        for i in 0..ring.len() {
            let p1 = ring[i];
            let p2 = ring[j];
            if ((p1[1] > y) != (p2[1] > y))
                && (x < (p2[0] - p1[0]) * (y - p1[1]) / (p2[1] - p1[1]) + p1[0])
            {
                c = !c;
            }
            j = i;
        }
    }
    c
}

/// True when any active vertex of A lies inside B's outer ring. Only
/// meaningful when B is an area.
pub fn touches(a: &Feature, b: &Feature) -> bool {
    if b.kind() != GeoKind::Area {
        return false;
    }
    let Some((npt_a, ppt_a)) = a.ring(0) else {
        return false;
    };
    let Some((_, ppt_b)) = b.ring(0) else {
        return false;
    };
    let take = npt_a.min(a.geo_size().max(1));
    ppt_a[..take]
        .iter()
        .any(|p| point_in_ring(ppt_b, p[0], p[1], true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(z: f64) -> Vec<[f64; 3]> {
        vec![
            [0.0, 0.0, z],
            [10.0, 0.0, z],
            [10.0, 10.0, z],
            [0.0, 10.0, z],
            [0.0, 0.0, z],
        ]
    }

    #[test]
    fn ids_are_unique_and_monotonic() {
        let a = Feature::meta();
        let b = Feature::point([0.0; 3]);
        assert!(b.id().0 > a.id().0);
    }

    #[test]
    fn meta_has_no_geometry() {
        let m = Feature::meta();
        assert_eq!(m.kind(), GeoKind::Meta);
        assert_eq!(m.ring_count(), 0);
        assert!(m.ring(0).is_none());
        assert_eq!(m.geo_size(), 0);
    }

    #[test]
    fn extent_must_be_canonical_and_finite() {
        let mut f = Feature::point([0.0; 3]);
        assert!(f.set_ext(10.0, 0.0, 0.0, 10.0).is_err());
        assert!(f.set_ext(f64::INFINITY, 0.0, 1.0, 1.0).is_err());
        assert!(f.set_ext(-5.0, -5.0, 5.0, 5.0).is_ok());
        let e = f.ext().unwrap();
        assert!(e.w <= e.e && e.s <= e.n);
    }

    #[test]
    fn omitted_mandatory_attribute_is_absent() {
        let mut f = Feature::meta();
        f.set_attribute("VALNMR", "2147483641");
        f.set_attribute("OBJNAM", "");
        f.set_attribute("SECTR1", "045");
        assert_eq!(f.attribute("VALNMR"), None);
        assert_eq!(f.attribute("OBJNAM"), None);
        assert_eq!(f.attribute("SECTR1"), Some("045"));
        assert_eq!(f.attribute("SECTR2"), None);
    }

    #[test]
    fn touch_same_twice_ok_different_errs() {
        let lights = Feature::point([0.0; 3]);
        let other = Feature::point([1.0, 1.0, 0.0]);
        let mut buoy = Feature::point([0.0; 3]);
        buoy.set_touch(TouchRole::Lights, lights.id()).unwrap();
        buoy.set_touch(TouchRole::Lights, lights.id()).unwrap();
        assert!(buoy.set_touch(TouchRole::Lights, other.id()).is_err());
        assert_eq!(buoy.touch(TouchRole::Lights), Some(lights.id()));
        assert_eq!(buoy.touch(TouchRole::Topmar), None);
    }

    #[test]
    fn geo_size_trims_without_realloc() {
        let mut f = Feature::line(vec![[0.0; 3]; 8]);
        assert_eq!(f.geo_size(), 8);
        f.set_geo_size(3).unwrap();
        assert_eq!(f.geo_size(), 3);
        assert!(f.set_geo_size(9).is_err());
        let (npt, _) = f.ring(0).unwrap();
        assert_eq!(npt, 8);
    }

    #[test]
    fn centroid_iteration_and_reset() {
        let mut f = Feature::area(vec![square(0.0)]);
        assert!(!f.has_centroid());
        f.new_centroid();
        f.add_centroid(5.0, 5.0);
        f.add_centroid(2.0, 2.0);
        assert!(f.has_centroid());
        assert_eq!(f.next_centroid(), Some((5.0, 5.0)));
        assert_eq!(f.next_centroid(), Some((2.0, 2.0)));
        assert_eq!(f.next_centroid(), None);
        assert!(f.has_centroid());
        assert_eq!(f.next_centroid(), Some((5.0, 5.0)));
        f.reset_centroid();
        assert!(!f.has_centroid());
    }

    #[test]
    fn point_in_ring_closed_and_open() {
        let ring = square(0.0);
        assert!(point_in_ring(&ring, 5.0, 5.0, true));
        assert!(!point_in_ring(&ring, 15.0, 5.0, true));
        let open = &ring[..4];
        assert!(point_in_ring(open, 5.0, 5.0, false));
        assert!(!point_in_ring(open, -1.0, 5.0, false));
    }

    #[test]
    fn touches_point_in_area() {
        let area = Feature::area(vec![square(0.0)]);
        let inside = Feature::point([5.0, 5.0, 0.0]);
        let outside = Feature::point([50.0, 5.0, 0.0]);
        assert!(touches(&inside, &area));
        assert!(!touches(&outside, &area));
        assert!(!touches(&area, &inside));
    }

    #[test]
    fn scamin_resets_from_attribute() {
        let mut f = Feature::point([0.0; 3]);
        assert_eq!(f.scamin(), f64::INFINITY);
        f.set_attribute("SCAMIN", "49999");
        assert_eq!(f.reset_scamin_from_attribute(), 49999.0);
        f.set_attribute("SCAMIN", EMPTY_NUMBER_MARKER);
        assert_eq!(f.reset_scamin_from_attribute(), f64::INFINITY);
    }

    #[test]
    fn next_poly_chain_links_and_unlinks() {
        let mut world = Feature::area(vec![square(0.0)]);
        world.set_next_poly(Box::new(Feature::area(vec![square(1.0)])));
        world.set_next_poly(Box::new(Feature::area(vec![square(2.0)])));
        let first = world.next_poly().unwrap();
        assert!(first.next_poly().is_some());
        world.del_next_poly();
        assert!(world.next_poly().is_none());
    }

    #[test]
    fn attribute_summary_filters_internal_keys() {
        let mut f = Feature::point([0.0; 3]);
        f.set_attribute("OBJNAM", "Alpha");
        f.set_attribute("MASK", "3");
        f.set_attribute("NAME_RCID", "77");
        let summary = f.attribute_summary();
        assert!(summary.starts_with(&f.id().to_string()));
        assert!(summary.contains("OBJNAM:Alpha"));
        assert!(!summary.contains("MASK"));
        assert!(!summary.contains("NAME_RCID"));
    }
}
