//! Process-wide view state.
//!
//! Viewport, center/range/north, and the extents and scale factors derived
//! from them. The projected extent feeds the frame's ortho matrix; the
//! meters-per-pixel figures feed symbol scaling and the on-screen SCAMIN
//! denominator.

use crate::error::{Result, S52Error};
use crate::geo::Extent;
use crate::projection::{Projection, METERS_PER_NM};

#[derive(Debug, Clone)]
pub struct View {
    /// Viewport rectangle in pixels.
    pub vp_x: i32,
    pub vp_y: i32,
    pub vp_w: u32,
    pub vp_h: u32,

    /// Physical size of one pixel, millimeters.
    pub dotpitch_mm_x: f64,
    pub dotpitch_mm_y: f64,

    pub center_lat: f64,
    pub center_lon: f64,
    pub range_nm: f64,
    pub north_deg: f64,

    // derived
    pmin: (f64, f64),
    pmax: (f64, f64),
    gmin: (f64, f64),
    gmax: (f64, f64),
    mpp_x: f64,
    mpp_y: f64,
}

impl View {
    pub fn new(dotpitch_mm_x: f64, dotpitch_mm_y: f64, vp_w: u32, vp_h: u32) -> Self {
        Self {
            vp_x: 0,
            vp_y: 0,
            vp_w,
            vp_h,
            dotpitch_mm_x,
            dotpitch_mm_y,
            center_lat: 0.0,
            center_lon: 0.0,
            range_nm: 1.0,
            north_deg: 0.0,
            pmin: (0.0, 0.0),
            pmax: (1.0, 1.0),
            gmin: (0.0, 0.0),
            gmax: (0.0, 0.0),
            mpp_x: 1.0,
            mpp_y: 1.0,
        }
    }

    pub fn set_viewport(&mut self, x: i32, y: i32, w: u32, h: u32) {
        self.vp_x = x;
        self.vp_y = y;
        self.vp_w = w.max(1);
        self.vp_h = h.max(1);
    }

    #[inline]
    pub fn viewport(&self) -> (i32, i32, u32, u32) {
        (self.vp_x, self.vp_y, self.vp_w, self.vp_h)
    }

    pub fn set_view(&mut self, center_lat: f64, center_lon: f64, range_nm: f64, north_deg: f64) {
        self.center_lat = center_lat;
        self.center_lon = center_lon;
        self.range_nm = range_nm.max(1e-3);
        self.north_deg = north_deg.rem_euclid(360.0);
    }

    /// Derive projected and geographic extents from center/range and the
    /// viewport aspect. The range spans half the viewport height.
    pub fn recompute(&mut self, prj: &Projection) -> Result<()> {
        let (cx, cy) = prj.geo_to_prj(self.center_lon, self.center_lat)?;
        let half_h = self.range_nm * METERS_PER_NM;
        let half_w = half_h * self.vp_w as f64 / self.vp_h as f64;
        self.set_projected_view(cy - half_h, cx - half_w, cy + half_h, cx + half_w)?;

        let (glon_min, glat_min) = prj.prj_to_geo(self.pmin.0, self.pmin.1)?;
        let (glon_max, glat_max) = prj.prj_to_geo(self.pmax.0, self.pmax.1)?;
        self.gmin = (glon_min, glat_min);
        self.gmax = (glon_max, glat_max);
        Ok(())
    }

    /// Projected extent, canonical only. Argument order follows the chart
    /// convention: south, west, north, east.
    pub fn set_projected_view(&mut self, s: f64, w: f64, n: f64, e: f64) -> Result<()> {
        if !(s.is_finite() && w.is_finite() && n.is_finite() && e.is_finite()) || w > e || s > n {
            return Err(S52Error::ExtentInvalid { w, s, e, n });
        }
        self.pmin = (w, s);
        self.pmax = (e, n);
        self.mpp_x = (e - w) / self.vp_w as f64;
        self.mpp_y = (n - s) / self.vp_h as f64;
        Ok(())
    }

    pub fn projected_view(&self) -> (f64, f64, f64, f64) {
        (self.pmin.1, self.pmin.0, self.pmax.1, self.pmax.0)
    }

    /// Geographic extent; `w > e` is legal here (date-line crossing).
    pub fn set_geographic_view(&mut self, s: f64, w: f64, n: f64, e: f64) -> Result<()> {
        if !(s.is_finite() && w.is_finite() && n.is_finite() && e.is_finite()) || s > n {
            return Err(S52Error::ExtentInvalid { w, s, e, n });
        }
        self.gmin = (w, s);
        self.gmax = (e, n);
        Ok(())
    }

    pub fn geographic_view(&self) -> (f64, f64, f64, f64) {
        (self.gmin.1, self.gmin.0, self.gmax.1, self.gmax.0)
    }

    pub fn projected_extent(&self) -> Extent {
        Extent {
            w: self.pmin.0,
            s: self.pmin.1,
            e: self.pmax.0,
            n: self.pmax.1,
        }
    }

    pub fn projected_center(&self) -> (f64, f64) {
        (
            (self.pmin.0 + self.pmax.0) * 0.5,
            (self.pmin.1 + self.pmax.1) * 0.5,
        )
    }

    #[inline]
    pub fn meters_per_pixel_x(&self) -> f64 {
        self.mpp_x
    }

    #[inline]
    pub fn meters_per_pixel_y(&self) -> f64 {
        self.mpp_y
    }

    /// On-screen scale denominator driving SCAMIN suppression.
    pub fn scale_denominator(&self) -> f64 {
        self.mpp_y * 10_000.0
    }

    /// SCAMIN gate: a finite threshold suppresses once the chart is zoomed
    /// out past it; an infinite threshold never does.
    pub fn scamin_suppresses(&self, scamin: f64) -> bool {
        scamin.is_finite() && self.scale_denominator() > scamin
    }

    /// Pixels covered by one millimeter of screen, X axis.
    #[inline]
    pub fn px_per_mm_x(&self) -> f64 {
        1.0 / self.dotpitch_mm_x
    }

    #[inline]
    pub fn px_per_mm_y(&self) -> f64 {
        1.0 / self.dotpitch_mm_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prj() -> Projection {
        let mut p = Projection::new();
        p.set_origin(46.8, -71.2).unwrap();
        p
    }

    fn view() -> View {
        let mut v = View::new(0.3, 0.3, 800, 600);
        v.set_view(46.8, -71.2, 1.0, 0.0);
        v.recompute(&prj()).unwrap();
        v
    }

    #[test]
    fn recompute_centers_extent_on_view_center() {
        let v = view();
        let (cx, cy) = v.projected_center();
        let (px, py) = prj().geo_to_prj(-71.2, 46.8).unwrap();
        assert!((cx - px).abs() < 1e-9);
        assert!((cy - py).abs() < 1e-9);
        let (s, w, n, e) = v.projected_view();
        assert!(w < e && s < n);
        // 1 NM range = 1852 m half height
        assert!(((n - s) - 2.0 * METERS_PER_NM).abs() < 1e-6);
    }

    #[test]
    fn mpp_and_scamin_follow_viewport() {
        let v = view();
        let expect_mpp_y = 2.0 * METERS_PER_NM / 600.0;
        assert!((v.meters_per_pixel_y() - expect_mpp_y).abs() < 1e-9);
        assert!((v.scale_denominator() - expect_mpp_y * 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn projected_view_must_be_canonical() {
        let mut v = View::new(0.3, 0.3, 800, 600);
        assert!(v.set_projected_view(0.0, 10.0, 10.0, 0.0).is_err());
        assert!(v
            .set_projected_view(0.0, f64::INFINITY, 10.0, 20.0)
            .is_err());
        assert!(v.set_projected_view(0.0, 0.0, 10.0, 10.0).is_ok());
    }

    #[test]
    fn geographic_view_may_cross_the_date_line() {
        let mut v = View::new(0.3, 0.3, 800, 600);
        // W = 179, E = -179: wraps, allowed
        assert!(v.set_geographic_view(-10.0, 179.0, 10.0, -179.0).is_ok());
        let (s, w, n, e) = v.geographic_view();
        assert_eq!((s, w, n, e), (-10.0, 179.0, 10.0, -179.0));
    }
}
