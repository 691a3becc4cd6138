//! Chart projection.
//!
//! Charts render in a planar, equal-meter Mercator frame so pixel sizes,
//! line lengths (NM) and symbol offsets (mm) stay linear. The origin
//! (`lat_ts`, `lon_0`) is bound once, from the reference latitude of the
//! first chart loaded; a second bind is a warned no-op.

use crate::error::{Result, S52Error};

/// WGS-84 semi-major axis, meters.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

pub const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;
pub const RAD_TO_DEG: f64 = 180.0 / std::f64::consts::PI;

/// Meters per minute of latitude (one nautical mile).
pub const METERS_PER_NM: f64 = 1_852.0;

/// Spherical Mercator with true-scale latitude, late-bound origin.
#[derive(Debug, Default)]
pub struct Projection {
    origin: Option<MercOrigin>,
}

#[derive(Debug, Clone, Copy)]
struct MercOrigin {
    lon_0: f64,
    /// `R * cos(lat_ts)`: scale at the latitude of true scale.
    rk: f64,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the Mercator origin. The first call wins; later calls warn and
    /// return `OriginAlreadySet` (callers in the draw path ignore it, tests
    /// assert it).
    pub fn set_origin(&mut self, lat_ts: f64, lon_0: f64) -> Result<()> {
        if self.origin.is_some() {
            log::warn!("Mercator projection already set, keeping first origin");
            return Err(S52Error::OriginAlreadySet);
        }
        self.origin = Some(MercOrigin {
            lon_0,
            rk: EARTH_RADIUS_M * (lat_ts * DEG_TO_RAD).cos(),
        });
        Ok(())
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.origin.is_some()
    }

    /// Geographic (lon, lat) degrees to projected meters.
    pub fn geo_to_prj(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        let o = self.origin.ok_or(S52Error::ProjectionNotSet)?;
        let x = o.rk * (lon - o.lon_0) * DEG_TO_RAD;
        let phi = lat * DEG_TO_RAD;
        let y = o.rk * (std::f64::consts::FRAC_PI_4 + phi * 0.5).tan().ln();
        Ok((x, y))
    }

    /// Projected meters back to geographic (lon, lat) degrees.
    pub fn prj_to_geo(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let o = self.origin.ok_or(S52Error::ProjectionNotSet)?;
        let lon = (x / o.rk) * RAD_TO_DEG + o.lon_0;
        let lat = (2.0 * (y / o.rk).exp().atan() - std::f64::consts::FRAC_PI_2) * RAD_TO_DEG;
        Ok((lon, lat))
    }

    /// In-place batch transform of (x=lon, y=lat, z) triples to projected
    /// meters. Z passes through untouched (depth/sounding value).
    pub fn project_nv(&self, triples: &mut [[f64; 3]]) -> Result<()> {
        let o = self.origin.ok_or(S52Error::ProjectionNotSet)?;
        for pt in triples.iter_mut() {
            let phi = pt[1] * DEG_TO_RAD;
            pt[0] = o.rk * (pt[0] - o.lon_0) * DEG_TO_RAD;
            pt[1] = o.rk * (std::f64::consts::FRAC_PI_4 + phi * 0.5).tan().ln();
        }
        Ok(())
    }
}
