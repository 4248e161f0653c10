//! Geographic coordinate type and spatial utilities.
//!
//! `GeoPoint` uses `f32` (single-precision) latitude/longitude.  At the
//! equator this gives about 1 m precision, enough for street networks.
//! Arms around an intersection are ordered with [`GeoPoint::bearing_to`],
//! which works in `f64` so the order stays stable for arms only a few metres
//! apart.

/// A WGS-84 geographic coordinate stored as single-precision floats.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub lat: f32,
    pub lon: f32,
}

impl GeoPoint {
    #[inline]
    pub fn new(lat: f32, lon: f32) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in metres (haversine).  Street lengths are
    /// derived from it, so `f32` accuracy is plenty.
    pub fn distance_m(self, other: GeoPoint) -> f32 {
        const EARTH_RADIUS_M: f32 = 6_371_000.0;

        let (phi1, phi2) = (self.lat.to_radians(), other.lat.to_radians());
        let half_dphi = (phi2 - phi1) / 2.0;
        let half_dlambda = (other.lon - self.lon).to_radians() / 2.0;
        let h = half_dphi.sin().powi(2) + phi1.cos() * phi2.cos() * half_dlambda.sin().powi(2);
        2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
    }

    /// Planar angle (radians, counter-clockwise from east, in `(-π, π]`) of
    /// the direction from `self` towards `other`.
    ///
    /// Longitude differences are scaled by `cos(lat)` so that the angle is
    /// measured in a locally isotropic plane.
    pub fn bearing_to(self, other: GeoPoint) -> f64 {
        let lat0 = f64::from(self.lat).to_radians();
        let dx = (f64::from(other.lon) - f64::from(self.lon)) * lat0.cos();
        let dy = f64::from(other.lat) - f64::from(self.lat);
        dy.atan2(dx)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}
