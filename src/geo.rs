use std::f64::consts::{PI, TAU};

/// Wrap a longitude in radians into [-PI, PI).
#[inline(always)]
pub fn wrap_longitude(lon: f64) -> f64 {
    (lon + PI).rem_euclid(TAU) - PI
}

/// Clamp a latitude in radians to the poles.
#[inline(always)]
pub fn clamp_latitude(lat: f64) -> f64 {
    lat.clamp(-PI / 2.0, PI / 2.0)
}

/// Degree pair to radians.
#[inline(always)]
pub fn to_radians((lon, lat): (f64, f64)) -> (f64, f64) {
    (lon.to_radians(), lat.to_radians())
}
