//! Geodetic helpers for trajectory planning.

use seafire_core::constants::EARTH_RADIUS_M;
use seafire_core::types::{GeoPoint, GeoPoint3};

/// Great-circle distance between two points (haversine, metres).
pub fn haversine_distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat_deg.to_radians();
    let lat2 = b.lat_deg.to_radians();
    let delta_lat = (b.lat_deg - a.lat_deg).to_radians();
    let delta_lon = (b.lon_deg - a.lon_deg).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial bearing from `from` toward `to` (degrees, [0, 360)).
pub fn initial_bearing_deg(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.lat_deg.to_radians();
    let lat2 = to.lat_deg.to_radians();
    let delta_lon = (to.lon_deg - from.lon_deg).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Linear interpolation between two 3D positions, `t` in [0, 1].
pub fn lerp_position(a: GeoPoint3, b: GeoPoint3, t: f64) -> GeoPoint3 {
    GeoPoint3 {
        lat_deg: a.lat_deg + (b.lat_deg - a.lat_deg) * t,
        lon_deg: a.lon_deg + (b.lon_deg - a.lon_deg) * t,
        alt_m: a.alt_m + (b.alt_m - a.alt_m) * t,
    }
}

/// Length of a polyline over the ground (metres).
pub fn polyline_length_m(points: &[GeoPoint3]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance_m(pair[0].horizontal(), pair[1].horizontal()))
        .sum()
}
