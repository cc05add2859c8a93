//! Great-circle distance estimates.
//!
//! No road network is available in this engine; impact figures and route
//! totals after a reassignment use straight-line distance and an assumed
//! average driving speed.

/// Assumed average driving speed for time estimates.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points in kilometers.
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Travel time in seconds for a distance in kilometers at the assumed
/// speed.
pub fn travel_secs(km: f64) -> f64 {
    km / DEFAULT_SPEED_KMH * 3600.0
}

/// Chained stop-to-stop distance along a route, in meters.
pub fn chain_distance_m(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_km(w[0], w[1]) * 1000.0)
        .sum()
}
