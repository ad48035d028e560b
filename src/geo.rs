//! Great-circle distance between recorded coordinates.
//!
//! All distances in this crate are kilometers on a spherical Earth of radius
//! [`EARTH_RADIUS_KM`]. Coordinates are WGS84 decimal degrees.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A recorded position as `(latitude, longitude)` in decimal degrees.
///
/// Serializes as a two-element array `[lat, lon]`, which is the shape stored
/// in persisted session records and the walk log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

impl From<Coordinate> for (f64, f64) {
    fn from(c: Coordinate) -> Self {
        (c.latitude, c.longitude)
    }
}

/// Calculate the great-circle distance between two coordinates using the
/// haversine formula.
///
/// Symmetric, zero for identical points, and defined for every real input
/// (poles and the antimeridian included).
///
/// ```rust
/// use walk_tracker::geo::{haversine_km, Coordinate};
///
/// let a = Coordinate::new(37.5000, 127.0000);
/// let b = Coordinate::new(37.5005, 127.0000);
/// assert!((haversine_km(&a, &b) - 0.0556).abs() < 0.001);
/// ```
pub fn haversine_km(from: &Coordinate, to: &Coordinate) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + (d_lon / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
    // Rounding can leave `a` just outside [0, 1] for near-antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}
