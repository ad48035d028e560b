//! Simulated movement for demos and tests.
//!
//! Not a production fix source: real sessions take fixes from a
//! [`LocationProvider`](super::LocationProvider).

use chrono::{Duration, Utc};

use super::location::Fix;
use crate::geo::Coordinate;

const METERS_PER_DEGREE_LAT: f64 = 111_139.0;

/// Walker moving at constant speed along a fixed heading
#[derive(Debug, Clone)]
pub struct SimulatedWalk {
    position: Coordinate,
    /// Degrees clockwise from north
    heading_deg: f64,
    speed_mps: f64,
    step_secs: f64,
    accuracy_m: Option<f64>,
    steps_taken: u64,
}

impl SimulatedWalk {
    /// 5 m/s heading east, one fix every 2 seconds
    pub fn new(start: Coordinate) -> Self {
        Self {
            position: start,
            heading_deg: 90.0,
            speed_mps: 5.0,
            step_secs: 2.0,
            accuracy_m: Some(5.0),
            steps_taken: 0,
        }
    }

    pub fn with_heading(mut self, heading_deg: f64) -> Self {
        self.heading_deg = heading_deg;
        self
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = speed_mps;
        self
    }

    fn advance(&mut self) -> Coordinate {
        let step_m = self.speed_mps * self.step_secs;
        let heading = self.heading_deg.to_radians();
        let north_m = heading.cos() * step_m;
        let east_m = heading.sin() * step_m;

        let lon_scale_raw = METERS_PER_DEGREE_LAT * self.position.latitude.to_radians().cos();
        let lon_scale = lon_scale_raw.abs().max(1.0);
        let sign = if lon_scale_raw < 0.0 { -1.0 } else { 1.0 };

        self.position = Coordinate::new(
            self.position.latitude + north_m / METERS_PER_DEGREE_LAT,
            self.position.longitude + east_m / lon_scale * sign,
        );
        self.position
    }
}

impl Iterator for SimulatedWalk {
    type Item = Fix;

    fn next(&mut self) -> Option<Fix> {
        let coordinate = self.advance();
        self.steps_taken += 1;

        let offset_ms = (self.steps_taken as f64 * self.step_secs * 1000.0) as i64;
        Some(Fix {
            coordinate,
            accuracy_m: self.accuracy_m,
            timestamp: Utc::now() + Duration::milliseconds(offset_ms),
        })
    }
}
