use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Ordered, append-only sequence of accepted coordinates
///
/// Insertion order is chronological order. Points are never reordered or
/// removed once appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<Coordinate>);

impl Path {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub(crate) fn push(&mut self, point: Coordinate) {
        self.0.push(point);
    }

    pub fn last(&self) -> Option<&Coordinate> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Coordinate> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Coordinate] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Coordinate;
    type IntoIter = std::slice::Iter<'a, Coordinate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Mutable state of one walk session
///
/// Owned by exactly one tracking context at a time. Persisted by the
/// background reconciler as
/// `{"startTime": <epoch ms>, "path": [[lat, lon], ...], "distance": km, "isActive": bool}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkSessionState {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,

    pub path: Path,

    /// Running total in kilometers, maintained incrementally
    pub distance: f64,

    pub is_active: bool,
}

impl WalkSessionState {
    /// Fresh session: empty path, zero distance, active
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            path: Path::new(),
            distance: 0.0,
            is_active: true,
        }
    }

    /// Whole seconds elapsed between the session start and `now`, never negative
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        now.signed_duration_since(self.start_time)
            .num_seconds()
            .max(0) as u64
    }

    /// Seed the path with the first point
    ///
    /// Has no effect once the path holds a point.
    pub fn seed(&mut self, point: Coordinate) -> bool {
        if !self.path.is_empty() {
            return false;
        }
        self.path.push(point);
        true
    }

    /// Mark the session finished; the state is read-only from here on
    pub fn close(&mut self) {
        self.is_active = false;
    }

    pub(crate) fn append(&mut self, point: Coordinate, segment_km: f64) {
        self.path.push(point);
        self.distance += segment_km;
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
