use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::state::{Path, WalkSessionState};
use crate::format::{format_distance, format_duration};
use crate::snapshot::Snapshot;

/// Completed walk, produced once per session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkSummary {
    /// Whole seconds between start and stop
    pub duration: u64,

    /// Kilometers
    pub distance: f64,

    pub path: Path,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_uri: Option<PathBuf>,
}

impl WalkSummary {
    /// Build the summary for a session that ended at `ended_at`
    ///
    /// Duration is measured from the recorded start time, so a state handed
    /// back by the background reconciler yields the same figure the
    /// foreground would have.
    ///
    /// `state` must already be closed.
    pub fn from_state(state: &WalkSessionState, ended_at: DateTime<Utc>, snapshot: Snapshot) -> Self {
        debug_assert!(!state.is_active, "summary built from an active session");
        Self {
            duration: state.elapsed_secs(ended_at),
            distance: state.distance,
            path: state.path.clone(),
            snapshot_uri: snapshot.into_option(),
        }
    }

    /// One-line human readable description
    pub fn describe(&self) -> String {
        format!(
            "{} · {} · {} points",
            format_duration(self.duration),
            format_distance(self.distance),
            self.path.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;

    #[test]
    fn test_from_state_uses_start_time() {
        let start = Utc::now();
        let mut state = WalkSessionState::new(start);
        state.seed(Coordinate::new(37.5, 127.0));
        state.close();

        let summary = WalkSummary::from_state(
            &state,
            start + chrono::Duration::seconds(754),
            Snapshot::Absent,
        );

        assert_eq!(summary.duration, 754);
        assert_eq!(summary.distance, 0.0);
        assert_eq!(summary.path.len(), 1);
        assert!(summary.snapshot_uri.is_none());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "active session")]
    fn test_active_state_is_not_summarized() {
        let state = WalkSessionState::new(Utc::now());
        WalkSummary::from_state(&state, Utc::now(), Snapshot::Absent);
    }

    #[test]
    fn test_snapshot_uri_omitted_when_absent() {
        let mut state = WalkSessionState::new(Utc::now());
        state.close();
        let summary = WalkSummary::from_state(
            &state,
            Utc::now(),
            Snapshot::Absent,
        );
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("snapshotUri"));

        let with_snapshot = WalkSummary {
            snapshot_uri: Some(PathBuf::from("/tmp/walk-1.png")),
            ..summary
        };
        let json = serde_json::to_string(&with_snapshot).unwrap();
        assert!(json.contains("\"snapshotUri\":\"/tmp/walk-1.png\""));
    }
}
