use serde::{Deserialize, Serialize};

use super::state::WalkSessionState;
use crate::geo::haversine_km;
use crate::platform::Fix;

/// Thresholds applied to every incoming fix
///
/// The same values must be used by the foreground and background channels so
/// that their paths stay consistent when reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Fixes with a reported accuracy above this (meters) are discarded
    pub max_accuracy_m: f64,
    /// Minimum segment length (kilometers) for a fix to extend the path
    pub min_movement_km: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_accuracy_m: 50.0,
            min_movement_km: 0.001,
        }
    }
}

/// Decision taken for one fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixOutcome {
    /// First point of an empty path; no distance added
    Seeded,
    /// Appended; `segment_km` was added to the running distance
    Accepted { segment_km: f64 },
    /// Reported accuracy worse than the threshold
    RejectedAccuracy { accuracy_m: f64 },
    /// Too close to the last accepted point
    RejectedJitter { segment_km: f64 },
}

impl FixOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FixOutcome::Seeded | FixOutcome::Accepted { .. })
    }
}

impl WalkSessionState {
    /// Run `fix` through the filter and, if accepted, append it
    ///
    /// On rejection the state is left untouched.
    pub fn apply_fix(&mut self, fix: &Fix, filter: &FilterConfig) -> FixOutcome {
        if let Some(accuracy_m) = fix.accuracy_m {
            if accuracy_m > filter.max_accuracy_m {
                return FixOutcome::RejectedAccuracy { accuracy_m };
            }
        }

        let Some(last) = self.path.last() else {
            self.seed(fix.coordinate);
            return FixOutcome::Seeded;
        };

        let segment_km = haversine_km(last, &fix.coordinate);
        if segment_km < filter.min_movement_km {
            return FixOutcome::RejectedJitter { segment_km };
        }

        self.append(fix.coordinate, segment_km);
        FixOutcome::Accepted { segment_km }
    }

    /// Apply a batch in arrival order, returning how many fixes were accepted
    pub fn apply_fixes<'a>(
        &mut self,
        fixes: impl IntoIterator<Item = &'a Fix>,
        filter: &FilterConfig,
    ) -> usize {
        fixes
            .into_iter()
            .filter(|fix| self.apply_fix(fix, filter).is_accepted())
            .count()
    }
}
