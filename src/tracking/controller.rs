use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::filter::{FilterConfig, FixOutcome};
use super::state::WalkSessionState;
use super::summary::WalkSummary;
use crate::config::TrackingConfig;
use crate::error::{PermissionKind, TrackingError};
use crate::format::{format_distance, format_duration};
use crate::geo::Coordinate;
use crate::platform::{Accuracy, Fix, LocationProvider, Region};
use crate::snapshot::{Snapshot, SnapshotCapture};

/// Lifecycle of a foreground walk session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    RequestingPermission,
    Tracking,
    /// State has been handed to the background reconciler
    Backgrounded,
    Finalizing,
    Completed,
    PermissionDenied,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::RequestingPermission => "requesting permission",
            SessionPhase::Tracking => "tracking",
            SessionPhase::Backgrounded => "backgrounded",
            SessionPhase::Finalizing => "finalizing",
            SessionPhase::Completed => "completed",
            SessionPhase::PermissionDenied => "permission denied",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a session for display
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub id: String,
    pub phase: SessionPhase,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_secs: u64,
    pub distance_km: f64,
    pub points: usize,
    pub region: Option<Region>,
}

/// State touched by the spawned clock and fix tasks
#[derive(Clone)]
struct Live {
    state: Arc<Mutex<Option<WalkSessionState>>>,
    region: Arc<Mutex<Option<Region>>>,
    /// Cleared before any teardown; checked under the state lock before every mutation
    is_tracking: Arc<AtomicBool>,
    elapsed_secs: Arc<AtomicU64>,
    filter: FilterConfig,
}

impl Live {
    /// Apply one fix if the session is still tracking
    ///
    /// Returns `None` when the fix was discarded because tracking has stopped.
    async fn apply(&self, fix: &Fix) -> Option<FixOutcome> {
        let mut guard = self.state.lock().await;
        if !self.is_tracking.load(Ordering::SeqCst) {
            return None;
        }
        let state = guard.as_mut()?;

        let outcome = state.apply_fix(fix, &self.filter);
        match outcome {
            FixOutcome::Seeded | FixOutcome::Accepted { .. } => {
                let mut region = self.region.lock().await;
                *region = Some(match *region {
                    Some(current) => current.recentered(fix.coordinate),
                    None => Region::around(fix.coordinate),
                });
            }
            FixOutcome::RejectedAccuracy { accuracy_m } => {
                debug!("Skipping inaccurate fix ({:.0}m)", accuracy_m);
            }
            FixOutcome::RejectedJitter { segment_km } => {
                debug!("Skipping jitter ({:.1}m)", segment_km * 1000.0);
            }
        }

        Some(outcome)
    }
}

/// Foreground walk session
///
/// Drives `Idle → RequestingPermission → Tracking → Finalizing → Completed`,
/// with `PermissionDenied` as the failure terminal. A completed session is not
/// reused; start a new `WalkSession` for the next walk.
pub struct WalkSession {
    id: String,
    config: TrackingConfig,
    location: Arc<dyn LocationProvider>,
    snapshot: Option<SnapshotCapture>,

    phase: Mutex<SessionPhase>,

    /// Final summary; held across finalizing so concurrent stops wait for it
    summary: Mutex<Option<WalkSummary>>,

    live: Live,

    /// Handle for the elapsed-time clock task
    clock_task_handle: Mutex<Option<JoinHandle<()>>>,

    /// Handle for the fix subscription task
    fix_task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl WalkSession {
    pub fn new(location: Arc<dyn LocationProvider>, config: TrackingConfig) -> Self {
        Self::with_id(format!("walk-{}", uuid::Uuid::new_v4()), location, config)
    }

    pub fn with_id(id: String, location: Arc<dyn LocationProvider>, config: TrackingConfig) -> Self {
        let filter = config.filter();
        Self {
            id,
            config,
            location,
            snapshot: None,
            phase: Mutex::new(SessionPhase::Idle),
            summary: Mutex::new(None),
            live: Live {
                state: Arc::new(Mutex::new(None)),
                region: Arc::new(Mutex::new(None)),
                is_tracking: Arc::new(AtomicBool::new(false)),
                elapsed_secs: Arc::new(AtomicU64::new(0)),
                filter,
            },
            clock_task_handle: Mutex::new(None),
            fix_task_handle: Mutex::new(None),
        }
    }

    /// Capture a map snapshot when the session stops
    pub fn with_snapshot(mut self, capture: SnapshotCapture) -> Self {
        self.snapshot = Some(capture);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn phase(&self) -> SessionPhase {
        *self.phase.lock().await
    }

    /// Seconds elapsed as of the last clock tick
    pub fn elapsed_secs(&self) -> u64 {
        self.live.elapsed_secs.load(Ordering::SeqCst)
    }

    /// Copy of the live session state, if this session currently owns it
    pub async fn state(&self) -> Option<WalkSessionState> {
        self.live.state.lock().await.clone()
    }

    pub async fn region(&self) -> Option<Region> {
        *self.live.region.lock().await
    }

    pub async fn status(&self) -> SessionStatus {
        let phase = self.phase().await;
        let (started_at, mut distance_km, mut points) = match &*self.live.state.lock().await {
            Some(state) => (Some(state.start_time), state.distance, state.path.len()),
            None => (None, 0.0, 0),
        };

        // After completion the state is gone; report the summary instead.
        // try_lock: the slot is held while a stop is finalizing
        if let Ok(slot) = self.summary.try_lock() {
            if let Some(summary) = slot.as_ref() {
                distance_km = summary.distance;
                points = summary.path.len();
            }
        }

        SessionStatus {
            id: self.id.clone(),
            phase,
            started_at,
            elapsed_secs: self.elapsed_secs(),
            distance_km,
            points,
            region: self.region().await,
        }
    }

    /// Start tracking
    ///
    /// Requests foreground permission, seeds the path from one high-accuracy
    /// fix and subscribes to further fixes. If `stop` is called while this is
    /// in flight the start is abandoned and nothing is left running.
    pub async fn start(&self) -> Result<(), TrackingError> {
        {
            let mut phase = self.phase.lock().await;
            match *phase {
                SessionPhase::Idle => *phase = SessionPhase::RequestingPermission,
                SessionPhase::Tracking => {
                    warn!("Walk session {} already tracking", self.id);
                    return Ok(());
                }
                other => {
                    return Err(TrackingError::InvalidPhase {
                        operation: "start",
                        phase: other.to_string(),
                    })
                }
            }
        }

        info!("Starting walk session: {}", self.id);

        let status = match self.location.request_foreground_permission().await {
            Ok(status) => status,
            Err(e) => return Err(self.abort_start(TrackingError::Provider(e)).await),
        };
        if !status.is_granted() {
            let mut phase = self.phase.lock().await;
            if *phase == SessionPhase::RequestingPermission {
                *phase = SessionPhase::PermissionDenied;
            }
            warn!("Walk session {}: location permission denied", self.id);
            return Err(TrackingError::PermissionDenied(PermissionKind::Foreground));
        }
        self.ensure_not_cancelled().await?;

        let initial = match self.location.current_position(Accuracy::Highest).await {
            Ok(fix) => fix,
            Err(e) => return Err(self.abort_start(TrackingError::Provider(e)).await),
        };
        self.ensure_not_cancelled().await?;

        let rx = match self
            .location
            .watch_position(self.config.update_options(Accuracy::High))
            .await
        {
            Ok(rx) => rx,
            Err(e) => return Err(self.abort_start(TrackingError::Provider(e)).await),
        };

        // Commit under the phase lock so a concurrent stop sees either
        // nothing or a fully running session
        let mut phase = self.phase.lock().await;
        if *phase != SessionPhase::RequestingPermission {
            info!("Walk session {} stopped before tracking began", self.id);
            return Err(TrackingError::InvalidPhase {
                operation: "start",
                phase: phase.to_string(),
            });
        }

        let mut state = WalkSessionState::new(Utc::now());
        state.seed(initial.coordinate);
        self.install(state, Region::around(initial.coordinate), rx).await;
        *phase = SessionPhase::Tracking;

        info!(
            "Walk session {} tracking from ({:.6}, {:.6}) via {}",
            self.id,
            initial.coordinate.latitude,
            initial.coordinate.longitude,
            self.location.name()
        );

        Ok(())
    }

    /// Feed one fix through the live-update channel
    ///
    /// This is what the subscription task does for each fix it receives.
    pub async fn submit_fix(&self, fix: Fix) -> Result<FixOutcome, TrackingError> {
        match self.live.apply(&fix).await {
            Some(outcome) => Ok(outcome),
            None => Err(TrackingError::InvalidPhase {
                operation: "accept fixes",
                phase: self.phase().await.to_string(),
            }),
        }
    }

    /// Stop tracking and produce the walk summary
    ///
    /// Idempotent: once completed, further calls return the same summary.
    pub async fn stop(&self) -> Result<WalkSummary, TrackingError> {
        let mut summary_slot = self.summary.lock().await;
        if let Some(summary) = summary_slot.as_ref() {
            return Ok(summary.clone());
        }

        {
            let mut phase = self.phase.lock().await;
            match *phase {
                SessionPhase::Tracking => *phase = SessionPhase::Finalizing,
                SessionPhase::Idle | SessionPhase::RequestingPermission => {
                    info!("Walk session {} cancelled before tracking began", self.id);
                    *phase = SessionPhase::Completed;
                    return Err(TrackingError::InvalidPhase {
                        operation: "stop",
                        phase: "not started".to_string(),
                    });
                }
                SessionPhase::Backgrounded => return Err(TrackingError::NotOwner),
                other => {
                    return Err(TrackingError::InvalidPhase {
                        operation: "stop",
                        phase: other.to_string(),
                    })
                }
            }
        }

        info!("Stopping walk session: {}", self.id);

        let state = self.teardown().await;
        let ended_at = Utc::now();

        let Some(mut state) = state else {
            // Unreachable while the phase lock guards install/teardown
            error!("Walk session {} had no state to finalize", self.id);
            *self.phase.lock().await = SessionPhase::Completed;
            return Err(TrackingError::InvalidPhase {
                operation: "stop",
                phase: SessionPhase::Finalizing.to_string(),
            });
        };
        state.close();

        let snapshot = match &self.snapshot {
            Some(capture) => capture.capture(state.path.as_slice()).await,
            None => Snapshot::Absent,
        };

        let summary = WalkSummary::from_state(&state, ended_at, snapshot);
        *summary_slot = Some(summary.clone());
        *self.phase.lock().await = SessionPhase::Completed;

        info!(
            "Walk session {} completed: {} · {} ({} points)",
            self.id,
            format_duration(summary.duration),
            format_distance(summary.distance),
            summary.path.len()
        );

        Ok(summary)
    }

    /// Surrender the session state so the background reconciler can own it
    ///
    /// Tracking stops here until [`resume`](Self::resume) hands state back.
    pub async fn hand_off(&self) -> Result<WalkSessionState, TrackingError> {
        let mut phase = self.phase.lock().await;
        if *phase != SessionPhase::Tracking {
            return Err(TrackingError::InvalidPhase {
                operation: "hand off",
                phase: phase.to_string(),
            });
        }

        let state = self.teardown().await.ok_or(TrackingError::NotOwner)?;
        *phase = SessionPhase::Backgrounded;

        info!(
            "Walk session {} handed off with {} points",
            self.id,
            state.path.len()
        );

        Ok(state)
    }

    /// Take back ownership of a session state released by the background reconciler
    pub async fn resume(&self, state: WalkSessionState) -> Result<(), TrackingError> {
        let mut phase = self.phase.lock().await;
        if *phase != SessionPhase::Backgrounded {
            return Err(TrackingError::InvalidPhase {
                operation: "resume",
                phase: phase.to_string(),
            });
        }

        let rx = self
            .location
            .watch_position(self.config.update_options(Accuracy::High))
            .await
            .map_err(TrackingError::Provider)?;

        let region = match state.path.last() {
            Some(last) => Region::around(*last),
            None => self
                .region()
                .await
                .unwrap_or_else(|| Region::around(Coordinate::new(0.0, 0.0))),
        };

        let points = state.path.len();
        self.install(state, region, rx).await;
        *phase = SessionPhase::Tracking;

        info!("Walk session {} resumed with {} points", self.id, points);

        Ok(())
    }

    async fn ensure_not_cancelled(&self) -> Result<(), TrackingError> {
        let phase = self.phase.lock().await;
        if *phase == SessionPhase::RequestingPermission {
            Ok(())
        } else {
            info!("Walk session {} stopped before tracking began", self.id);
            Err(TrackingError::InvalidPhase {
                operation: "start",
                phase: phase.to_string(),
            })
        }
    }

    async fn abort_start(&self, err: TrackingError) -> TrackingError {
        let mut phase = self.phase.lock().await;
        if *phase == SessionPhase::RequestingPermission {
            *phase = SessionPhase::Idle;
        }
        error!("Failed to start walk session {}: {}", self.id, err);
        err
    }

    /// Install owned state and spawn the clock and fix tasks
    async fn install(&self, state: WalkSessionState, region: Region, mut rx: mpsc::Receiver<Fix>) {
        let start_time = state.start_time;
        let elapsed = state.elapsed_secs(Utc::now());

        *self.live.state.lock().await = Some(state);
        *self.live.region.lock().await = Some(region);
        self.live.elapsed_secs.store(elapsed, Ordering::SeqCst);
        self.live.is_tracking.store(true, Ordering::SeqCst);

        // Elapsed time is derived from the start time, so missed ticks do not drift
        let live = self.live.clone();
        let clock_interval = self.config.clock_interval();
        let clock_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(clock_interval);
            loop {
                ticker.tick().await;
                if !live.is_tracking.load(Ordering::SeqCst) {
                    break;
                }
                let secs = Utc::now()
                    .signed_duration_since(start_time)
                    .num_seconds()
                    .max(0) as u64;
                live.elapsed_secs.store(secs, Ordering::SeqCst);
            }
        });

        let live = self.live.clone();
        let session_id = self.id.clone();
        let fix_task = tokio::spawn(async move {
            debug!("Fix subscription task started for {}", session_id);

            while let Some(fix) = rx.recv().await {
                if live.apply(&fix).await.is_none() {
                    break;
                }
            }

            debug!("Fix subscription task stopped for {}", session_id);
        });

        *self.clock_task_handle.lock().await = Some(clock_task);
        *self.fix_task_handle.lock().await = Some(fix_task);
    }

    /// Stop the tasks and take the owned state out
    ///
    /// Clearing `is_tracking` while holding the state lock guarantees no fix
    /// mutates the state after this returns.
    async fn teardown(&self) -> Option<WalkSessionState> {
        let state = {
            let mut guard = self.live.state.lock().await;
            self.live.is_tracking.store(false, Ordering::SeqCst);
            guard.take()
        };

        for handle in [&self.clock_task_handle, &self.fix_task_handle] {
            if let Some(task) = handle.lock().await.take() {
                task.abort();
                if let Err(e) = task.await {
                    if !e.is_cancelled() {
                        error!("Walk session {} task panicked: {}", self.id, e);
                    }
                }
            }
        }

        if let Some(state) = &state {
            self.live
                .elapsed_secs
                .store(state.elapsed_secs(Utc::now()), Ordering::SeqCst);
        }

        state
    }
}

impl Drop for WalkSession {
    fn drop(&mut self) {
        self.live.is_tracking.store(false, Ordering::SeqCst);
        for handle in [&self.clock_task_handle, &self.fix_task_handle] {
            if let Ok(mut slot) = handle.try_lock() {
                if let Some(task) = slot.take() {
                    task.abort();
                }
            }
        }
    }
}
