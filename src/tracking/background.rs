use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::filter::FilterConfig;
use super::state::WalkSessionState;
use crate::error::{PermissionKind, TrackingError};
use crate::format::format_distance;
use crate::platform::{Fix, KeyValueStore, LocationProvider, LocationTaskHandler, TaskOptions, TaskScheduler};

/// Name the background location task is registered under
pub const LOCATION_TASK_NAME: &str = "background-location-task";

/// Storage slot holding the background-owned session record
pub const WALK_SESSION_KEY: &str = "@walk_session_background";

/// Read-modify-write access to the persisted session record
///
/// Every update loads the latest persisted value under `lock`, applies the
/// change and persists it before releasing, so two wakeups can never both
/// work from the same stale read.
struct SessionRecord {
    store: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
}

impl SessionRecord {
    /// An unparseable record reads as no session
    async fn load(store: &dyn KeyValueStore) -> Result<Option<WalkSessionState>> {
        let Some(json) = store
            .get(WALK_SESSION_KEY)
            .await
            .context("Failed to read background session")?
        else {
            return Ok(None);
        };

        match WalkSessionState::from_json(&json) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!("Ignoring unreadable background session: {}", e);
                Ok(None)
            }
        }
    }

    async fn save(store: &dyn KeyValueStore, state: &WalkSessionState) -> Result<()> {
        let json = state.to_json().context("Failed to serialize background session")?;
        store
            .set(WALK_SESSION_KEY, &json)
            .await
            .context("Failed to persist background session")
    }

    async fn read(&self) -> Result<Option<WalkSessionState>> {
        let _guard = self.lock.lock().await;
        Self::load(self.store.as_ref()).await
    }

    async fn write(&self, state: &WalkSessionState) -> Result<()> {
        let _guard = self.lock.lock().await;
        Self::save(self.store.as_ref(), state).await
    }

    /// Load and delete in one step
    ///
    /// The record is removed even when it could not be read.
    async fn take(&self) -> Result<Option<WalkSessionState>> {
        let _guard = self.lock.lock().await;
        let state = Self::load(self.store.as_ref()).await;
        self.store
            .remove(WALK_SESSION_KEY)
            .await
            .context("Failed to remove background session")?;
        state
    }
}

/// Background wakeup handler: applies each batch of fixes to the persisted session
pub struct SessionUpdateHandler {
    record: Arc<SessionRecord>,
    filter: FilterConfig,
}

#[async_trait::async_trait]
impl LocationTaskHandler for SessionUpdateHandler {
    async fn handle(&self, fixes: Vec<Fix>) -> Result<()> {
        if fixes.is_empty() {
            return Ok(());
        }

        let _guard = self.record.lock.lock().await;

        let Some(mut state) = SessionRecord::load(self.record.store.as_ref()).await? else {
            // Stopped while this batch was in flight; nothing to resurrect
            debug!("No active background session, dropping {} fix(es)", fixes.len());
            return Ok(());
        };
        if !state.is_active {
            debug!("Background session inactive, dropping {} fix(es)", fixes.len());
            return Ok(());
        }

        let accepted = state.apply_fixes(&fixes, &self.filter);
        if accepted == 0 {
            debug!("All {} background fix(es) filtered", fixes.len());
            return Ok(());
        }

        SessionRecord::save(self.record.store.as_ref(), &state).await?;

        debug!(
            "Background session updated: {} points, {}",
            state.path.len(),
            format_distance(state.distance)
        );

        Ok(())
    }
}

/// Continues path accumulation while the app is not in the foreground
///
/// The session record lives in durable storage under [`WALK_SESSION_KEY`] so
/// it survives process suspension. The handler is bound to the scheduler once,
/// when the reconciler is created.
pub struct BackgroundReconciler {
    location: Arc<dyn LocationProvider>,
    scheduler: Arc<dyn TaskScheduler>,
    record: Arc<SessionRecord>,
    handler: Arc<SessionUpdateHandler>,
}

impl BackgroundReconciler {
    pub async fn new(
        location: Arc<dyn LocationProvider>,
        scheduler: Arc<dyn TaskScheduler>,
        store: Arc<dyn KeyValueStore>,
        filter: FilterConfig,
    ) -> Result<Self> {
        let record = Arc::new(SessionRecord {
            store,
            lock: Mutex::new(()),
        });
        let handler = Arc::new(SessionUpdateHandler {
            record: Arc::clone(&record),
            filter,
        });

        scheduler
            .register(LOCATION_TASK_NAME, Arc::clone(&handler) as Arc<dyn LocationTaskHandler>)
            .await
            .context("Failed to register background location task")?;

        Ok(Self {
            location,
            scheduler,
            record,
            handler,
        })
    }

    /// The handler the scheduler invokes on each wakeup
    pub fn handler(&self) -> Arc<SessionUpdateHandler> {
        Arc::clone(&self.handler)
    }

    /// Start a fresh background session
    ///
    /// Requires foreground and background permission. Succeeds without
    /// changes if background tracking is already running.
    pub async fn start(&self, options: &TaskOptions) -> Result<(), TrackingError> {
        self.ensure_permissions().await?;

        if self.scheduler.is_registered(LOCATION_TASK_NAME).await {
            info!("Background location task already running");
            return Ok(());
        }

        let state = WalkSessionState::new(Utc::now());
        self.begin(&state, options).await?;

        info!("Background walk session started");
        Ok(())
    }

    /// Take ownership of a session handed off by the foreground
    ///
    /// Replaces any persisted record with `state`.
    pub async fn claim(&self, state: WalkSessionState, options: &TaskOptions) -> Result<(), TrackingError> {
        self.ensure_permissions().await?;

        if self.scheduler.is_registered(LOCATION_TASK_NAME).await {
            warn!("Background location task running during claim, restarting it");
            self.scheduler
                .stop(LOCATION_TASK_NAME)
                .await
                .map_err(TrackingError::Provider)?;
        }

        let points = state.path.len();
        self.begin(&state, options).await?;

        info!("Background reconciler claimed walk session ({} points)", points);
        Ok(())
    }

    /// Stop background tracking and return the final session
    ///
    /// The returned state is marked inactive and the persisted record is
    /// removed. `Ok(None)` if no session was active.
    pub async fn stop(&self) -> Result<Option<WalkSessionState>, TrackingError> {
        let Some(mut state) = self.end().await? else {
            return Ok(None);
        };
        state.close();

        info!(
            "Background walk session stopped: {} points, {}",
            state.path.len(),
            format_distance(state.distance)
        );

        Ok(Some(state))
    }

    /// Stop background tracking and hand the still-active session back to the foreground
    pub async fn release(&self) -> Result<Option<WalkSessionState>, TrackingError> {
        let state = self.end().await?;
        if let Some(state) = &state {
            info!("Background reconciler released walk session ({} points)", state.path.len());
        }
        Ok(state)
    }

    /// Read-only snapshot of the persisted session
    pub async fn current_state(&self) -> Result<Option<WalkSessionState>, TrackingError> {
        self.record.read().await.map_err(TrackingError::Storage)
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.is_registered(LOCATION_TASK_NAME).await
    }

    async fn ensure_permissions(&self) -> Result<(), TrackingError> {
        let foreground = self
            .location
            .request_foreground_permission()
            .await
            .map_err(TrackingError::Provider)?;
        if !foreground.is_granted() {
            error!("Background tracking: foreground permission denied");
            return Err(TrackingError::PermissionDenied(PermissionKind::Foreground));
        }

        let background = self
            .location
            .request_background_permission()
            .await
            .map_err(TrackingError::Provider)?;
        if !background.is_granted() {
            error!("Background tracking: background permission denied");
            return Err(TrackingError::PermissionDenied(PermissionKind::Background));
        }

        Ok(())
    }

    /// Persist `state` and start location updates
    async fn begin(&self, state: &WalkSessionState, options: &TaskOptions) -> Result<(), TrackingError> {
        self.record
            .write(state)
            .await
            .map_err(TrackingError::Storage)?;

        if let Err(e) = self.scheduler.start(LOCATION_TASK_NAME, options).await {
            // Leave no orphaned record behind
            if let Err(cleanup) = self.record.take().await {
                error!("Failed to clean up background session: {:#}", cleanup);
            }
            return Err(TrackingError::Provider(e));
        }

        Ok(())
    }

    /// Deregister updates, then remove and return the persisted record
    async fn end(&self) -> Result<Option<WalkSessionState>, TrackingError> {
        if self.scheduler.is_registered(LOCATION_TASK_NAME).await {
            self.scheduler
                .stop(LOCATION_TASK_NAME)
                .await
                .map_err(TrackingError::Provider)?;
        }

        self.record.take().await.map_err(TrackingError::Storage)
    }
}
