use crate::archive::WalkArchive;
use crate::config::TrackingConfig;
use crate::tracking::WalkSession;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active walk sessions (walk_id → session)
    pub sessions: Arc<RwLock<HashMap<String, Arc<WalkSession>>>>,

    /// Archive completed walks are filed into
    pub archive: Arc<WalkArchive>,

    pub tracking: TrackingConfig,
}

impl AppState {
    pub fn new(archive: Arc<WalkArchive>, tracking: TrackingConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            archive,
            tracking,
        }
    }
}
