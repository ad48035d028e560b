pub mod archive;
pub mod config;
pub mod error;
pub mod format;
pub mod geo;
pub mod http;
pub mod platform;
pub mod snapshot;
pub mod tracking;

pub use archive::{WalkArchive, WalkEntry, WalkLogMap};
pub use config::{Config, TrackingConfig};
pub use error::{PermissionKind, TrackingError};
pub use geo::{haversine_km, Coordinate};
pub use http::{create_router, AppState};
pub use platform::{
    ChannelLocationProvider, FileStore, Fix, InProcessScheduler, KeyValueStore, LocationProvider,
    MapSurface, MemoryStore, PermissionStatus, Region, SimulatedWalk, TaskOptions, TaskScheduler,
};
pub use snapshot::{Snapshot, SnapshotCapture, SnapshotConfig};
pub use tracking::{
    BackgroundReconciler, FilterConfig, FixOutcome, SessionPhase, WalkSession, WalkSessionState,
    WalkSummary,
};
