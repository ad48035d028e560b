//! Platform capabilities the tracking core depends on
//!
//! Each capability is a trait so the core can run against native services,
//! the in-process implementations here, or test doubles:
//! - Location: permissions, one-shot fixes, fix subscriptions
//! - Storage: durable string key-value records
//! - Tasks: named background location tasks
//! - Map: visible region control and frame capture

pub mod location;
pub mod map;
pub mod simulated;
pub mod storage;
pub mod tasks;

pub use location::{
    Accuracy, ChannelLocationProvider, Fix, LocationProvider, PermissionStatus, UpdateOptions,
};
pub use map::{CaptureOptions, ImageFormat, MapSurface, Region, DEFAULT_REGION_DELTA};
pub use simulated::SimulatedWalk;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use tasks::{InProcessScheduler, LocationTaskHandler, TaskOptions, TaskScheduler};
