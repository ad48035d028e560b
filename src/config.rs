use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::platform::{Accuracy, UpdateOptions};
use crate::tracking::FilterConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the file-backed key-value store
    pub data_dir: PathBuf,
}

/// Tracking parameters shared by the foreground and background channels
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Fixes reporting a larger uncertainty (meters) are discarded
    pub max_accuracy_m: f64,
    /// Minimum movement (kilometers) before a fix extends the path
    pub min_movement_km: f64,
    /// Elapsed-time clock resolution
    pub clock_interval_ms: u64,
    /// Requested interval between location updates
    pub update_interval_ms: u64,
    /// Requested minimum movement between location updates (meters)
    pub distance_interval_m: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_accuracy_m: 50.0,
            min_movement_km: 0.001,
            clock_interval_ms: 1000,
            update_interval_ms: 2000,
            distance_interval_m: 1.0,
        }
    }
}

impl TrackingConfig {
    pub fn filter(&self) -> FilterConfig {
        FilterConfig {
            max_accuracy_m: self.max_accuracy_m,
            min_movement_km: self.min_movement_km,
        }
    }

    pub fn clock_interval(&self) -> Duration {
        Duration::from_millis(self.clock_interval_ms.max(1))
    }

    pub fn update_options(&self, accuracy: Accuracy) -> UpdateOptions {
        UpdateOptions {
            accuracy,
            time_interval_ms: self.update_interval_ms,
            distance_interval_m: self.distance_interval_m,
        }
    }
}

impl Config {
    /// Load from a file (extension optional) with `WALK_TRACKER__*` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("WALK_TRACKER").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
