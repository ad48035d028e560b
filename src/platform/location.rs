use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::geo::Coordinate;

/// A single reported position sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub coordinate: Coordinate,
    /// Radius of uncertainty in meters, if the provider reports one
    pub accuracy_m: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    pub fn new(coordinate: Coordinate, accuracy_m: Option<f64>) -> Self {
        Self {
            coordinate,
            accuracy_m,
            timestamp: Utc::now(),
        }
    }

    pub fn at(latitude: f64, longitude: f64, accuracy_m: Option<f64>) -> Self {
        Self::new(Coordinate::new(latitude, longitude), accuracy_m)
    }
}

/// Outcome of a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        self == PermissionStatus::Granted
    }
}

/// Requested accuracy class for position fixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accuracy {
    Balanced,
    High,
    Highest,
    BestForNavigation,
}

/// Options for a continuous location subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOptions {
    pub accuracy: Accuracy,
    /// Minimum time between updates in milliseconds
    pub time_interval_ms: u64,
    /// Minimum movement between updates in meters
    pub distance_interval_m: f64,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            accuracy: Accuracy::BestForNavigation,
            time_interval_ms: 2000,
            distance_interval_m: 1.0,
        }
    }
}

/// Location provider capability
///
/// Implementations wrap the platform positioning service. The tracking code
/// only needs permission queries, a one-shot fix and a subscription stream.
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync {
    /// Request permission to read location while the app is in use
    async fn request_foreground_permission(&self) -> Result<PermissionStatus>;

    /// Request permission to read location while the app is backgrounded
    async fn request_background_permission(&self) -> Result<PermissionStatus>;

    /// Obtain a single fix
    async fn current_position(&self, accuracy: Accuracy) -> Result<Fix>;

    /// Subscribe to a stream of fixes
    ///
    /// The subscription ends when the returned receiver is dropped.
    async fn watch_position(&self, options: UpdateOptions) -> Result<mpsc::Receiver<Fix>>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Location provider fed by pushed fixes
///
/// Used where positions come from outside the process (the HTTP surface) and
/// as the fix source double in tests. Every live subscriber receives each
/// pushed fix in push order.
pub struct ChannelLocationProvider {
    foreground: PermissionStatus,
    background: PermissionStatus,
    last_fix: Mutex<Option<Fix>>,
    subscribers: Mutex<Vec<mpsc::Sender<Fix>>>,
}

impl ChannelLocationProvider {
    pub fn new(foreground: PermissionStatus, background: PermissionStatus) -> Self {
        Self {
            foreground,
            background,
            last_fix: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Provider with every permission granted
    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted, PermissionStatus::Granted)
    }

    /// Set the position returned by `current_position` without notifying subscribers
    pub async fn set_position(&self, fix: Fix) {
        *self.last_fix.lock().await = Some(fix);
    }

    /// Deliver a fix to every live subscriber
    ///
    /// Returns the number of subscribers that received it.
    pub async fn push(&self, fix: Fix) -> usize {
        self.set_position(fix).await;

        let senders: Vec<mpsc::Sender<Fix>> = {
            let mut subscribers = self.subscribers.lock().await;
            subscribers.retain(|tx| !tx.is_closed());
            subscribers.clone()
        };

        let mut delivered = 0;
        for tx in senders {
            if tx.send(fix).await.is_ok() {
                delivered += 1;
            }
        }

        debug!(
            "Pushed fix ({:.6}, {:.6}) to {} subscriber(s)",
            fix.coordinate.latitude, fix.coordinate.longitude, delivered
        );

        delivered
    }

    /// Number of subscriptions that are still open
    pub async fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

#[async_trait::async_trait]
impl LocationProvider for ChannelLocationProvider {
    async fn request_foreground_permission(&self) -> Result<PermissionStatus> {
        Ok(self.foreground)
    }

    async fn request_background_permission(&self) -> Result<PermissionStatus> {
        Ok(self.background)
    }

    async fn current_position(&self, _accuracy: Accuracy) -> Result<Fix> {
        let fix = *self.last_fix.lock().await;
        fix.context("No position fix available yet")
    }

    async fn watch_position(&self, options: UpdateOptions) -> Result<mpsc::Receiver<Fix>> {
        let (tx, rx) = mpsc::channel(64);
        self.subscribers.lock().await.push(tx);

        info!(
            "Location subscription opened ({:?}, every {}ms / {}m)",
            options.accuracy, options.time_interval_ms, options.distance_interval_m
        );

        Ok(rx)
    }

    fn name(&self) -> &str {
        "channel"
    }
}
