use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::location::{Fix, LocationProvider, UpdateOptions};

/// Upper bound on fixes delivered in one wakeup
const MAX_BATCH: usize = 32;

/// Options for a background location task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOptions {
    pub updates: UpdateOptions,
    /// Title of the persistent notification some platforms require
    pub notification_title: String,
    pub notification_body: String,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            updates: UpdateOptions::default(),
            notification_title: "Dog Walk Active".to_string(),
            notification_body: "Tracking your walk...".to_string(),
        }
    }
}

/// Handler invoked on each background wakeup with the batch of fixes
/// delivered since the previous one
#[async_trait::async_trait]
pub trait LocationTaskHandler: Send + Sync {
    async fn handle(&self, fixes: Vec<Fix>) -> Result<()>;
}

/// Task-scheduling capability
///
/// A handler is bound to a name once at process start with `register`.
/// `start` begins delivering location updates to it, `stop` ends delivery,
/// and `is_registered` reports whether updates are currently being delivered.
#[async_trait::async_trait]
pub trait TaskScheduler: Send + Sync {
    async fn register(&self, name: &str, handler: Arc<dyn LocationTaskHandler>) -> Result<()>;

    async fn start(&self, name: &str, options: &TaskOptions) -> Result<()>;

    /// Stop delivery; stopping a task that is not running is a no-op
    async fn stop(&self, name: &str) -> Result<()>;

    async fn is_registered(&self, name: &str) -> bool;
}

/// Scheduler that runs background tasks on the tokio runtime
///
/// Each started task owns a location subscription and invokes its handler
/// sequentially, one batch at a time, in arrival order.
pub struct InProcessScheduler {
    location: Arc<dyn LocationProvider>,
    handlers: Mutex<HashMap<String, Arc<dyn LocationTaskHandler>>>,
    running: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl InProcessScheduler {
    pub fn new(location: Arc<dyn LocationProvider>) -> Self {
        Self {
            location,
            handlers: Mutex::new(HashMap::new()),
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Drain whatever else is already queued behind `first`
    fn collect_batch(first: Fix, rx: &mut mpsc::Receiver<Fix>) -> Vec<Fix> {
        let mut batch = vec![first];
        while batch.len() < MAX_BATCH {
            match rx.try_recv() {
                Ok(fix) => batch.push(fix),
                Err(_) => break,
            }
        }
        batch
    }
}

#[async_trait::async_trait]
impl TaskScheduler for InProcessScheduler {
    async fn register(&self, name: &str, handler: Arc<dyn LocationTaskHandler>) -> Result<()> {
        let mut handlers = self.handlers.lock().await;
        if handlers.insert(name.to_string(), handler).is_some() {
            warn!("Task {} was already defined, replacing handler", name);
        }
        Ok(())
    }

    async fn start(&self, name: &str, options: &TaskOptions) -> Result<()> {
        let handler = match self.handlers.lock().await.get(name) {
            Some(handler) => Arc::clone(handler),
            None => bail!("Task {} has not been registered", name),
        };

        let mut running = self.running.lock().await;
        if running.get(name).is_some_and(|task| !task.is_finished()) {
            warn!("Task {} already running", name);
            return Ok(());
        }

        let mut rx = self
            .location
            .watch_position(options.updates.clone())
            .await
            .with_context(|| format!("Failed to start location updates for {}", name))?;

        let task_name = name.to_string();
        let task = tokio::spawn(async move {
            info!("Background task {} started", task_name);

            while let Some(first) = rx.recv().await {
                let batch = Self::collect_batch(first, &mut rx);
                if let Err(e) = handler.handle(batch).await {
                    error!("Background task {} failed: {:#}", task_name, e);
                }
            }

            info!("Background task {} stopped", task_name);
        });

        running.insert(name.to_string(), task);

        info!(
            "Location updates started for {} via {} ({})",
            name,
            self.location.name(),
            options.notification_title
        );

        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        let task = self.running.lock().await.remove(name);
        if let Some(task) = task {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!("Background task {} panicked: {}", name, e);
                }
            }
            info!("Location updates stopped for {}", name);
        }
        Ok(())
    }

    async fn is_registered(&self, name: &str) -> bool {
        self.running
            .lock()
            .await
            .get(name)
            .is_some_and(|task| !task.is_finished())
    }
}
