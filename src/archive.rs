//! Walk log archive
//!
//! Completed walks grouped by calendar day (`YYYY-MM-DD`), stored as one JSON
//! record in the key-value store. Newest entries come first within a day.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::platform::KeyValueStore;
use crate::tracking::{Path, WalkSummary};

pub const WALK_LOG_KEY: &str = "@walk-logs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkEntry {
    pub id: String,
    /// Seconds
    pub time: u64,
    /// Kilometers
    pub distance: f64,
    pub path: Path,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_uri: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub ended_at: DateTime<Utc>,
}

impl WalkEntry {
    /// Entry for a summary; blank memos are dropped
    pub fn from_summary(summary: &WalkSummary, memo: Option<&str>, ended_at: DateTime<Utc>) -> Self {
        let memo = memo.map(str::trim).filter(|m| !m.is_empty()).map(String::from);
        Self {
            id: ended_at.to_rfc3339(),
            time: summary.duration,
            distance: summary.distance,
            path: summary.path.clone(),
            snapshot_uri: summary.snapshot_uri.clone(),
            memo,
            ended_at,
        }
    }

    /// Day the entry is filed under
    pub fn date_key(&self) -> String {
        date_key(self.ended_at)
    }
}

pub type WalkLogMap = BTreeMap<String, Vec<WalkEntry>>;

/// Totals for one day
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DayTotals {
    pub time: u64,
    pub distance: f64,
}

pub fn date_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

pub fn day_totals(logs: &WalkLogMap, date_key: &str) -> DayTotals {
    logs.get(date_key)
        .map(|entries| {
            entries.iter().fold(DayTotals::default(), |acc, e| DayTotals {
                time: acc.time + e.time,
                distance: acc.distance + e.distance,
            })
        })
        .unwrap_or_default()
}

/// Day keys, most recent first
pub fn dates_desc(logs: &WalkLogMap) -> Vec<String> {
    logs.keys().rev().cloned().collect()
}

pub struct WalkArchive {
    store: Arc<dyn KeyValueStore>,
    /// Serializes read-modify-write of the log record
    write_lock: Mutex<()>,
}

impl WalkArchive {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Load the whole log; unreadable logs come back empty
    pub async fn load(&self) -> WalkLogMap {
        match self.try_load().await {
            Ok(logs) => logs,
            Err(e) => {
                warn!("Failed to read walk logs: {:#}", e);
                WalkLogMap::new()
            }
        }
    }

    /// File `entry` under `date_key`, ahead of that day's existing entries
    pub async fn add(&self, date_key: &str, entry: WalkEntry) -> Result<WalkLogMap> {
        let _guard = self.write_lock.lock().await;
        let mut logs = self.load().await;

        info!("Archiving walk {} under {}", entry.id, date_key);
        logs.entry(date_key.to_string()).or_default().insert(0, entry);

        self.persist(&logs).await?;
        Ok(logs)
    }

    /// Remove one entry; a day left empty is dropped
    pub async fn remove(&self, date_key: &str, entry_id: &str) -> Result<WalkLogMap> {
        let _guard = self.write_lock.lock().await;
        let mut logs = self.load().await;

        if let Some(entries) = logs.get_mut(date_key) {
            entries.retain(|e| e.id != entry_id);
            if entries.is_empty() {
                logs.remove(date_key);
            }
        }

        self.persist(&logs).await?;
        Ok(logs)
    }

    async fn try_load(&self) -> Result<WalkLogMap> {
        let Some(raw) = self.store.get(WALK_LOG_KEY).await? else {
            return Ok(WalkLogMap::new());
        };
        serde_json::from_str(&raw).context("Failed to parse walk logs")
    }

    async fn persist(&self, logs: &WalkLogMap) -> Result<()> {
        let json = serde_json::to_string(logs)?;
        self.store
            .set(WALK_LOG_KEY, &json)
            .await
            .context("Failed to save walk logs")
    }
}
