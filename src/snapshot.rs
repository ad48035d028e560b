//! Map snapshot capture
//!
//! Frames the walked path on a [`MapSurface`], captures it as an image and
//! puts the view back the way it was. A missing snapshot is a normal outcome,
//! so capture never fails: it yields [`Snapshot::Absent`] and logs a warning.

use anyhow::{Context, Result};
use chrono::Utc;
use geo::{BoundingRect, Coord, LineString};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::geo::Coordinate;
use crate::platform::{CaptureOptions, ImageFormat, MapSurface, Region, DEFAULT_REGION_DELTA};

/// Span added around the path when framing it
pub const REGION_PADDING_FACTOR: f64 = 1.05;

/// Smallest span used when framing, so a single point or a straight line
/// still yields a usable region
pub const MIN_REGION_DELTA: f64 = DEFAULT_REGION_DELTA;

/// Result of a capture attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Captured(PathBuf),
    Absent,
}

impl Snapshot {
    pub fn into_option(self) -> Option<PathBuf> {
        match self {
            Snapshot::Captured(path) => Some(path),
            Snapshot::Absent => None,
        }
    }

    pub fn is_captured(&self) -> bool {
        matches!(self, Snapshot::Captured(_))
    }
}

/// Region covering every point, padded and floored to a minimum span
///
/// Returns `None` for an empty path.
pub fn bounding_region(points: &[Coordinate]) -> Option<Region> {
    let line: LineString<f64> = points
        .iter()
        .map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect();
    let rect = line.bounding_rect()?;

    let (min, max) = (rect.min(), rect.max());
    Some(Region {
        latitude: (min.y + max.y) / 2.0,
        longitude: (min.x + max.x) / 2.0,
        latitude_delta: ((max.y - min.y) * REGION_PADDING_FACTOR).max(MIN_REGION_DELTA),
        longitude_delta: ((max.x - min.x) * REGION_PADDING_FACTOR).max(MIN_REGION_DELTA),
    })
}

/// Snapshot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Where captured images are kept; `None` leaves them where the surface wrote them
    pub directory: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    /// Encoder quality in `0.0..=1.0`; ignored for PNG
    pub quality: f32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            directory: None,
            width: 600,
            height: 600,
            format: ImageFormat::Png,
            quality: 0.9,
        }
    }
}

pub struct SnapshotCapture {
    map: Arc<dyn MapSurface>,
    config: SnapshotConfig,
}

impl SnapshotCapture {
    pub fn new(map: Arc<dyn MapSurface>, config: SnapshotConfig) -> Self {
        Self { map, config }
    }

    /// Capture the map framed around `path`
    pub async fn capture(&self, path: &[Coordinate]) -> Snapshot {
        let restore_marker = self.map.user_location_visible().await;
        let previous_region = self.map.region().await;

        let result = self.capture_framed(path, restore_marker).await;

        // Restore the view whatever happened above
        if restore_marker {
            if let Err(e) = self.map.set_user_location_visible(true).await {
                warn!("Failed to restore user location marker: {:#}", e);
            }
        }
        if !path.is_empty() {
            if let Some(region) = previous_region {
                if let Err(e) = self.map.set_region(region).await {
                    warn!("Failed to restore map region: {:#}", e);
                }
            }
        }

        match result {
            Ok(Some(file)) => {
                info!("Captured map snapshot: {}", file.display());
                Snapshot::Captured(file)
            }
            Ok(None) => {
                warn!("Map surface produced no snapshot");
                Snapshot::Absent
            }
            Err(e) => {
                warn!("Failed to capture map snapshot: {:#}", e);
                Snapshot::Absent
            }
        }
    }

    async fn capture_framed(&self, path: &[Coordinate], hide_marker: bool) -> Result<Option<PathBuf>> {
        if hide_marker {
            self.map
                .set_user_location_visible(false)
                .await
                .context("Failed to hide user location marker")?;
        }

        if let Some(region) = bounding_region(path) {
            self.map
                .set_region(region)
                .await
                .context("Failed to frame path")?;
        }

        let options = CaptureOptions {
            width: self.config.width,
            height: self.config.height,
            format: self.config.format,
            quality: self.config.quality,
        };

        let Some(captured) = self.map.capture(&options).await? else {
            return Ok(None);
        };

        Ok(Some(self.keep(captured, options.format.extension()).await))
    }

    /// Move a captured file into the snapshot directory
    ///
    /// Falls back to the original location if the directory is unusable.
    async fn keep(&self, captured: PathBuf, extension: &str) -> PathBuf {
        let Some(dir) = &self.config.directory else {
            return captured;
        };

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("Failed to prepare snapshot directory {}: {}", dir.display(), e);
            return captured;
        }

        let destination = dir.join(format!(
            "walk-{}.{}",
            Utc::now().timestamp_millis(),
            extension
        ));

        match move_file(&captured, &destination).await {
            Ok(()) => destination,
            Err(e) => {
                warn!("Failed to move snapshot into {}: {:#}", dir.display(), e);
                captured
            }
        }
    }
}

async fn move_file(from: &std::path::Path, to: &std::path::Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    // Rename fails across filesystems
    tokio::fs::copy(from, to)
        .await
        .with_context(|| format!("Failed to copy {}", from.display()))?;
    tokio::fs::remove_file(from)
        .await
        .with_context(|| format!("Failed to remove {}", from.display()))?;
    Ok(())
}
