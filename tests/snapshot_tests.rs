// Integration tests for map snapshot capture
//
// A fake map surface records every change made to it so the tests can check
// the view is framed for the capture and restored afterwards.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;
use walk_tracker::geo::Coordinate;
use walk_tracker::platform::{
    CaptureOptions, ChannelLocationProvider, Fix, ImageFormat, MapSurface, Region,
};
use walk_tracker::snapshot::{bounding_region, REGION_PADDING_FACTOR};
use walk_tracker::{Snapshot, SnapshotCapture, SnapshotConfig, TrackingConfig, WalkSession};

#[derive(Default)]
struct MapState {
    region: Option<Region>,
    marker_visible: bool,
    regions_set: Vec<Region>,
    marker_during_capture: Option<bool>,
    region_during_capture: Option<Region>,
    last_options: Option<CaptureOptions>,
    captures: usize,
}

enum CaptureMode {
    WriteFile(PathBuf),
    Nothing,
    Fail,
}

struct FakeMap {
    state: Mutex<MapState>,
    mode: CaptureMode,
}

impl FakeMap {
    fn new(mode: CaptureMode) -> Self {
        Self {
            state: Mutex::new(MapState {
                region: Some(Region::around(Coordinate::new(10.0, 20.0))),
                marker_visible: true,
                ..MapState::default()
            }),
            mode,
        }
    }
}

#[async_trait::async_trait]
impl MapSurface for FakeMap {
    async fn region(&self) -> Option<Region> {
        self.state.lock().await.region
    }

    async fn set_region(&self, region: Region) -> Result<()> {
        let mut state = self.state.lock().await;
        state.region = Some(region);
        state.regions_set.push(region);
        Ok(())
    }

    async fn set_user_location_visible(&self, visible: bool) -> Result<()> {
        self.state.lock().await.marker_visible = visible;
        Ok(())
    }

    async fn user_location_visible(&self) -> bool {
        self.state.lock().await.marker_visible
    }

    async fn capture(&self, options: &CaptureOptions) -> Result<Option<PathBuf>> {
        let mut state = self.state.lock().await;
        state.captures += 1;
        state.marker_during_capture = Some(state.marker_visible);
        state.region_during_capture = state.region;
        state.last_options = Some(options.clone());

        match &self.mode {
            CaptureMode::WriteFile(dir) => {
                let file = dir.join(format!("frame.{}", options.format.extension()));
                tokio::fs::write(&file, b"png").await?;
                Ok(Some(file))
            }
            CaptureMode::Nothing => Ok(None),
            CaptureMode::Fail => bail!("renderer unavailable"),
        }
    }
}

fn walked_path() -> Vec<Coordinate> {
    vec![
        Coordinate::new(37.500, 127.000),
        Coordinate::new(37.505, 127.002),
        Coordinate::new(37.510, 127.004),
    ]
}

#[tokio::test]
async fn test_capture_frames_path_and_restores_view() -> Result<()> {
    let scratch = TempDir::new()?;
    let map = Arc::new(FakeMap::new(CaptureMode::WriteFile(scratch.path().to_path_buf())));
    let capture = SnapshotCapture::new(map.clone(), SnapshotConfig::default());

    let path = walked_path();
    let snapshot = capture.capture(&path).await;

    assert!(snapshot.is_captured());

    let state = map.state.lock().await;
    let framed = state.region_during_capture.expect("region at capture");
    assert_eq!(Some(framed), bounding_region(&path));
    assert!((framed.latitude - 37.505).abs() < 1e-9);
    assert!((framed.latitude_delta - 0.010 * REGION_PADDING_FACTOR).abs() < 1e-9);

    // Marker hidden for the capture, back afterwards
    assert_eq!(state.marker_during_capture, Some(false));
    assert!(state.marker_visible);

    // Previous region restored
    assert_eq!(state.region, Some(Region::around(Coordinate::new(10.0, 20.0))));
    Ok(())
}

#[tokio::test]
async fn test_capture_moves_file_into_snapshot_directory() -> Result<()> {
    let scratch = TempDir::new()?;
    let kept = TempDir::new()?;
    let map = Arc::new(FakeMap::new(CaptureMode::WriteFile(scratch.path().to_path_buf())));
    let config = SnapshotConfig {
        directory: Some(kept.path().join("snapshots")),
        ..SnapshotConfig::default()
    };
    let capture = SnapshotCapture::new(map, config);

    let Snapshot::Captured(file) = capture.capture(&walked_path()).await else {
        panic!("expected a captured snapshot");
    };

    assert!(file.starts_with(kept.path().join("snapshots")));
    let name = file.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("walk-") && name.ends_with(".png"), "unexpected name {}", name);
    assert!(tokio::fs::try_exists(&file).await?);
    assert!(!tokio::fs::try_exists(scratch.path().join("frame.png")).await?);
    Ok(())
}

#[tokio::test]
async fn test_capture_uses_configured_format() -> Result<()> {
    let scratch = TempDir::new()?;
    let kept = TempDir::new()?;
    let map = Arc::new(FakeMap::new(CaptureMode::WriteFile(scratch.path().to_path_buf())));
    let config = SnapshotConfig {
        directory: Some(kept.path().to_path_buf()),
        width: 800,
        height: 400,
        format: ImageFormat::Jpg,
        quality: 0.7,
    };
    let capture = SnapshotCapture::new(map.clone(), config);

    let Snapshot::Captured(file) = capture.capture(&walked_path()).await else {
        panic!("expected a captured snapshot");
    };
    assert_eq!(file.extension().and_then(|e| e.to_str()), Some("jpg"));

    let state = map.state.lock().await;
    let options = state.last_options.clone().expect("capture options");
    assert_eq!(options.format, ImageFormat::Jpg);
    assert_eq!((options.width, options.height), (800, 400));
    assert_eq!(options.quality, 0.7);
    Ok(())
}

#[tokio::test]
async fn test_failed_capture_is_absent_and_view_restored() -> Result<()> {
    let map = Arc::new(FakeMap::new(CaptureMode::Fail));
    let capture = SnapshotCapture::new(map.clone(), SnapshotConfig::default());

    assert_eq!(capture.capture(&walked_path()).await, Snapshot::Absent);

    let state = map.state.lock().await;
    assert_eq!(state.captures, 1);
    assert!(state.marker_visible);
    assert_eq!(state.region, Some(Region::around(Coordinate::new(10.0, 20.0))));
    Ok(())
}

#[tokio::test]
async fn test_surface_without_image_is_absent() -> Result<()> {
    let map = Arc::new(FakeMap::new(CaptureMode::Nothing));
    let capture = SnapshotCapture::new(map, SnapshotConfig::default());

    assert_eq!(capture.capture(&walked_path()).await, Snapshot::Absent);
    Ok(())
}

#[tokio::test]
async fn test_empty_path_leaves_region_alone() -> Result<()> {
    let map = Arc::new(FakeMap::new(CaptureMode::Nothing));
    let capture = SnapshotCapture::new(map.clone(), SnapshotConfig::default());

    capture.capture(&[]).await;

    let state = map.state.lock().await;
    assert!(state.regions_set.is_empty());
    assert_eq!(state.captures, 1);
    Ok(())
}

#[tokio::test]
async fn test_stopped_walk_carries_snapshot() -> Result<()> {
    let scratch = TempDir::new()?;
    let map = Arc::new(FakeMap::new(CaptureMode::WriteFile(scratch.path().to_path_buf())));

    let location = Arc::new(ChannelLocationProvider::granted());
    location.set_position(Fix::at(37.5, 127.0, Some(5.0))).await;

    let session = WalkSession::new(location, TrackingConfig::default())
        .with_snapshot(SnapshotCapture::new(map, SnapshotConfig::default()));
    session.start().await?;
    session.submit_fix(Fix::at(37.501, 127.0, Some(5.0))).await?;

    let summary = session.stop().await?;
    assert_eq!(summary.snapshot_uri, Some(scratch.path().join("frame.png")));
    Ok(())
}

#[tokio::test]
async fn test_failed_snapshot_does_not_block_summary() -> Result<()> {
    let map = Arc::new(FakeMap::new(CaptureMode::Fail));

    let location = Arc::new(ChannelLocationProvider::granted());
    location.set_position(Fix::at(37.5, 127.0, Some(5.0))).await;

    let session = WalkSession::new(location, TrackingConfig::default())
        .with_snapshot(SnapshotCapture::new(map, SnapshotConfig::default()));
    session.start().await?;

    let summary = session.stop().await?;
    assert!(summary.snapshot_uri.is_none());
    assert_eq!(summary.path.len(), 1);
    Ok(())
}
