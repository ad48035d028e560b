use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::geo::Coordinate;

/// Default span of the visible region around a single point, in degrees
pub const DEFAULT_REGION_DELTA: f64 = 0.002;

/// Visible map region: a centre and a span in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl Region {
    /// Region centred on `center` with the default span
    pub fn around(center: Coordinate) -> Self {
        Self {
            latitude: center.latitude,
            longitude: center.longitude,
            latitude_delta: DEFAULT_REGION_DELTA,
            longitude_delta: DEFAULT_REGION_DELTA,
        }
    }

    /// Same span, new centre
    pub fn recentered(&self, center: Coordinate) -> Self {
        Self {
            latitude: center.latitude,
            longitude: center.longitude,
            ..*self
        }
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Image format for captured frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureOptions {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    /// Encoder quality in `0.0..=1.0`
    pub quality: f32,
}

/// Map rendering surface capability
///
/// Platform implementations wrap the native map view.
#[async_trait::async_trait]
pub trait MapSurface: Send + Sync {
    /// Currently visible region, if the map has one
    async fn region(&self) -> Option<Region>;

    /// Set the visible region and wait until it has been rendered
    async fn set_region(&self, region: Region) -> Result<()>;

    /// Show or hide the user-location marker
    async fn set_user_location_visible(&self, visible: bool) -> Result<()>;

    async fn user_location_visible(&self) -> bool;

    /// Capture the current frame to a file
    ///
    /// `Ok(None)` means the surface produced no image.
    async fn capture(&self, options: &CaptureOptions) -> Result<Option<PathBuf>>;
}
