//! Fixed-size thumbnail variants for image blobs.

use crate::constants::DEFAULT_THUMBNAIL_BOUNDS;
use crate::FilesResult;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::str::FromStr;

/// Thumbnail size classes. Each is stored under `<id>-<suffix>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailSize {
    Small,
    Medium,
    Large,
}

impl ThumbnailSize {
    pub const ALL: [ThumbnailSize; 3] = [Self::Small, Self::Medium, Self::Large];

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl std::fmt::Display for ThumbnailSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for ThumbnailSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            other => Err(format!("unknown thumbnail size '{}'", other)),
        }
    }
}

/// Bounding box (in pixels) of each size class.
///
/// Thumbnails keep the source aspect ratio and fit inside a `bound x bound` square.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSpec {
    pub small: u32,
    pub medium: u32,
    pub large: u32,
}

impl Default for ThumbnailSpec {
    fn default() -> Self {
        let [small, medium, large] = DEFAULT_THUMBNAIL_BOUNDS;
        Self {
            small,
            medium,
            large,
        }
    }
}

impl ThumbnailSpec {
    pub fn bound(&self, size: ThumbnailSize) -> u32 {
        match size {
            ThumbnailSize::Small => self.small,
            ThumbnailSize::Medium => self.medium,
            ThumbnailSize::Large => self.large,
        }
    }

    /// Decodes `bytes` once and renders every size class as PNG.
    pub(crate) fn render(&self, bytes: &[u8]) -> FilesResult<Vec<(ThumbnailSize, Vec<u8>)>> {
        let source = image::load_from_memory(bytes)?;

        ThumbnailSize::ALL
            .iter()
            .map(|size| {
                let bound = self.bound(*size).max(1);
                let scaled = source.thumbnail(bound, bound);
                let mut encoded = Cursor::new(Vec::new());
                scaled.write_to(&mut encoded, ImageFormat::Png)?;
                Ok((*size, encoded.into_inner()))
            })
            .collect()
    }
}
