//! Classification of paths into raster images and factor containers.
//!
//! The decision is made from the extension alone, once, at the API
//! boundary. File contents are never sniffed.

use std::path::Path;

use crate::types::{Result, SvdImageError};
use image::ImageFormat;

/// Extension of archives holding raw factor matrices.
pub const CONTAINER_EXTENSION: &str = "npz";

/// What a raster target or source needs beyond its codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RasterVariant {
    /// Plain raster image.
    Standard,
    /// Portable graymap, written as single channel luminance.
    Graymap,
    /// Portable bitmap, inverted on load and thresholded on save.
    Bilevel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterFormat {
    pub format: ImageFormat,
    pub variant: RasterVariant,
}

impl RasterFormat {
    /// Determine the raster format from a lowercase extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let format = ImageFormat::from_extension(extension)?;
        let variant = match extension {
            "pbm" => RasterVariant::Bilevel,
            "pgm" => RasterVariant::Graymap,
            _ => RasterVariant::Standard,
        };

        Some(RasterFormat { format, variant })
    }

    /// Whether decoded samples follow the inverted bilevel convention.
    pub fn is_bilevel(&self) -> bool {
        self.variant == RasterVariant::Bilevel
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    Raster(RasterFormat),
    Container,
}

impl ArtifactKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .ok_or_else(|| SvdImageError::UnsupportedPath(path.to_path_buf()))?;

        if extension == CONTAINER_EXTENSION {
            return Ok(ArtifactKind::Container);
        }

        RasterFormat::from_extension(&extension)
            .map(ArtifactKind::Raster)
            .ok_or_else(|| SvdImageError::UnsupportedPath(path.to_path_buf()))
    }

    pub fn is_container(&self) -> bool {
        matches!(self, ArtifactKind::Container)
    }
}
