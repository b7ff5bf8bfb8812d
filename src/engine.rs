//! The per-image compression engine.
//!
//! An `ImageEngine` owns the factorized planes of one open image, one plane
//! per channel, together with the most recent reconstruction. Loading
//! factorizes every channel once. Every later rank change derives a new
//! pixel buffer from the stored factors and swaps it in as a whole.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::artifact::{ArtifactKind, RasterFormat};
use crate::container;
use crate::pixels::{ChannelLayout, PixelBuffer};
use crate::plane::PlaneFactorization;
use crate::raster;
use crate::types::{validate_rank, Result, SvdImageError};
use itertools::Itertools;
use log::{debug, info};
use ndarray::Array2;
use std::convert::TryFrom;

/// Fraction of bytes saved by `produced` relative to `original`.
///
/// Returns `None` if the original size is zero.
pub fn compression_ratio(original: u64, produced: u64) -> Option<f64> {
    if original == 0 {
        return None;
    }
    Some(1.0 - produced as f64 / original as f64)
}

/// Compression ratio between two files on disk.
pub fn compression_ratio_of_files(original: &Path, produced: &Path) -> Result<Option<f64>> {
    let original = fs::metadata(original)?.len();
    let produced = fs::metadata(produced)?.len();
    Ok(compression_ratio(original, produced))
}

/// Check the plane set invariants and return its channel layout.
fn check_planes(planes: &[PlaneFactorization]) -> Result<ChannelLayout> {
    let layout = ChannelLayout::try_from(planes.len())?;

    if !planes.iter().map(|plane| plane.shape()).all_equal() {
        return Err(SvdImageError::InconsistentPlanes(format!(
            "plane shapes differ: {:?}",
            planes.iter().map(|plane| plane.shape()).collect::<Vec<_>>()
        )));
    }

    Ok(layout)
}

/// Reconstruct every plane at rank `k` and stack the result into pixels.
///
/// The rank is checked against every plane before any work is done.
pub fn compose_planes(planes: &[PlaneFactorization], k: i64) -> Result<PixelBuffer> {
    check_planes(planes)?;
    let mut kept = 0;
    for plane in planes {
        kept = validate_rank(k, plane.rank())?;
    }

    let start = Instant::now();
    let reconstructed = planes
        .iter()
        .map(|plane| plane.reconstruct(kept))
        .collect::<Result<Vec<Array2<f64>>>>()?;
    let pixels = PixelBuffer::from_planes(&reconstructed)?;

    debug!(
        "composed {} planes at rank {} in {:?}",
        planes.len(),
        kept,
        start.elapsed()
    );

    Ok(pixels)
}

#[derive(Debug, Default)]
pub struct ImageEngine {
    source: Option<PathBuf>,
    planes: Arc<Vec<PlaneFactorization>>,
    pixels: Option<Arc<PixelBuffer>>,
}

impl ImageEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine and load `path` into it.
    pub fn open(path: &Path) -> Result<Self> {
        let mut engine = Self::new();
        engine.load(path)?;
        Ok(engine)
    }

    /// Load a raster image or a factor container, chosen by extension.
    ///
    /// Returns the maximum rank across planes.
    pub fn load(&mut self, path: &Path) -> Result<usize> {
        match ArtifactKind::from_path(path)? {
            ArtifactKind::Container => self.load_from_container(path),
            ArtifactKind::Raster(format) => {
                let bytes = fs::read(path)?;
                let max_rank = self.load_from_raster(&bytes, format)?;
                self.source = Some(path.to_path_buf());
                Ok(max_rank)
            }
        }
    }

    /// Decode raster bytes and factorize every channel.
    ///
    /// On failure the engine keeps its previous state.
    pub fn load_from_raster(&mut self, bytes: &[u8], format: RasterFormat) -> Result<usize> {
        let samples = raster::decode_planes(bytes, format)?;

        let start = Instant::now();
        let planes = samples
            .iter()
            .map(|plane| PlaneFactorization::factorize(plane.view()))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "factorized {} planes of shape {:?} in {:?}",
            planes.len(),
            planes.first().map(|plane| plane.shape()),
            start.elapsed()
        );

        self.install(None, planes)
    }

    /// Restore planes from a container file without factorizing.
    ///
    /// On failure the engine keeps its previous state.
    pub fn load_from_container(&mut self, path: &Path) -> Result<usize> {
        let planes = container::load(path)?;
        self.install(Some(path.to_path_buf()), planes)
    }

    /// Replace the plane set after checking its invariants.
    fn install(&mut self, source: Option<PathBuf>, planes: Vec<PlaneFactorization>) -> Result<usize> {
        check_planes(&planes)?;

        let max_rank = planes.iter().map(|plane| plane.rank()).max().unwrap_or(0);
        self.source = source;
        self.planes = Arc::new(planes);
        self.pixels = None;

        Ok(max_rank)
    }

    /// Identity of the loaded resource, if it came from a file.
    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The factorized planes in channel order.
    pub fn planes(&self) -> &[PlaneFactorization] {
        &self.planes
    }

    /// Shared handle on the planes, for reconstruction off this engine.
    pub fn shared_planes(&self) -> Arc<Vec<PlaneFactorization>> {
        Arc::clone(&self.planes)
    }

    pub fn is_loaded(&self) -> bool {
        !self.planes.is_empty()
    }

    /// Maximum number of singular values across planes.
    pub fn rank(&self) -> usize {
        self.planes.iter().map(|plane| plane.rank()).max().unwrap_or(0)
    }

    /// Channel layout of the loaded image.
    pub fn layout(&self) -> Result<ChannelLayout> {
        if !self.is_loaded() {
            return Err(SvdImageError::NotLoaded);
        }
        check_planes(&self.planes)
    }

    /// Compute the rank `k` pixels without publishing them.
    pub fn compose(&self, k: i64) -> Result<PixelBuffer> {
        if !self.is_loaded() {
            return Err(SvdImageError::NotLoaded);
        }
        compose_planes(&self.planes, k)
    }

    /// Reconstruct the image at rank `k` and make it the current pixels.
    pub fn reconstruct(&mut self, k: i64) -> Result<()> {
        let pixels = self.compose(k)?;
        self.publish(Arc::new(pixels));
        Ok(())
    }

    /// Swap in a new pixel buffer.
    pub fn publish(&mut self, pixels: Arc<PixelBuffer>) {
        self.pixels = Some(pixels);
    }

    /// The most recent reconstruction.
    pub fn current_pixels(&self) -> Option<&PixelBuffer> {
        self.pixels.as_deref()
    }

    /// Shared handle on the most recent reconstruction.
    pub fn shared_pixels(&self) -> Option<Arc<PixelBuffer>> {
        self.pixels.clone()
    }

    /// Encode the current pixels to a raster file.
    pub fn export_raster(&self, path: &Path, format: RasterFormat) -> Result<()> {
        let pixels = self.pixels.as_ref().ok_or(SvdImageError::NoPixels)?;
        raster::encode(pixels, path, format)?;

        info!("exported {}x{} raster to {}", pixels.width(), pixels.height(), path.display());
        Ok(())
    }

    /// Persist the full-rank planes to a container file.
    pub fn export_container(&self, path: &Path) -> Result<()> {
        if !self.is_loaded() {
            return Err(SvdImageError::NotLoaded);
        }
        container::save(&self.planes, path)
    }

    /// Save to a raster file or a container, chosen by extension.
    ///
    /// Returns the compression ratio when both the source and the target are
    /// raster files.
    pub fn save(&self, path: &Path) -> Result<Option<f64>> {
        match ArtifactKind::from_path(path)? {
            ArtifactKind::Container => {
                self.export_container(path)?;
                Ok(None)
            }
            ArtifactKind::Raster(format) => {
                self.export_raster(path, format)?;

                match self.source.as_deref() {
                    Some(source) if !ArtifactKind::from_path(source)?.is_container() => {
                        compression_ratio_of_files(source, path)
                    }
                    _ => Ok(None),
                }
            }
        }
    }
}
