//! Error taxonomy and shared type definitions.

use std::path::PathBuf;

use ndarray_linalg::error::LinalgError;
use thiserror::Error;

pub use ndarray_linalg::Scalar;

#[derive(Error, Debug)]
pub enum SvdImageError {
    #[error("Rank {requested} out of range, {available} singular values available")]
    RankOutOfRange { requested: i64, available: usize },
    #[error("Inconsistent planes: {0}")]
    InconsistentPlanes(String),
    #[error("Unsupported channel layout with {0} channels")]
    UnsupportedChannelLayout(usize),
    #[error("Could not encode {path} even after converting to RGB")]
    EncodingFallbackExhausted {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Malformed container: {0}")]
    ContainerFormat(String),
    #[error("Malformed factors: {0}")]
    MalformedFactors(String),
    #[error("Unsupported file extension for {0}")]
    UnsupportedPath(PathBuf),
    #[error("No image loaded")]
    NotLoaded,
    #[error("No reconstruction available to export")]
    NoPixels,
    #[error("No worker thread is available to recompute")]
    WorkersUnavailable,
    #[error("Lapack Error")]
    LinalgError(#[from] LinalgError),
    #[error("Image codec error")]
    Image(#[from] image::ImageError),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("Container write error")]
    ContainerWrite(#[from] ndarray_npy::WriteNpzError),
    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SvdImageError>;

/// Check that `requested` is a valid number of singular values to keep.
///
/// Valid values lie in `[0, available)`. The argument is signed so that
/// slider arithmetic producing negative values is rejected rather than
/// wrapped.
pub fn validate_rank(requested: i64, available: usize) -> Result<usize> {
    if requested < 0 || requested as u64 >= available as u64 {
        return Err(SvdImageError::RankOutOfRange {
            requested,
            available,
        });
    }
    Ok(requested as usize)
}
