//! Low rank image compression.
//!
//! Every color plane of an image is factorized once with a singular value
//! decomposition. Approximations at any rank are then rebuilt from the stored
//! factors without factorizing again. The factors can be persisted to and
//! restored from a container file, and rank changes can be recomputed in the
//! background with only the latest request becoming visible.

pub mod artifact;
pub mod compute_svd;
pub mod config;
pub mod container;
pub mod coordinator;
pub mod engine;
pub mod helpers;
pub mod pixels;
pub mod plane;
pub mod random_matrix;
pub mod raster;
pub mod types;

pub use artifact::{ArtifactKind, RasterFormat, RasterVariant, CONTAINER_EXTENSION};
pub use compute_svd::{ComputeSVD, SVDData};
pub use config::CoordinatorConfig;
pub use coordinator::{Completion, RecomputeCoordinator};
pub use engine::{compression_ratio, compression_ratio_of_files, ImageEngine};
pub use helpers::RelDiff;
pub use pixels::{ChannelLayout, PixelBuffer};
pub use plane::PlaneFactorization;
pub use random_matrix::{random_image, RandomMatrix};
pub use types::{validate_rank, Result, SvdImageError};
