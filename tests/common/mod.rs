use std::path::{Path, PathBuf};

use ndarray::Array3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use svd_image_compression::{random_image, PixelBuffer};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Write `data` as a PNG file named `name` inside `dir`.
pub fn write_png(dir: &Path, name: &str, data: Array3<u8>) -> PathBuf {
    let path = dir.join(name);
    PixelBuffer::new(data)
        .unwrap()
        .to_dynamic_image()
        .unwrap()
        .save_with_format(&path, image::ImageFormat::Png)
        .unwrap();
    path
}

/// A reproducible gradient image with noise.
pub fn noisy_image(dimension: (usize, usize, usize), seed: u64) -> Array3<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    random_image(dimension, 40.0, &mut rng)
}
