//! Raster image decoding and encoding.

use std::path::Path;

use crate::artifact::{RasterFormat, RasterVariant};
use crate::pixels::{clamp_sample, ChannelLayout, PixelBuffer};
use crate::types::{Result, SvdImageError};
use image::{DynamicImage, ImageError};
use log::{debug, warn};
use ndarray::{Array2, Array3, Axis};

/// Threshold above which a luminance sample becomes white in a bitmap.
const BILEVEL_THRESHOLD: u8 = 128;

/// Maximum value of an 8-bit sample.
const MAX_SAMPLE: f64 = 255.0;

/// Decode raster bytes into one floating point plane per channel.
///
/// Bilevel formats are remapped so that every non-zero sample becomes zero
/// and every zero sample becomes the maximum sample value.
pub fn decode_planes(bytes: &[u8], format: RasterFormat) -> Result<Vec<Array2<f64>>> {
    let image = image::load_from_memory_with_format(bytes, format.format)?;
    let buffer = PixelBuffer::from_dynamic_image(&image)?;

    debug!(
        "decoded {}x{} {:?} raster",
        buffer.height(),
        buffer.width(),
        buffer.layout()
    );

    let mut planes = buffer.to_planes();
    if format.is_bilevel() {
        planes.iter_mut().for_each(invert_bilevel);
    }

    Ok(planes)
}

/// Map non-zero samples to zero and zero samples to the maximum value.
pub fn invert_bilevel(plane: &mut Array2<f64>) {
    plane.mapv_inplace(|value| if value != 0.0 { 0.0 } else { MAX_SAMPLE });
}

/// Collapse a buffer to single channel luminance.
pub fn to_luminance(pixels: &PixelBuffer) -> Result<PixelBuffer> {
    let view = pixels.view();
    let luminance = match pixels.layout() {
        ChannelLayout::Gray => return Ok(pixels.clone()),
        ChannelLayout::Rgb | ChannelLayout::Rgba => view.map_axis(Axis(2), |px| {
            let (r, g, b) = (f64::from(px[0]), f64::from(px[1]), f64::from(px[2]));
            clamp_sample((0.299 * r + 0.587 * g + 0.114 * b).round())
        }),
    };

    PixelBuffer::new(luminance.insert_axis(Axis(2)))
}

/// Collapse a buffer to black and white luminance.
pub fn to_bilevel(pixels: &PixelBuffer) -> Result<PixelBuffer> {
    let gray = to_luminance(pixels)?;
    let data: Array3<u8> = gray
        .view()
        .mapv(|value| if value > BILEVEL_THRESHOLD { 255 } else { 0 });

    PixelBuffer::new(data)
}

/// Encode `pixels` to `path`.
///
/// If the encoder rejects the color mode the image is converted to RGB and
/// encoded once more. A second failure is reported as
/// `EncodingFallbackExhausted`.
pub fn encode(pixels: &PixelBuffer, path: &Path, format: RasterFormat) -> Result<()> {
    let prepared = match format.variant {
        RasterVariant::Standard => pixels.to_dynamic_image()?,
        RasterVariant::Graymap => to_luminance(pixels)?.to_dynamic_image()?,
        RasterVariant::Bilevel => to_bilevel(pixels)?.to_dynamic_image()?,
    };

    match prepared.save_with_format(path, format.format) {
        Ok(()) => Ok(()),
        Err(ImageError::Unsupported(err)) => {
            warn!(
                "{:?} encoder rejected {:?} for {} ({}), retrying as RGB",
                format.format,
                prepared.color(),
                path.display(),
                err
            );

            DynamicImage::ImageRgb8(prepared.to_rgb8())
                .save_with_format(path, format.format)
                .map_err(|source| SvdImageError::EncodingFallbackExhausted {
                    path: path.to_path_buf(),
                    source,
                })
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactKind;
    use image::ImageFormat;
    use ndarray::array;
    use std::io::Cursor;

    fn raster_format(name: &str) -> RasterFormat {
        match ArtifactKind::from_path(Path::new(name)).unwrap() {
            ArtifactKind::Raster(format) => format,
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_invert_bilevel_zero_plane() {
        let mut plane = Array2::<f64>::zeros((3, 4));
        invert_bilevel(&mut plane);

        assert!(plane.iter().all(|&value| value == 255.0));
    }

    #[test]
    fn test_invert_bilevel_mixed_plane() {
        let mut plane = array![[0.0, 1.0], [255.0, 0.0]];
        invert_bilevel(&mut plane);

        assert_eq!(plane, array![[255.0, 0.0], [0.0, 255.0]]);
    }

    #[test]
    fn test_decode_png_planes() {
        let data = Array3::from_shape_fn((4, 6, 3), |(row, col, c)| {
            (row * 40 + col * 5 + c) as u8
        });
        let image = PixelBuffer::new(data.clone())
            .unwrap()
            .to_dynamic_image()
            .unwrap();

        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let planes = decode_planes(&bytes, raster_format("in.png")).unwrap();

        assert_eq!(planes.len(), 3);
        for (c, plane) in planes.iter().enumerate() {
            assert_eq!(plane.dim(), (4, 6));
            assert_eq!(plane, &data.index_axis(Axis(2), c).mapv(f64::from));
        }
    }

    #[test]
    fn test_decode_bitmap_is_inverted() {
        let bytes = b"P1\n3 2\n0 1 0\n1 1 0\n";
        let plain = decode_planes(bytes, raster_format("mask.pgm")).unwrap();
        let inverted = decode_planes(bytes, raster_format("mask.pbm")).unwrap();

        assert_eq!(plain.len(), 1);
        assert_eq!(inverted.len(), 1);
        for (&before, &after) in plain[0].iter().zip(inverted[0].iter()) {
            assert_eq!(after, if before != 0.0 { 0.0 } else { 255.0 });
        }
    }

    #[test]
    fn test_luminance_weights() {
        let rgb = PixelBuffer::new(array![[[255u8, 0, 0], [0, 0, 255]]]).unwrap();
        let gray = to_luminance(&rgb).unwrap();

        assert_eq!(gray.layout(), ChannelLayout::Gray);
        assert_eq!(gray.as_raw(), &[76, 29]);

        let gray_pair = PixelBuffer::new(array![[[200u8, 200, 200], [128, 128, 128]]]).unwrap();
        let bilevel = to_bilevel(&gray_pair).unwrap();
        assert_eq!(bilevel.as_raw(), &[255, 0]);
    }

    #[test]
    fn test_encode_gray_as_qoi_falls_back_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.qoi");

        let data = Array3::from_shape_fn((8, 8, 1), |(row, col, _)| (row * 16 + col * 8) as u8);
        let pixels = PixelBuffer::new(data.clone()).unwrap();

        encode(&pixels, &path, raster_format("gray.qoi")).unwrap();

        let restored = image::open(&path).unwrap();
        assert_eq!(restored.color().channel_count(), 3);
        assert_eq!((restored.width(), restored.height()), (8, 8));

        let rgb = restored.to_rgb8();
        for (px, &value) in rgb.pixels().zip(data.iter()) {
            assert_eq!(px.0, [value, value, value]);
        }
    }

    #[test]
    fn test_encode_fallback_is_attempted_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.ff");

        // Farbfeld only accepts 16-bit RGBA.
        let pixels = PixelBuffer::new(Array3::from_elem((4, 4, 3), 7u8)).unwrap();

        match encode(&pixels, &path, raster_format("rgb.ff")) {
            Err(SvdImageError::EncodingFallbackExhausted { path: failed, source }) => {
                assert_eq!(failed, path);
                assert!(matches!(source, ImageError::Unsupported(_)));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_encode_graymap_from_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.pgm");

        let pixels = PixelBuffer::new(Array3::from_elem((5, 7, 3), 90u8)).unwrap();
        encode(&pixels, &path, raster_format("gray.pgm")).unwrap();

        let restored = image::open(&path).unwrap();
        assert_eq!(restored.color().channel_count(), 1);
        assert!(restored.to_luma8().pixels().all(|px| px.0[0] == 90));
    }
}
