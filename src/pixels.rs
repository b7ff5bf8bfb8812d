//! Channel layouts and 8-bit pixel buffers.

use std::convert::TryFrom;

use crate::types::{Result, SvdImageError};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use itertools::Itertools;
use num::ToPrimitive;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

/// The channel layouts an image plane set may have.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelLayout {
    Gray,
    Rgb,
    Rgba,
}

impl ChannelLayout {
    /// Number of channels
    pub fn channels(self) -> usize {
        match self {
            ChannelLayout::Gray => 1,
            ChannelLayout::Rgb => 3,
            ChannelLayout::Rgba => 4,
        }
    }
}

impl TryFrom<usize> for ChannelLayout {
    type Error = SvdImageError;

    fn try_from(channels: usize) -> Result<Self> {
        match channels {
            1 => Ok(ChannelLayout::Gray),
            3 => Ok(ChannelLayout::Rgb),
            4 => Ok(ChannelLayout::Rgba),
            other => Err(SvdImageError::UnsupportedChannelLayout(other)),
        }
    }
}

/// Convert a floating point sample to a byte.
///
/// The value is clamped to `[0, 255]` and the fractional part is dropped.
pub fn clamp_sample(value: f64) -> u8 {
    // `max` maps NaN to zero.
    value.max(0.0).min(255.0).to_u8().unwrap_or(0)
}

/// An `(height, width, channels)` buffer of 8-bit samples.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    layout: ChannelLayout,
    data: Array3<u8>,
}

impl PixelBuffer {
    /// Wrap an `(height, width, channels)` array.
    pub fn new(data: Array3<u8>) -> Result<Self> {
        let layout = ChannelLayout::try_from(data.len_of(Axis(2)))?;

        Ok(PixelBuffer {
            layout,
            data: data.as_standard_layout().into_owned(),
        })
    }

    /// Stack floating point planes along the channel axis, clamping every
    /// sample into the 8-bit range and truncating it.
    pub fn from_planes(planes: &[Array2<f64>]) -> Result<Self> {
        let layout = ChannelLayout::try_from(planes.len())?;

        if !planes.iter().map(|plane| plane.dim()).all_equal() {
            return Err(SvdImageError::InconsistentPlanes(format!(
                "plane shapes differ: {:?}",
                planes.iter().map(|plane| plane.dim()).collect::<Vec<_>>()
            )));
        }

        let (height, width) = planes[0].dim();
        let data = Array3::from_shape_fn((height, width, layout.channels()), |(row, col, c)| {
            clamp_sample(planes[c][[row, col]])
        });

        Ok(PixelBuffer { layout, data })
    }

    /// Channel layout of the buffer.
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn height(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn width(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    /// View the full `(height, width, channels)` array.
    pub fn view(&self) -> ArrayView3<u8> {
        self.data.view()
    }

    /// View the buffer as a 2-D array if it has a single channel.
    pub fn as_gray(&self) -> Option<ArrayView2<u8>> {
        match self.layout {
            ChannelLayout::Gray => Some(self.data.index_axis(Axis(2), 0)),
            _ => None,
        }
    }

    /// Interleaved samples in row-major order.
    pub fn as_raw(&self) -> &[u8] {
        self.data
            .as_slice()
            .expect("pixel buffers are kept in standard layout")
    }

    /// Convert to an `image` crate buffer for encoding.
    pub fn to_dynamic_image(&self) -> Result<DynamicImage> {
        let (width, height) = (self.width() as u32, self.height() as u32);
        let raw = self.as_raw().to_vec();
        let mismatch = || {
            SvdImageError::InconsistentPlanes(format!(
                "{} samples do not fill a {}x{}x{} image",
                self.data.len(),
                height,
                width,
                self.channels()
            ))
        };

        let image = match self.layout {
            ChannelLayout::Gray => DynamicImage::ImageLuma8(
                GrayImage::from_raw(width, height, raw).ok_or_else(mismatch)?,
            ),
            ChannelLayout::Rgb => DynamicImage::ImageRgb8(
                RgbImage::from_raw(width, height, raw).ok_or_else(mismatch)?,
            ),
            ChannelLayout::Rgba => DynamicImage::ImageRgba8(
                RgbaImage::from_raw(width, height, raw).ok_or_else(mismatch)?,
            ),
        };

        Ok(image)
    }

    /// Convert a decoded image into a buffer, narrowing to 8 bits per sample.
    ///
    /// Luma with alpha is widened to RGBA since only 1, 3 and 4 channel
    /// layouts are supported.
    pub fn from_dynamic_image(image: &DynamicImage) -> Result<Self> {
        let color = image.color();
        let (width, height) = (image.width() as usize, image.height() as usize);

        let (channels, raw) = match (color.channel_count(), color.has_alpha()) {
            (1, _) => (1, image.to_luma8().into_raw()),
            (_, false) => (3, image.to_rgb8().into_raw()),
            (_, true) => (4, image.to_rgba8().into_raw()),
        };

        let data = Array3::from_shape_vec((height, width, channels), raw).map_err(|err| {
            SvdImageError::InconsistentPlanes(format!("decoded image has wrong size: {}", err))
        })?;

        PixelBuffer::new(data)
    }

    /// Split into one floating point plane per channel.
    pub fn to_planes(&self) -> Vec<Array2<f64>> {
        self.data
            .axis_iter(Axis(2))
            .map(|channel| channel.mapv(f64::from))
            .collect()
    }
}
