//! Frame intake: validating and copying borrowed camera buffers.
//!
//! A [`RawFrame`] is only valid for the duration of the delivery callback,
//! so [`Frame::from_raw`] always copies into an owned RGB buffer.

use image::{Rgb, RgbImage};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    Bgr8,
    Bgra8,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is empty ({width}x{height}, {len} bytes)")]
    Empty { width: u32, height: u32, len: usize },
    #[error("row stride {stride} is shorter than {min} bytes")]
    StrideTooSmall { stride: usize, min: usize },
    #[error("buffer holds {actual} bytes, expected at least {expected}")]
    BufferTooSmall { expected: usize, actual: usize },
}

/// Borrowed pixel buffer as delivered by the camera
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, including any padding
    pub stride: usize,
    pub format: PixelFormat,
    pub data: &'a [u8],
}

impl<'a> RawFrame<'a> {
    /// Tightly packed buffer with no row padding
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            format,
            data,
        }
    }

    pub fn validate(&self) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 || self.data.is_empty() {
            return Err(FrameError::Empty {
                width: self.width,
                height: self.height,
                len: self.data.len(),
            });
        }

        let row_bytes = self.width as usize * self.format.bytes_per_pixel();
        if self.stride < row_bytes {
            return Err(FrameError::StrideTooSmall {
                stride: self.stride,
                min: row_bytes,
            });
        }

        // Last row may omit its padding
        let expected = self.stride * (self.height as usize - 1) + row_bytes;
        if self.data.len() < expected {
            return Err(FrameError::BufferTooSmall {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

/// Owned, immutable color frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Validate and copy a borrowed buffer into RGB order
    pub fn from_raw(raw: &RawFrame<'_>) -> Result<Self, FrameError> {
        raw.validate()?;

        let bpp = raw.format.bytes_per_pixel();
        let image = RgbImage::from_fn(raw.width, raw.height, |x, y| {
            let offset = y as usize * raw.stride + x as usize * bpp;
            let px = &raw.data[offset..offset + bpp];
            match raw.format {
                PixelFormat::Rgb8 | PixelFormat::Rgba8 => Rgb([px[0], px[1], px[2]]),
                PixelFormat::Bgr8 | PixelFormat::Bgra8 => Rgb([px[2], px[1], px[0]]),
                PixelFormat::Gray8 => Rgb([px[0], px[0], px[0]]),
            }
        });
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Self::new(image)
    }
}
