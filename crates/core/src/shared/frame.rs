use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("frame buffer holds {actual} bytes, expected {expected} for {width}x{height} RGB")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// A single video frame: packed row-major RGB bytes, 8 bits per channel.
///
/// Lives for exactly one request. Construction validates that the buffer
/// matches the declared dimensions so downstream stages never re-check.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyDimensions { width, height });
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(Self::CHANNELS))
            .unwrap_or(usize::MAX);
        let actual = data.len();
        if actual != expected {
            return Err(FrameError::LengthMismatch {
                width,
                height,
                expected,
                actual,
            });
        }
        RgbImage::from_raw(width, height, data)
            .map(|image| Self { image })
            .ok_or(FrameError::LengthMismatch {
                width,
                height,
                expected,
                actual,
            })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The frame as an `(height, width, 3)` pixel grid.
    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }
}
