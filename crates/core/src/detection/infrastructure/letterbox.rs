use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::{Array3, Array4, Axis};

use crate::shared::constants::LETTERBOX_PAD_VALUE;
use crate::shared::frame::Frame;

use super::yolo_decoder::DecodeError;

/// Placement of the resized content inside the square canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LetterboxLayout {
    pub scale: f64,
    pub new_width: u32,
    pub new_height: u32,
    pub pad_left: u32,
    pub pad_top: u32,
}

impl LetterboxLayout {
    /// `scale = min(target/height, target/width)`, content centered.
    ///
    /// Scaled sides are truncated to whole pixels and kept at least one pixel
    /// wide so extreme aspect ratios still produce a valid image.
    pub fn compute(width: u32, height: u32, target_size: u32) -> Self {
        let target = target_size as f64;
        let scale = (target / height as f64).min(target / width as f64);
        let new_width = ((width as f64 * scale) as u32).clamp(1, target_size);
        let new_height = ((height as f64 * scale) as u32).clamp(1, target_size);
        Self {
            scale,
            new_width,
            new_height,
            pad_left: (target_size - new_width) / 2,
            pad_top: (target_size - new_height) / 2,
        }
    }
}

/// Resize `image` into a `target_size` × `target_size` canvas without distortion.
///
/// Borders are filled with (114, 114, 114).
pub fn letterbox_resize(image: &RgbImage, target_size: u32) -> RgbImage {
    let layout = LetterboxLayout::compute(image.width(), image.height(), target_size);
    let mut canvas = RgbImage::from_pixel(target_size, target_size, Rgb([LETTERBOX_PAD_VALUE; 3]));

    if layout.new_width == image.width() && layout.new_height == image.height() {
        imageops::replace(
            &mut canvas,
            image,
            layout.pad_left as i64,
            layout.pad_top as i64,
        );
    } else {
        let resized = imageops::resize(
            image,
            layout.new_width,
            layout.new_height,
            FilterType::Triangle,
        );
        imageops::replace(
            &mut canvas,
            &resized,
            layout.pad_left as i64,
            layout.pad_top as i64,
        );
    }
    canvas
}

/// Build the `(1, 3, size, size)` input tensor for one frame.
///
/// Pixels are scaled from `[0, 255]` to `[0.0, 1.0]` and reordered from
/// pixel-major to channel-major.
pub fn preprocess(frame: &Frame, input_size: u32) -> Result<Array4<f32>, DecodeError> {
    let canvas = letterbox_resize(frame.as_image(), input_size);
    let side = input_size as usize;
    let hwc = Array3::from_shape_vec((side, side, Frame::CHANNELS), canvas.into_raw())?;

    let chw = hwc.mapv(|v| v as f32 / 255.0).permuted_axes([2, 0, 1]);
    Ok(chw.insert_axis(Axis(0)).as_standard_layout().into_owned())
}
