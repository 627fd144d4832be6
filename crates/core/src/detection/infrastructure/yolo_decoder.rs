use ndarray::{Array1, ArrayView1, ArrayViewD, Axis, Ix3};
use thiserror::Error;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::suppressor::Suppressor;
use crate::shared::constants::{BOX_COORDS, NMS_IOU_THRESHOLD, TARGET_CLASS_INDEX};
use crate::shared::geometry::BoundingBox;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unexpected YOLO output shape {0:?}, expected (1, 4 + classes, proposals)")]
    OutputShape(Vec<usize>),
    #[error("tensor layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),
}

/// Filters, rescales and suppresses raw proposals for the target class.
#[derive(Clone, Copy, Debug)]
pub struct YoloDecoder {
    confidence: f64,
    iou_threshold: f64,
    class_index: usize,
}

impl YoloDecoder {
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence,
            iou_threshold: NMS_IOU_THRESHOLD,
            class_index: TARGET_CLASS_INDEX,
        }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Decode one model output for a frame of `orig_width` × `orig_height`.
    ///
    /// Box coordinates are in model-input space (`input_size` square) and are
    /// mapped back with independent x/y factors, then clipped to the frame.
    pub fn decode(
        &self,
        output: ArrayViewD<'_, f32>,
        orig_width: u32,
        orig_height: u32,
        input_size: u32,
        suppressor: &dyn Suppressor,
    ) -> Result<Vec<Detection>, DecodeError> {
        let shape = output.shape().to_vec();
        let output = output
            .into_dimensionality::<Ix3>()
            .map_err(|_| DecodeError::OutputShape(shape.clone()))?;
        let score_column = BOX_COORDS + self.class_index;
        if shape[0] != 1 || shape[1] <= score_column {
            return Err(DecodeError::OutputShape(shape));
        }

        // (C, N) → (N, C)
        let proposals = output.index_axis_move(Axis(0), 0).reversed_axes();
        let scores = proposals.column(score_column);

        let keep: Vec<usize> = scores
            .indexed_iter()
            .filter(|(_, &score)| score as f64 >= self.confidence)
            .map(|(i, _)| i)
            .collect();
        if keep.is_empty() {
            return Ok(Vec::new());
        }

        let rows = proposals.select(Axis(0), &keep);
        let kept_scores = scores.select(Axis(0), &keep);

        let scale_x = orig_width as f32 / input_size as f32;
        let scale_y = orig_height as f32 / input_size as f32;
        let half_w = rows.column(2).mapv(|w| w / 2.0);
        let half_h = rows.column(3).mapv(|h| h / 2.0);
        let xc = rows.column(0);
        let yc = rows.column(1);

        let x1 = to_pixels(&xc - &half_w, scale_x, orig_width);
        let y1 = to_pixels(&yc - &half_h, scale_y, orig_height);
        let x2 = to_pixels(&xc + &half_w, scale_x, orig_width);
        let y2 = to_pixels(&yc + &half_h, scale_y, orig_height);

        let detections = corners_to_detections(&x1, &y1, &x2, &y2, kept_scores.view());
        Ok(suppressor.suppress(detections, self.confidence, self.iou_threshold))
    }
}

/// Scale model-space coordinates to frame pixels, truncating and clipping to `[0, limit]`.
fn to_pixels(coords: Array1<f32>, scale: f32, limit: u32) -> Array1<i32> {
    let limit = limit.min(i32::MAX as u32) as i32;
    coords.mapv(|v| ((v * scale) as i32).clamp(0, limit))
}

fn corners_to_detections(
    x1: &Array1<i32>,
    y1: &Array1<i32>,
    x2: &Array1<i32>,
    y2: &Array1<i32>,
    scores: ArrayView1<'_, f32>,
) -> Vec<Detection> {
    scores
        .iter()
        .enumerate()
        .map(|(i, &score)| {
            Detection::new(
                BoundingBox::from_corners(x1[i], y1[i], x2[i], y2[i]),
                score as f64,
            )
        })
        .collect()
}
