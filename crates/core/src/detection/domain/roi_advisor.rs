use crate::shared::constants::ROI_EXPANSION;
use crate::shared::geometry::NormalizedRect;

use super::detection::Detection;

/// Suggests where the next frame's attention crop should go.
///
/// Stateless: the suggestion depends only on the detections of the current
/// frame. Whether it is applied is the caller's decision.
#[derive(Clone, Copy, Debug)]
pub struct RoiAdvisor {
    expansion: f64,
}

impl RoiAdvisor {
    pub fn new(expansion: f64) -> Self {
        Self { expansion }
    }

    /// Minimal box enclosing all detections, grown by `expansion` of its own
    /// size (half on each side) and clamped to the unit square.
    ///
    /// Returns `None` with no detections or a zero-sized frame.
    pub fn suggest(
        &self,
        detections: &[Detection],
        frame_width: u32,
        frame_height: u32,
    ) -> Option<NormalizedRect> {
        if detections.is_empty() || frame_width == 0 || frame_height == 0 {
            return None;
        }
        let fw = frame_width as f64;
        let fh = frame_height as f64;

        let (min_x, min_y, max_x, max_y) = detections.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), d| {
                (
                    min_x.min(d.bbox.x as f64 / fw),
                    min_y.min(d.bbox.y as f64 / fh),
                    max_x.max(d.bbox.right() as f64 / fw),
                    max_y.max(d.bbox.bottom() as f64 / fh),
                )
            },
        );

        let grow_x = (max_x - min_x) * self.expansion / 2.0;
        let grow_y = (max_y - min_y) * self.expansion / 2.0;

        let x1 = (min_x - grow_x).clamp(0.0, 1.0);
        let y1 = (min_y - grow_y).clamp(0.0, 1.0);
        let x2 = (max_x + grow_x).clamp(0.0, 1.0);
        let y2 = (max_y + grow_y).clamp(0.0, 1.0);

        let roi = NormalizedRect {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        };
        log::debug!(
            "Suggested ROI from {} detections: {:?}",
            detections.len(),
            roi
        );
        Some(roi)
    }
}

impl Default for RoiAdvisor {
    fn default() -> Self {
        Self::new(ROI_EXPANSION)
    }
}
