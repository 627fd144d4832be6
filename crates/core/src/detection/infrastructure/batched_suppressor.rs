use ndarray::{s, Array1, Zip};

use crate::detection::domain::detection::Detection;
use crate::detection::domain::suppressor::{rank_candidates, Suppressor};

/// NMS with box corners and areas packed into arrays up front.
///
/// Each kept box is compared against all lower-ranked candidates in one
/// vectorized pass instead of pair by pair. Produces the same kept set as
/// [`GreedySuppressor`](crate::detection::domain::suppressor::GreedySuppressor).
#[derive(Clone, Copy, Debug, Default)]
pub struct BatchedSuppressor;

impl Suppressor for BatchedSuppressor {
    fn name(&self) -> &'static str {
        "batched"
    }

    fn suppress(
        &self,
        detections: Vec<Detection>,
        score_threshold: f64,
        iou_threshold: f64,
    ) -> Vec<Detection> {
        let order = rank_candidates(&detections, score_threshold);
        let n = order.len();
        if n == 0 {
            return Vec::new();
        }

        let x1 = Array1::from_iter(order.iter().map(|&i| detections[i].bbox.x as f64));
        let y1 = Array1::from_iter(order.iter().map(|&i| detections[i].bbox.y as f64));
        let x2 = Array1::from_iter(order.iter().map(|&i| detections[i].bbox.right() as f64));
        let y2 = Array1::from_iter(order.iter().map(|&i| detections[i].bbox.bottom() as f64));
        let areas = Array1::from_iter(order.iter().map(|&i| detections[i].bbox.area()));

        let mut alive = Array1::from_elem(n, true);
        let mut keep = Vec::new();

        for i in 0..n {
            if !alive[i] {
                continue;
            }
            keep.push(order[i]);
            if i + 1 == n {
                break;
            }

            let (bx1, by1, bx2, by2, barea) = (x1[i], y1[i], x2[i], y2[i], areas[i]);
            let iw = (x2.slice(s![i + 1..]).mapv(|v| v.min(bx2))
                - x1.slice(s![i + 1..]).mapv(|v| v.max(bx1)))
            .mapv(|v| v.max(0.0));
            let ih = (y2.slice(s![i + 1..]).mapv(|v| v.min(by2))
                - y1.slice(s![i + 1..]).mapv(|v| v.max(by1)))
            .mapv(|v| v.max(0.0));
            let inter = iw * ih;

            Zip::from(alive.slice_mut(s![i + 1..]))
                .and(&inter)
                .and(areas.slice(s![i + 1..]))
                .for_each(|alive, &inter, &area| {
                    if inter > 0.0 {
                        let union = barea + area - inter;
                        if union > 0.0 && inter / union > iou_threshold {
                            *alive = false;
                        }
                    }
                });
        }

        keep.into_iter().map(|i| detections[i].clone()).collect()
    }
}
