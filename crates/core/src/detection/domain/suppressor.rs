use std::cmp::Ordering;

use super::detection::Detection;

/// Non-maximum suppression strategy.
///
/// Every implementation keeps the highest-confidence box of each overlapping
/// cluster and returns survivors in descending confidence order. Equal
/// confidences keep their input order.
pub trait Suppressor: Send {
    fn name(&self) -> &'static str;

    fn suppress(
        &self,
        detections: Vec<Detection>,
        score_threshold: f64,
        iou_threshold: f64,
    ) -> Vec<Detection>;
}

/// Indices of detections scoring at least `score_threshold`, best first.
///
/// The sort is stable, so ties resolve by original proposal order.
pub fn rank_candidates(detections: &[Detection], score_threshold: f64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..detections.len())
        .filter(|&i| detections[i].confidence >= score_threshold)
        .collect();
    order.sort_by(|&a, &b| {
        detections[b]
            .confidence
            .partial_cmp(&detections[a].confidence)
            .unwrap_or(Ordering::Equal)
    });
    order
}

/// Plain greedy NMS over pairwise IoU.
///
/// Takes the best remaining detection, drops everything overlapping it by
/// more than the threshold, repeats until nothing remains.
#[derive(Clone, Copy, Debug, Default)]
pub struct GreedySuppressor;

impl Suppressor for GreedySuppressor {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn suppress(
        &self,
        detections: Vec<Detection>,
        score_threshold: f64,
        iou_threshold: f64,
    ) -> Vec<Detection> {
        let mut remaining = rank_candidates(&detections, score_threshold);
        let mut keep = Vec::new();

        while !remaining.is_empty() {
            let best = remaining.remove(0);
            let best_box = detections[best].bbox;
            remaining.retain(|&i| detections[i].bbox.iou(&best_box) <= iou_threshold);
            keep.push(best);
        }

        keep.into_iter().map(|i| detections[i].clone()).collect()
    }
}
