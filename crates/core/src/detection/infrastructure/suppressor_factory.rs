use crate::detection::domain::suppressor::Suppressor;
#[cfg(not(feature = "batched-nms"))]
use crate::detection::domain::suppressor::GreedySuppressor;

#[cfg(feature = "batched-nms")]
use super::batched_suppressor::BatchedSuppressor;

/// Creates the best available NMS implementation.
///
/// The batched backend is compiled in with the `batched-nms` feature; builds
/// without it fall back to the plain greedy loop. Logs which one is selected.
pub fn create_suppressor() -> Box<dyn Suppressor> {
    #[cfg(feature = "batched-nms")]
    let suppressor: Box<dyn Suppressor> = Box::new(BatchedSuppressor);
    #[cfg(not(feature = "batched-nms"))]
    let suppressor: Box<dyn Suppressor> = Box::new(GreedySuppressor);

    log::info!("Using {} NMS backend", suppressor.name());
    suppressor
}
