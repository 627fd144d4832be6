use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::inference_engine::InferenceError;
use crate::detection::domain::roi_advisor::RoiAdvisor;
use crate::detection::domain::roi_hint::RoiHint;
use crate::detection::domain::suppressor::Suppressor;
use crate::detection::infrastructure::letterbox::preprocess;
use crate::detection::infrastructure::model_catalog::{ModelError, ModelSize, SizeTag};
use crate::detection::infrastructure::model_sessions::{ModelSessionManager, Reloaded};
use crate::detection::infrastructure::yolo_decoder::{DecodeError, YoloDecoder};
use crate::shared::frame::Frame;
use crate::shared::geometry::NormalizedRect;

use super::worker_logger::WorkerLogger;

#[derive(Error, Debug)]
pub enum FrameProcessingError {
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Per-stage latency of one frame, in milliseconds rounded to two decimals.
///
/// `preprocess_ms` includes model selection; `total_ms` runs from the start
/// of selection to the end of postprocessing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct StageTiming {
    pub preprocess_ms: f64,
    pub inference_ms: f64,
    pub postprocess_ms: f64,
    pub total_ms: f64,
}

/// Everything produced for one frame.
#[derive(Clone, Debug)]
pub struct FrameOutcome {
    pub detections: Vec<Detection>,
    pub suggested_roi: Option<NormalizedRect>,
    pub resolution: u32,
    pub label: String,
    pub model_size: SizeTag,
    pub timing: StageTiming,
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

/// Runs one frame through select, preprocess, inference, postprocess and
/// ROI suggestion.
///
/// Owns the worker state: frames and reload commands both go through here,
/// one at a time.
pub struct DetectFrameUseCase {
    sessions: ModelSessionManager,
    decoder: YoloDecoder,
    suppressor: Box<dyn Suppressor>,
    advisor: RoiAdvisor,
    logger: Box<dyn WorkerLogger>,
}

impl DetectFrameUseCase {
    pub fn new(
        sessions: ModelSessionManager,
        decoder: YoloDecoder,
        suppressor: Box<dyn Suppressor>,
        advisor: RoiAdvisor,
        logger: Box<dyn WorkerLogger>,
    ) -> Self {
        Self {
            sessions,
            decoder,
            suppressor,
            advisor,
            logger,
        }
    }

    pub fn sessions(&self) -> &ModelSessionManager {
        &self.sessions
    }

    pub fn execute(
        &mut self,
        frame: &Frame,
        roi_hint: Option<&RoiHint>,
    ) -> Result<FrameOutcome, FrameProcessingError> {
        let start = Instant::now();
        let multi_model = self.sessions.multi_model_enabled();
        let selection = self.sessions.select(roi_hint, multi_model);
        let resolution = selection.resolution;
        let label = selection.label;
        let model_size = selection.session.size_tag();

        let input = preprocess(frame, resolution)?;
        let preprocess_ms = elapsed_ms(start);

        let inference_start = Instant::now();
        let output = selection.session.run(input)?;
        let inference_ms = elapsed_ms(inference_start);

        let postprocess_start = Instant::now();
        let detections = self.decoder.decode(
            output.view(),
            frame.width(),
            frame.height(),
            resolution,
            self.suppressor.as_ref(),
        )?;
        let postprocess_ms = elapsed_ms(postprocess_start);
        let total_ms = elapsed_ms(start);

        let suggested_roi = self
            .advisor
            .suggest(&detections, frame.width(), frame.height());

        self.logger.timing("preprocess", preprocess_ms);
        self.logger.timing("inference", inference_ms);
        self.logger.timing("postprocess", postprocess_ms);
        self.logger.timing("total", total_ms);
        self.logger.metric("detections", detections.len() as f64);
        self.logger.frame_done();

        Ok(FrameOutcome {
            detections,
            suggested_roi,
            resolution,
            label,
            model_size,
            timing: StageTiming {
                preprocess_ms: round2(preprocess_ms),
                inference_ms: round2(inference_ms),
                postprocess_ms: round2(postprocess_ms),
                total_ms: round2(total_ms),
            },
        })
    }

    /// Hot-reload the primary model. On failure nothing changes.
    pub fn reload(&mut self, size: ModelSize) -> Result<Reloaded, ModelError> {
        self.sessions.reload(size)
    }

    /// Log the shutdown summary.
    pub fn finish(&self) {
        self.logger.summary(self.sessions.selection_counts());
    }
}
