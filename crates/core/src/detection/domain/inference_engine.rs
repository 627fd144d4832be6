use std::path::{Path, PathBuf};

use ndarray::{Array4, ArrayD};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("failed to load model {path}: {reason}")]
    Load { path: PathBuf, reason: String },
    #[error("inference failed: {0}")]
    Run(String),
    #[error("model produced no outputs")]
    NoOutputs,
}

/// Domain interface for the neural network runtime.
///
/// Opaque to the rest of the crate: a tensor goes in, a tensor comes out.
/// `run` takes `&mut self` because runtime sessions keep scratch state.
pub trait InferenceEngine: Send {
    fn input_name(&self) -> &str;

    /// Declared input shape, NCHW. Dynamic axes are reported as `-1`.
    fn input_shape(&self) -> &[i64];

    fn output_names(&self) -> &[String];

    fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError>;
}

/// Creates engine instances from model files, used at startup and on reload.
pub trait EngineLoader: Send {
    fn load(&self, model_path: &Path) -> Result<Box<dyn InferenceEngine>, InferenceError>;
}
