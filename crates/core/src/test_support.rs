use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use ndarray::{Array3, Array4, ArrayD};

use crate::detection::domain::inference_engine::{EngineLoader, InferenceEngine, InferenceError};
use crate::shared::constants::{BOX_COORDS, DEFAULT_INPUT_SIZE};

/// Build a `(1, 4 + num_classes, N)` YOLO output. Each proposal is
/// `[xc, yc, w, h, class0_score]`; other class scores are zero.
pub fn yolo_output(num_classes: usize, proposals: &[[f32; 5]]) -> ArrayD<f32> {
    let mut output = Array3::<f32>::zeros((1, BOX_COORDS + num_classes, proposals.len()));
    for (n, proposal) in proposals.iter().enumerate() {
        for (c, &value) in proposal.iter().enumerate() {
            output[[0, c, n]] = value;
        }
    }
    output.into_dyn()
}

/// Shapes of every tensor passed to any engine built by one loader.
pub type SeenInputs = Arc<Mutex<Vec<Vec<usize>>>>;

pub struct FakeEngine {
    input_shape: Vec<i64>,
    output_names: Vec<String>,
    output: ArrayD<f32>,
    fail_runs: bool,
    seen: SeenInputs,
}

impl InferenceEngine for FakeEngine {
    fn input_name(&self) -> &str {
        "images"
    }

    fn input_shape(&self) -> &[i64] {
        &self.input_shape
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError> {
        self.seen.lock().unwrap().push(input.shape().to_vec());
        if self.fail_runs {
            return Err(InferenceError::Run("fake runtime failure".into()));
        }
        Ok(self.output.clone())
    }
}

/// Builds [`FakeEngine`]s for files that exist and are non-empty.
///
/// The input resolution is the trailing `_<digits>` of the file stem, or
/// [`DEFAULT_INPUT_SIZE`] when there is none.
#[derive(Clone)]
pub struct FakeLoader {
    pub output: ArrayD<f32>,
    pub fail_runs: bool,
    pub seen: SeenInputs,
}

impl Default for FakeLoader {
    fn default() -> Self {
        Self::with_output(yolo_output(80, &[]))
    }
}

impl FakeLoader {
    pub fn with_output(output: ArrayD<f32>) -> Self {
        Self {
            output,
            fail_runs: false,
            seen: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_runs: true,
            ..Self::default()
        }
    }
}

fn resolution_from_name(path: &Path) -> u32 {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.rsplit('_').next())
        .and_then(|tail| tail.parse().ok())
        .unwrap_or(DEFAULT_INPUT_SIZE)
}

impl EngineLoader for FakeLoader {
    fn load(&self, model_path: &Path) -> Result<Box<dyn InferenceEngine>, InferenceError> {
        let bytes = fs::read(model_path).map_err(|e| InferenceError::Load {
            path: model_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(InferenceError::Load {
                path: model_path.to_path_buf(),
                reason: "empty model file".into(),
            });
        }
        let size = resolution_from_name(model_path) as i64;
        Ok(Box::new(FakeEngine {
            input_shape: vec![1, 3, size, size],
            output_names: vec!["output0".into()],
            output: self.output.clone(),
            fail_runs: self.fail_runs,
            seen: Arc::clone(&self.seen),
        }))
    }
}
