//! ONNX Runtime engine via `ort`.
//!
//! The only place in the crate that touches the native runtime; everything
//! else sees it through [`InferenceEngine`].

use std::fmt::Display;
use std::path::Path;

use ndarray::{Array4, ArrayD};

use crate::detection::domain::inference_engine::{EngineLoader, InferenceEngine, InferenceError};

/// One loaded ONNX model session.
pub struct OnnxEngine {
    session: ort::session::Session,
    input_name: String,
    input_shape: Vec<i64>,
    output_names: Vec<String>,
}

impl OnnxEngine {
    /// Load a model and read its input/output metadata.
    pub fn load(model_path: &Path) -> Result<Self, InferenceError> {
        let builder =
            ort::session::Session::builder().map_err(|e| load_error(model_path, e))?;
        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| load_error(model_path, e))?;

        let (input_name, input_shape) = session
            .inputs()
            .first()
            .map(|input| {
                let shape = if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype()
                {
                    shape.to_vec()
                } else {
                    Vec::new()
                };
                (input.name().to_string(), shape)
            })
            .ok_or_else(|| load_error(model_path, "model declares no inputs"))?;

        let output_names = session
            .outputs()
            .iter()
            .map(|output| output.name().to_string())
            .collect();

        Ok(Self {
            session,
            input_name,
            input_shape,
            output_names,
        })
    }
}

impl InferenceEngine for OnnxEngine {
    fn input_name(&self) -> &str {
        &self.input_name
    }

    fn input_shape(&self) -> &[i64] {
        &self.input_shape
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError> {
        let input_value = ort::value::Tensor::from_array(input).map_err(run_error)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(run_error)?;
        if outputs.len() == 0 {
            return Err(InferenceError::NoOutputs);
        }
        let tensor = outputs[0].try_extract_array::<f32>().map_err(run_error)?;
        Ok(tensor.to_owned())
    }
}

/// Loads [`OnnxEngine`] sessions from `.onnx` files.
#[derive(Clone, Copy, Debug, Default)]
pub struct OnnxEngineLoader;

impl EngineLoader for OnnxEngineLoader {
    fn load(&self, model_path: &Path) -> Result<Box<dyn InferenceEngine>, InferenceError> {
        log::info!("Loading ONNX model: {}", model_path.display());
        Ok(Box::new(OnnxEngine::load(model_path)?))
    }
}

fn load_error(path: &Path, err: impl Display) -> InferenceError {
    InferenceError::Load {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

fn run_error(err: impl Display) -> InferenceError {
    InferenceError::Run(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_model_is_load_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("yolo11n.onnx");
        let err = OnnxEngineLoader.load(&path).err().unwrap();
        assert!(matches!(err, InferenceError::Load { .. }));
    }
}
