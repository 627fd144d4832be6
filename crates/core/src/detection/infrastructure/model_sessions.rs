use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::{Array4, ArrayD};

use crate::detection::domain::inference_engine::{EngineLoader, InferenceEngine, InferenceError};
use crate::detection::domain::roi_hint::RoiHint;
use crate::shared::constants::DEFAULT_INPUT_SIZE;

use super::model_catalog::{find_model, ModelError, ModelSize, SizeTag};

/// An engine bound to one model file and input resolution.
pub struct ModelSession {
    engine: Box<dyn InferenceEngine>,
    model_path: PathBuf,
    resolution: u32,
    size_tag: SizeTag,
}

impl ModelSession {
    pub fn load(loader: &dyn EngineLoader, model_path: &Path) -> Result<Self, ModelError> {
        let engine = loader.load(model_path)?;
        let resolution = input_resolution(engine.input_shape());
        let size_tag = SizeTag::from_path(model_path);
        log::info!(
            "Model loaded: {} (input {}, size {}, outputs {:?})",
            model_path.display(),
            engine.input_name(),
            size_tag,
            engine.output_names()
        );
        Ok(Self {
            engine,
            model_path: model_path.to_path_buf(),
            resolution,
            size_tag,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn size_tag(&self) -> SizeTag {
        self.size_tag
    }

    pub fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError> {
        self.engine.run(input)
    }
}

/// Input resolution from an NCHW shape; dynamic or missing height falls back
/// to [`DEFAULT_INPUT_SIZE`].
fn input_resolution(shape: &[i64]) -> u32 {
    match shape.get(2) {
        Some(&h) if h > 0 && h <= u32::MAX as i64 => h as u32,
        _ => DEFAULT_INPUT_SIZE,
    }
}

/// The live sessions and selection counts a frame request reads.
///
/// The primary session is always present. The secondary only serves frames
/// whose hint asks for exactly its input resolution. The confidence threshold
/// is not part of this state; it lives in the `YoloDecoder` owned by
/// `DetectFrameUseCase` and is fixed for the life of the worker.
pub struct WorkerState {
    primary: ModelSession,
    secondary: Option<ModelSession>,
    selections: BTreeMap<u32, u64>,
}

/// The session chosen for one frame.
pub struct Selection<'a> {
    pub session: &'a mut ModelSession,
    pub resolution: u32,
    pub label: String,
}

/// Result of a successful hot reload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reloaded {
    pub previous: PathBuf,
    pub current: PathBuf,
}

/// Owns [`WorkerState`] and the loader used to build new sessions.
pub struct ModelSessionManager {
    state: WorkerState,
    loader: Box<dyn EngineLoader>,
}

impl ModelSessionManager {
    /// Load the primary model and, if given, the secondary one.
    ///
    /// Fails if either model cannot be loaded; there is no degraded start.
    pub fn new(
        loader: Box<dyn EngineLoader>,
        primary_path: &Path,
        secondary_path: Option<&Path>,
    ) -> Result<Self, ModelError> {
        let primary = ModelSession::load(loader.as_ref(), primary_path)?;
        let secondary = secondary_path
            .map(|path| ModelSession::load(loader.as_ref(), path))
            .transpose()?;

        match &secondary {
            Some(s) => log::info!(
                "Multi-model enabled: {r2}x{r2} and {r1}x{r1}",
                r1 = primary.resolution,
                r2 = s.resolution
            ),
            None => log::info!(
                "Single-model mode: {r}x{r}",
                r = primary.resolution
            ),
        }

        Ok(Self {
            state: WorkerState {
                primary,
                secondary,
                selections: BTreeMap::new(),
            },
            loader,
        })
    }

    pub fn multi_model_enabled(&self) -> bool {
        self.state.secondary.is_some()
    }

    pub fn primary(&self) -> &ModelSession {
        &self.state.primary
    }

    pub fn secondary(&self) -> Option<&ModelSession> {
        self.state.secondary.as_ref()
    }

    /// How many frames each resolution has served.
    pub fn selection_counts(&self) -> &BTreeMap<u32, u64> {
        &self.state.selections
    }

    /// Choose the session for one frame.
    ///
    /// The secondary session is used only when a hint is present,
    /// `multi_model_enabled` is set, and the hint's target size equals the
    /// secondary session's resolution. Everything else goes to the primary.
    pub fn select(
        &mut self,
        roi_hint: Option<&RoiHint>,
        multi_model_enabled: bool,
    ) -> Selection<'_> {
        let state = &mut self.state;
        let wants_secondary = multi_model_enabled
            && matches!(
                (roi_hint.and_then(|h| h.target_size), &state.secondary),
                (Some(target), Some(secondary)) if target == secondary.resolution
            );

        let session = match state.secondary.as_mut() {
            Some(secondary) if wants_secondary => secondary,
            _ => &mut state.primary,
        };
        let resolution = session.resolution;
        *state.selections.entry(resolution).or_insert(0) += 1;

        Selection {
            session,
            resolution,
            label: resolution.to_string(),
        }
    }

    /// Replace the primary session with the `size` model from the primary's
    /// directory.
    ///
    /// The new session is fully built before the swap; on any failure the
    /// current sessions stay in place untouched.
    pub fn reload(&mut self, size: ModelSize) -> Result<Reloaded, ModelError> {
        let dir = self
            .state
            .primary
            .model_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let dir = if dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            dir
        };

        let path = find_model(&dir, size)?;
        let fresh = ModelSession::load(self.loader.as_ref(), &path)?;
        let previous = std::mem::replace(&mut self.state.primary, fresh);

        Ok(Reloaded {
            previous: previous.model_path,
            current: path,
        })
    }
}
