use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::detection::domain::inference_engine::InferenceError;
use crate::shared::constants::{MODEL_FAMILIES, UNKNOWN_SIZE_TAG};

const MODEL_EXTENSION: &str = ".onnx";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid model size '{0}', expected one of n, s, m, l, x")]
    InvalidSize(String),
    #[error("no model for size '{size}' in {dir} (tried {patterns})")]
    NotFound {
        size: ModelSize,
        dir: PathBuf,
        patterns: String,
    },
    #[error("cannot list model directory {dir}: {source}")]
    ReadDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Load(#[from] InferenceError),
}

/// Model capacity tier, the single letter after the family name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelSize {
    Nano,
    Small,
    Medium,
    Large,
    XLarge,
}

impl ModelSize {
    pub const ALL: [ModelSize; 5] = [
        ModelSize::Nano,
        ModelSize::Small,
        ModelSize::Medium,
        ModelSize::Large,
        ModelSize::XLarge,
    ];

    pub fn letter(self) -> char {
        match self {
            ModelSize::Nano => 'n',
            ModelSize::Small => 's',
            ModelSize::Medium => 'm',
            ModelSize::Large => 'l',
            ModelSize::XLarge => 'x',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|size| size.letter() == c)
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for ModelSize {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                Self::from_letter(c).ok_or_else(|| ModelError::InvalidSize(s.to_string()))
            }
            _ => Err(ModelError::InvalidSize(s.to_string())),
        }
    }
}

/// Size tag reported for a loaded model; `Unknown` when the filename matches
/// no recognised family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeTag {
    Known(ModelSize),
    Unknown,
}

impl SizeTag {
    /// Scan the filename for `<family><size>` using the families in
    /// priority order, case-insensitively.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        MODEL_FAMILIES
            .iter()
            .find_map(|family| {
                name.match_indices(family).find_map(|(idx, _)| {
                    name[idx + family.len()..]
                        .chars()
                        .next()
                        .and_then(ModelSize::from_letter)
                })
            })
            .map_or(SizeTag::Unknown, SizeTag::Known)
    }
}

impl fmt::Display for SizeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeTag::Known(size) => write!(f, "{size}"),
            SizeTag::Unknown => f.write_str(UNKNOWN_SIZE_TAG),
        }
    }
}

/// One candidate filename shape for a given family and size.
#[derive(Clone, Debug, PartialEq, Eq)]
enum FilenamePattern {
    /// `<family><size>.onnx`
    Exact(String),
    /// `<family><size>_*.onnx`
    Variant(String),
}

impl FilenamePattern {
    fn matches(&self, file_name: &str) -> bool {
        match self {
            FilenamePattern::Exact(name) => file_name == name,
            FilenamePattern::Variant(prefix) => {
                file_name.len() >= prefix.len() + MODEL_EXTENSION.len()
                    && file_name.starts_with(prefix.as_str())
                    && file_name.ends_with(MODEL_EXTENSION)
            }
        }
    }
}

impl fmt::Display for FilenamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilenamePattern::Exact(name) => f.write_str(name),
            FilenamePattern::Variant(prefix) => write!(f, "{prefix}*{MODEL_EXTENSION}"),
        }
    }
}

/// Patterns tried for `size`, highest priority first.
fn reload_patterns(size: ModelSize) -> Vec<FilenamePattern> {
    MODEL_FAMILIES
        .iter()
        .flat_map(|family| {
            [
                FilenamePattern::Exact(format!("{family}{size}{MODEL_EXTENSION}")),
                FilenamePattern::Variant(format!("{family}{size}_")),
            ]
        })
        .collect()
}

/// Find the model file for `size` in `dir`.
///
/// Patterns are tried in priority order; within one pattern the
/// lexicographically first filename wins so the choice is deterministic.
pub fn find_model(dir: &Path, size: ModelSize) -> Result<PathBuf, ModelError> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map_err(|source| ModelError::ReadDir {
            dir: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| !t.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();

    let patterns = reload_patterns(size);
    patterns
        .iter()
        .find_map(|pattern| names.iter().find(|name| pattern.matches(name)))
        .map(|name| dir.join(name))
        .ok_or_else(|| ModelError::NotFound {
            size,
            dir: dir.to_path_buf(),
            patterns: patterns
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
}
