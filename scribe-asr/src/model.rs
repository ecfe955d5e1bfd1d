//! Model directory discovery.
//!
//! A recognizer directory holds a tokens file plus one of:
//!
//! | Files                           | Layout                  |
//! |---------------------------------|-------------------------|
//! | `encoder`, `decoder`, `joiner`  | streaming transducer    |
//! | `encoder`, `decoder`            | streaming paraformer    |
//! | `model`                         | offline single-file     |
//!
//! Roles are matched by file-name substring. When several files match a role,
//! quantized (`int8`) candidates win, then the lexically first name.

use crate::error::ConfigError;
use crate::traits::RecognizerKind;
use std::path::{Path, PathBuf};

const TOKENS_FILE: &str = "tokens.txt";
const MODEL_EXTENSION: &str = "onnx";
const QUANTIZED_MARKER: &str = "int8";

/// Resolved model files, tagged by engine kind.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelLayout {
    StreamingTransducer {
        encoder: PathBuf,
        decoder: PathBuf,
        joiner: PathBuf,
        tokens: PathBuf,
    },
    StreamingParaformer {
        encoder: PathBuf,
        decoder: PathBuf,
        tokens: PathBuf,
    },
    Offline {
        model: PathBuf,
        tokens: PathBuf,
    },
}

impl ModelLayout {
    /// Inspect `dir` and classify its model files.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ModelDirNotFound`] if `dir` is not a readable directory
    /// - [`ConfigError::TokensNotFound`] without a tokens file
    /// - [`ConfigError::ModelNotFound`] without a matching file set
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        let mut names = list_files(dir)?;
        names.sort();

        let tokens = pick_tokens(&names)
            .map(|name| dir.join(name))
            .ok_or_else(|| ConfigError::TokensNotFound(dir.to_path_buf()))?;

        let models: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| {
                Path::new(name)
                    .extension()
                    .is_some_and(|ext| ext == MODEL_EXTENSION)
            })
            .collect();

        let find = |role: &str| pick_role(&models, role).map(|name| dir.join(name));

        let layout = match (find("encoder"), find("decoder"), find("joiner")) {
            (Some(encoder), Some(decoder), Some(joiner)) => Self::StreamingTransducer {
                encoder,
                decoder,
                joiner,
                tokens,
            },
            (Some(encoder), Some(decoder), None) => Self::StreamingParaformer {
                encoder,
                decoder,
                tokens,
            },
            _ => match find("model") {
                Some(model) => Self::Offline { model, tokens },
                None => return Err(ConfigError::ModelNotFound(dir.to_path_buf())),
            },
        };

        tracing::debug!(dir = %dir.display(), layout = layout.name(), "model layout discovered");

        Ok(layout)
    }

    pub fn kind(&self) -> RecognizerKind {
        match self {
            Self::StreamingTransducer { .. } | Self::StreamingParaformer { .. } => {
                RecognizerKind::Streaming
            }
            Self::Offline { .. } => RecognizerKind::Offline,
        }
    }

    pub fn tokens(&self) -> &Path {
        match self {
            Self::StreamingTransducer { tokens, .. }
            | Self::StreamingParaformer { tokens, .. }
            | Self::Offline { tokens, .. } => tokens,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::StreamingTransducer { .. } => "streaming-transducer",
            Self::StreamingParaformer { .. } => "streaming-paraformer",
            Self::Offline { .. } => "offline",
        }
    }
}

fn list_files(dir: &Path) -> Result<Vec<String>, ConfigError> {
    let not_found = || ConfigError::ModelDirNotFound(dir.to_path_buf());

    let entries = std::fs::read_dir(dir).map_err(|_| not_found())?;

    Ok(entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file() || t.is_symlink()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect())
}

fn pick_tokens(names: &[String]) -> Option<&str> {
    names
        .iter()
        .find(|name| *name == TOKENS_FILE)
        .or_else(|| names.iter().find(|name| name.ends_with(TOKENS_FILE)))
        .map(String::as_str)
}

/// First quantized candidate containing `role`, else the first plain one.
fn pick_role<'a>(names: &[&'a str], role: &str) -> Option<&'a str> {
    let mut candidates = names.iter().copied().filter(|name| name.contains(role));
    let first = candidates.next()?;

    if first.contains(QUANTIZED_MARKER) {
        return Some(first);
    }

    Some(
        candidates
            .find(|name| name.contains(QUANTIZED_MARKER))
            .unwrap_or(first),
    )
}
