//! Error types for scribe-asr organized by processing stage.

use std::path::PathBuf;
use thiserror::Error;

/// Pipeline error variants organized by processing stage.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration stage error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Input transcoding error
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    /// Audio decoding error
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// Recognition, VAD or punctuation engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Streaming requested against a model that only decodes whole utterances
    #[error("streaming mode is not supported by offline models")]
    ModeUnsupported,
}

/// Configuration errors (model discovery, engine construction, library loading).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Model directory missing or unreadable
    #[error("model directory not found: {0}")]
    ModelDirNotFound(PathBuf),

    /// No `tokens.txt` in the model directory
    #[error("no tokens file found in {0}")]
    TokensNotFound(PathBuf),

    /// No encoder/decoder/joiner, encoder/decoder or single model file found
    #[error("no recognizable model files found in {0}")]
    ModelNotFound(PathBuf),

    /// Auxiliary model file (VAD, punctuation) missing
    #[error("model file not found: {0}")]
    ModelFileNotFound(PathBuf),

    /// Path cannot be passed across the engine boundary
    #[error("invalid path: {0}")]
    InvalidPath(PathBuf),

    /// Invalid numeric option
    #[error("invalid option {name}: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    /// Engine shared library could not be located or loaded
    #[error("engine library unavailable: {0}")]
    LibraryUnavailable(String),

    /// Engine rejected the configuration
    #[error("failed to create {0}")]
    EngineRejected(&'static str),
}

/// External transcoder errors.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Input file missing
    #[error("input file not found: {0}")]
    InputNotFound(PathBuf),

    /// Transcoder process could not be started
    #[error("failed to spawn transcoder {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Transcoder exited with a non-zero code
    #[error("transcoder exited with {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    /// Pipe closed unexpectedly while reading transcoder output
    #[error("transcoder pipe closed unexpectedly: {0}")]
    Pipe(#[source] std::io::Error),
}

/// Audio reading errors.
#[derive(Debug, Error)]
pub enum AudioError {
    /// IO error during audio loading
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// WAV file format error
    #[error(transparent)]
    Hound(#[from] hound::Error),
}

/// Failures surfaced by the recognition, VAD or punctuation collaborators.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Waveform chunk too large for the engine's sample counter
    #[error("waveform of {0} samples exceeds engine limit")]
    WaveformTooLarge(usize),

    /// Engine returned a null result
    #[error("engine returned no result for {0}")]
    NullResult(&'static str),

    /// Engine result could not be parsed
    #[error("malformed engine result: {0}")]
    MalformedResult(#[from] serde_json::Error),

    /// Text could not be passed to the engine
    #[error("text contains an interior nul byte")]
    InvalidText,

    /// Engine returned text that is not valid UTF-8
    #[error("engine returned invalid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Any other collaborator failure
    #[error("{0}")]
    Other(String),
}

/// Result type alias for scribe-asr operations.
pub type Result<T> = std::result::Result<T, Error>;

// Nested From implementations for automatic error conversion chains

// hound::Error → AudioError → Error
impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        Error::Audio(AudioError::Hound(e))
    }
}

// std::io::Error → AudioError → Error
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Audio(AudioError::Io(e))
    }
}

// serde_json::Error → EngineError → Error
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Engine(EngineError::MalformedResult(e))
    }
}

impl Error {
    /// Whether the error is detected before any audio is consumed.
    pub fn is_startup(&self) -> bool {
        matches!(self, Error::Config(_) | Error::ModeUnsupported)
    }
}
