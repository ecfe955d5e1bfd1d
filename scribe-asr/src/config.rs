//! Engine configuration.
//!
//! Each external engine gets its own config struct; [`EngineConfig`] tags them
//! by kind so validation and construction match exhaustively instead of
//! probing optional fields.

use crate::error::ConfigError;
use crate::model::ModelLayout;
use crate::traits::RecognizerKind;
use std::path::{Path, PathBuf};

/// Default execution provider for every engine.
pub const DEFAULT_PROVIDER: &str = "cpu";

/// Default decoding method of the recognizer.
pub const DEFAULT_DECODING_METHOD: &str = "greedy_search";

/// Seconds of audio the native VAD keeps internally.
const VAD_BUFFER_SECS: f32 = 30.0;

/// Options shared by every engine.
#[derive(clap::Args, Clone, Debug)]
pub struct EngineOptions {
    /// Inference threads per engine [default: physical cores minus 1 or 2]
    #[arg(long, env = "SCRIBE_NUM_THREADS")]
    pub num_threads: Option<usize>,

    /// Execution provider passed to the engines
    #[arg(long, env = "SCRIBE_PROVIDER", default_value = DEFAULT_PROVIDER)]
    pub provider: String,

    /// Recognizer decoding method
    #[arg(long, default_value = DEFAULT_DECODING_METHOD)]
    pub decoding_method: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            num_threads: None,
            provider: DEFAULT_PROVIDER.to_string(),
            decoding_method: DEFAULT_DECODING_METHOD.to_string(),
        }
    }
}

impl EngineOptions {
    /// Explicit thread count, or the core-count heuristic.
    pub fn resolved_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(default_num_threads)
    }
}

/// Endpoint rules evaluated inside the streaming engine.
#[derive(clap::Args, Clone, Copy, Debug, PartialEq)]
pub struct EndpointConfig {
    /// Trailing silence (seconds) ending an utterance with no decoded tokens
    #[arg(long = "rule1-min-trailing-silence", default_value_t = 2.4)]
    pub rule1_min_trailing_silence: f32,

    /// Trailing silence (seconds) ending an utterance with decoded tokens
    #[arg(long = "rule2-min-trailing-silence", default_value_t = 1.2)]
    pub rule2_min_trailing_silence: f32,

    /// Utterance length (seconds) that forces an endpoint
    #[arg(long = "rule3-min-utterance-length", default_value_t = 20.0)]
    pub rule3_min_utterance_length: f32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            rule1_min_trailing_silence: 2.4,
            rule2_min_trailing_silence: 1.2,
            rule3_min_utterance_length: 20.0,
        }
    }
}

/// Silero VAD tuning.
#[derive(clap::Args, Clone, Copy, Debug, PartialEq)]
pub struct VadOptions {
    /// Speech probability threshold
    #[arg(long = "vad-threshold", default_value_t = 0.5)]
    pub threshold: f32,

    /// Silence (seconds) before speech is considered over
    #[arg(long = "vad-min-silence", default_value_t = 0.5)]
    pub min_silence_duration: f32,

    /// Speech (seconds) before speech is considered started
    #[arg(long = "vad-min-speech", default_value_t = 0.25)]
    pub min_speech_duration: f32,

    /// Model window in samples
    #[arg(long = "vad-window-size", default_value_t = 512)]
    pub window_size: i32,

    /// Longest speech run (seconds) before the detector splits it
    #[arg(long = "vad-max-speech", default_value_t = 20.0)]
    pub max_speech_duration: f32,
}

impl Default for VadOptions {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            min_silence_duration: 0.5,
            min_speech_duration: 0.25,
            window_size: 512,
            max_speech_duration: 20.0,
        }
    }
}

/// Recognizer construction parameters.
#[derive(Clone, Debug)]
pub struct RecognizerConfig {
    pub model_dir: PathBuf,
    pub layout: ModelLayout,
    pub num_threads: usize,
    pub provider: String,
    pub decoding_method: String,
    pub endpoint: EndpointConfig,
    /// Comma-joined ITN rule FSTs, already filtered to existing files
    pub rule_fsts: Option<String>,
}

impl RecognizerConfig {
    /// Discover the model layout in `model_dir` and attach engine options.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the directory has no recognizable model.
    pub fn from_dir(
        model_dir: impl AsRef<Path>,
        options: &EngineOptions,
        endpoint: EndpointConfig,
        rule_fsts: Option<String>,
    ) -> Result<Self, ConfigError> {
        let model_dir = model_dir.as_ref().to_path_buf();
        let layout = ModelLayout::discover(&model_dir)?;

        Ok(Self {
            model_dir,
            layout,
            num_threads: options.resolved_threads(),
            provider: options.provider.clone(),
            decoding_method: options.decoding_method.clone(),
            endpoint,
            rule_fsts,
        })
    }

    pub fn kind(&self) -> RecognizerKind {
        self.layout.kind()
    }
}

/// Voice activity detector construction parameters.
#[derive(Clone, Debug)]
pub struct VadConfig {
    pub model: PathBuf,
    pub options: VadOptions,
    pub num_threads: usize,
    pub provider: String,
    pub buffer_secs: f32,
}

impl VadConfig {
    pub fn new(model: impl Into<PathBuf>, options: VadOptions, engine: &EngineOptions) -> Self {
        Self {
            model: model.into(),
            options,
            num_threads: 1,
            provider: engine.provider.clone(),
            buffer_secs: VAD_BUFFER_SECS,
        }
    }
}

/// Punctuation model construction parameters.
#[derive(Clone, Debug)]
pub struct PunctuationConfig {
    pub model: PathBuf,
    pub num_threads: usize,
    pub provider: String,
}

impl PunctuationConfig {
    pub fn new(model: impl Into<PathBuf>, engine: &EngineOptions) -> Self {
        Self {
            model: model.into(),
            num_threads: 1,
            provider: engine.provider.clone(),
        }
    }
}

/// Configuration of one external engine, tagged by kind.
#[derive(Clone, Debug)]
pub enum EngineConfig {
    Recognizer(RecognizerConfig),
    Vad(VadConfig),
    Punctuation(PunctuationConfig),
}

impl EngineConfig {
    pub fn name(&self) -> &'static str {
        match self {
            EngineConfig::Recognizer(_) => "recognizer",
            EngineConfig::Vad(_) => "vad",
            EngineConfig::Punctuation(_) => "punctuation",
        }
    }

    /// Check files and numeric options before any engine is constructed.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            EngineConfig::Recognizer(config) => {
                check_threads(config.num_threads)?;
                check_file(config.layout.tokens())?;
                let e = &config.endpoint;
                for (name, value) in [
                    ("rule1-min-trailing-silence", e.rule1_min_trailing_silence),
                    ("rule2-min-trailing-silence", e.rule2_min_trailing_silence),
                    ("rule3-min-utterance-length", e.rule3_min_utterance_length),
                ] {
                    check_positive(name, value)?;
                }
                Ok(())
            }
            EngineConfig::Vad(config) => {
                check_threads(config.num_threads)?;
                check_file(&config.model)?;
                let o = &config.options;
                if !(0.0..1.0).contains(&o.threshold) {
                    return Err(ConfigError::InvalidOption {
                        name: "vad-threshold",
                        reason: format!("{} is outside [0, 1)", o.threshold),
                    });
                }
                if o.window_size <= 0 {
                    return Err(ConfigError::InvalidOption {
                        name: "vad-window-size",
                        reason: format!("{} is not positive", o.window_size),
                    });
                }
                check_positive("vad-min-silence", o.min_silence_duration)?;
                check_positive("vad-min-speech", o.min_speech_duration)?;
                check_positive("vad-max-speech", o.max_speech_duration)
            }
            EngineConfig::Punctuation(config) => {
                check_threads(config.num_threads)?;
                check_file(&config.model)
            }
        }
    }
}

fn check_file(path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::ModelFileNotFound(path.to_path_buf()))
    }
}

fn check_threads(num_threads: usize) -> Result<(), ConfigError> {
    if num_threads == 0 {
        return Err(ConfigError::InvalidOption {
            name: "num-threads",
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn check_positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidOption {
            name,
            reason: format!("{value} is not positive"),
        })
    }
}

/// Inference threads for this machine, decided once at startup.
pub fn default_num_threads() -> usize {
    let system = sysinfo::System::new();
    let cores = system.physical_core_count().unwrap_or(1);
    let threads = threads_for_cores(cores);
    tracing::debug!(cores, threads, "selected inference thread count");
    threads
}

/// Physical cores minus 1 on small machines, minus 2 otherwise, at least 1.
pub fn threads_for_cores(physical_cores: usize) -> usize {
    let reserved = if physical_cores <= 4 { 1 } else { 2 };
    physical_cores.saturating_sub(reserved).max(1)
}
