//! Model arguments shared by both subcommands and their resolved form.
//!
//! Resolution discovers the model layout and checks every file eagerly, so a
//! bad model directory fails before any audio is read.

use eyre::{Result, WrapErr};
use scribe_asr::config::{
    EndpointConfig, EngineConfig, EngineOptions, PunctuationConfig, RecognizerConfig,
};
use scribe_asr::postprocess::{TextPostProcessor, resolve_rule_fsts};
use scribe_asr::sherpa::{self, SherpaPunctuator, SherpaRecognizer};
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
pub struct ModelArgs {
    /// Recognizer model directory (tokens.txt plus onnx files)
    #[arg(long, env = "SCRIBE_MODEL_DIR")]
    pub model_dir: PathBuf,

    /// Punctuation model file, applied to final segments
    #[arg(long, env = "SCRIBE_PUNCT_MODEL")]
    pub punct_model: Option<PathBuf>,

    /// Inverse text normalization rule FSTs, comma separated
    #[arg(long, env = "SCRIBE_RULE_FSTS", value_delimiter = ',')]
    pub rule_fsts: Vec<PathBuf>,

    /// Directory holding the sherpa-onnx shared library
    #[arg(long, env = "SCRIBE_LIB_DIR")]
    pub lib_dir: Option<PathBuf>,

    /// Omit tokens, timestamps and durations from final segments
    #[arg(long)]
    pub no_alignment: bool,

    #[command(flatten)]
    pub engine: EngineOptions,

    #[command(flatten)]
    pub endpoint: EndpointConfig,
}

/// Resolved and validated engine configuration.
#[derive(Debug)]
pub struct ModelConfig {
    pub recognizer: RecognizerConfig,
    pub punctuation: Option<PunctuationConfig>,
    pub engine: EngineOptions,
    pub lib_dir: Option<PathBuf>,
    pub alignment: bool,
}

impl TryFrom<ModelArgs> for ModelConfig {
    type Error = eyre::Error;

    fn try_from(args: ModelArgs) -> Result<Self> {
        let rule_fsts = resolve_rule_fsts(&args.rule_fsts);
        let recognizer =
            RecognizerConfig::from_dir(&args.model_dir, &args.engine, args.endpoint, rule_fsts)?;
        let punctuation = args
            .punct_model
            .map(|model| PunctuationConfig::new(model, &args.engine));

        let config = Self {
            recognizer,
            punctuation,
            engine: args.engine,
            lib_dir: args.lib_dir,
            alignment: !args.no_alignment,
        };
        for engine in config.engines() {
            engine
                .validate()
                .wrap_err_with(|| format!("invalid {} configuration", engine.name()))?;
        }

        Ok(config)
    }
}

impl ModelConfig {
    /// Every engine this configuration will construct.
    pub fn engines(&self) -> Vec<EngineConfig> {
        let mut engines = vec![EngineConfig::Recognizer(self.recognizer.clone())];
        engines.extend(self.punctuation.clone().map(EngineConfig::Punctuation));
        engines
    }

    /// Load the native library, then build the recognizer and post-processor.
    pub fn load(&self) -> Result<(SherpaRecognizer, TextPostProcessor)> {
        sherpa::init(self.lib_dir.as_deref())?;

        let recognizer = SherpaRecognizer::new(&self.recognizer).wrap_err_with(|| {
            format!(
                "failed to load recognizer: {:?}",
                self.recognizer.model_dir.display()
            )
        })?;

        let punctuator = match &self.punctuation {
            Some(config) => {
                let punctuator = SherpaPunctuator::new(config).wrap_err_with(|| {
                    format!("failed to load punctuation: {:?}", config.model.display())
                })?;
                Some(Box::new(punctuator) as Box<dyn scribe_asr::traits::Punctuator>)
            }
            None => None,
        };

        Ok((recognizer, TextPostProcessor::new(punctuator)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_asr::error::ConfigError;
    use scribe_asr::traits::RecognizerKind;
    use std::fs;

    fn args(model_dir: PathBuf) -> ModelArgs {
        ModelArgs {
            model_dir,
            punct_model: None,
            rule_fsts: Vec::new(),
            lib_dir: None,
            no_alignment: false,
            engine: EngineOptions {
                num_threads: Some(2),
                ..EngineOptions::default()
            },
            endpoint: EndpointConfig::default(),
        }
    }

    fn offline_model_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tokens.txt"), "a 0\n").unwrap();
        fs::write(dir.path().join("model.int8.onnx"), b"").unwrap();
        dir
    }

    #[test]
    fn resolves_offline_model_dir() {
        let dir = offline_model_dir();

        let config = ModelConfig::try_from(args(dir.path().to_path_buf())).unwrap();

        assert_eq!(config.recognizer.kind(), RecognizerKind::Offline);
        assert_eq!(config.recognizer.num_threads, 2);
        assert!(config.alignment);
        assert_eq!(config.engines().len(), 1);
    }

    #[test]
    fn missing_model_dir_is_config_error() {
        let err = ModelConfig::try_from(args(PathBuf::from("/nonexistent/model"))).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ModelDirNotFound(_))
        ));
    }

    #[test]
    fn missing_punct_model_is_rejected() {
        let dir = offline_model_dir();
        let mut args = args(dir.path().to_path_buf());
        args.punct_model = Some(dir.path().join("punct.onnx"));

        let err = ModelConfig::try_from(args).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ModelFileNotFound(_))
        ));
    }

    #[test]
    fn missing_rule_fsts_are_dropped() {
        let dir = offline_model_dir();
        let fst = dir.path().join("itn.fst");
        fs::write(&fst, b"").unwrap();
        let mut args = args(dir.path().to_path_buf());
        args.rule_fsts = vec![fst.clone(), dir.path().join("missing.fst")];

        let config = ModelConfig::try_from(args).unwrap();

        assert_eq!(config.recognizer.rule_fsts.as_deref(), fst.to_str());
    }
}
