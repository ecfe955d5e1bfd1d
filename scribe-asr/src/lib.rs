//! scribe-asr: speech-transcription pipeline over external recognition engines.
//!
//! Turns a raw audio stream or file into timestamped transcript segments.
//!
//! # Architecture
//!
//! The engines are opaque collaborators behind three traits:
//!
//! - [`traits::AsrRecognizer`]: streaming or offline recognizer
//! - [`traits::VoiceActivityDetector`]: speech/silence classifier
//! - [`traits::Punctuator`]: punctuation restoration
//!
//! [`sherpa`] implements them over the sherpa-onnx C API. On top of them:
//!
//! - [`session::StreamSession`]: live stream, partials and endpoint-driven finals
//! - [`batch::BatchPipeline`]: whole file, VAD or fixed-chunk segmentation
//!
//! # Quick Start
//!
//! ```ignore
//! use scribe_asr::config::{EndpointConfig, EngineOptions, RecognizerConfig};
//! use scribe_asr::id::UuidIdGen;
//! use scribe_asr::postprocess::TextPostProcessor;
//! use scribe_asr::session::StreamSession;
//! use scribe_asr::sherpa::{self, SherpaRecognizer};
//!
//! sherpa::init(None)?;
//! let options = EngineOptions::default();
//! let config = RecognizerConfig::from_dir("model_dir", &options, EndpointConfig::default(), None)?;
//! let recognizer = SherpaRecognizer::new(&config)?;
//! let mut session = StreamSession::new(recognizer, UuidIdGen, TextPostProcessor::default())?;
//!
//! for event in session.accept_samples(&samples)? {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! for event in session.finish()? {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

pub mod audio;
pub mod batch;
pub mod chunk;
pub mod config;
pub mod error;
pub mod id;
pub mod model;
pub mod postprocess;
pub mod segmentation;
pub mod session;
pub mod sherpa;
pub mod traits;
pub mod transcode;
pub mod types;
