//! Streaming and offline recognizers behind one [`AsrRecognizer`] impl.

use super::ffi::{self, OfflineRecognizerPtr, OfflineStreamPtr, OnlineRecognizerPtr, OnlineStreamPtr};
use super::{CStrings, lib, parse_result, sample_count};
use crate::audio::SAMPLE_RATE;
use crate::config::RecognizerConfig;
use crate::error::{ConfigError, EngineError, Result};
use crate::model::ModelLayout;
use crate::traits::{AsrRecognizer, RecognizerKind};
use crate::types::RecognitionResult;
use std::sync::Arc;

const FEATURE_DIM: i32 = 80;
const MAX_ACTIVE_PATHS: i32 = 4;

struct OnlineHandle(OnlineRecognizerPtr);

impl Drop for OnlineHandle {
    fn drop(&mut self) {
        if let Ok(lib) = lib() {
            unsafe { (lib.destroy_online_recognizer)(self.0) };
        }
    }
}

struct OfflineHandle(OfflineRecognizerPtr);

impl Drop for OfflineHandle {
    fn drop(&mut self) {
        if let Ok(lib) = lib() {
            unsafe { (lib.destroy_offline_recognizer)(self.0) };
        }
    }
}

// SAFETY: the engine's recognizer objects are immutable after construction and
// only read by decode calls.
unsafe impl Send for OnlineHandle {}
unsafe impl Sync for OnlineHandle {}
unsafe impl Send for OfflineHandle {}
unsafe impl Sync for OfflineHandle {}

enum Handle {
    Online(Arc<OnlineHandle>),
    Offline(Arc<OfflineHandle>),
}

/// Recognizer built from a discovered [`ModelLayout`].
///
/// Streams keep their recognizer alive, so dropping the recognizer first is safe.
pub struct SherpaRecognizer {
    handle: Handle,
}

impl SherpaRecognizer {
    /// Construct the engine matching `config.layout`.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when the library is missing or rejects the model files.
    pub fn new(config: &RecognizerConfig) -> Result<Self> {
        let lib = lib()?;
        let mut strings = CStrings::default();

        let handle = match &config.layout {
            ModelLayout::StreamingTransducer {
                encoder,
                decoder,
                joiner,
                tokens,
            } => {
                let mut c = online_config(config, tokens, &mut strings)?;
                c.model_config.transducer = ffi::OnlineTransducerModelConfig {
                    encoder: strings.path(encoder)?,
                    decoder: strings.path(decoder)?,
                    joiner: strings.path(joiner)?,
                };
                let ptr = unsafe { (lib.create_online_recognizer)(&c) };
                Handle::Online(Arc::new(OnlineHandle(non_null(ptr, "online recognizer")?)))
            }
            ModelLayout::StreamingParaformer {
                encoder,
                decoder,
                tokens,
            } => {
                let mut c = online_config(config, tokens, &mut strings)?;
                c.model_config.paraformer = ffi::OnlineParaformerModelConfig {
                    encoder: strings.path(encoder)?,
                    decoder: strings.path(decoder)?,
                };
                let ptr = unsafe { (lib.create_online_recognizer)(&c) };
                Handle::Online(Arc::new(OnlineHandle(non_null(ptr, "online recognizer")?)))
            }
            ModelLayout::Offline { model, tokens } => {
                let mut c: ffi::OfflineRecognizerConfig = ffi::zeroed();
                c.feat_config = feature_config();
                c.model_config.sense_voice.model = strings.path(model)?;
                c.model_config.sense_voice.use_itn = 1;
                c.model_config.tokens = strings.path(tokens)?;
                c.model_config.num_threads = thread_count(config.num_threads)?;
                c.model_config.provider = strings.text("provider", &config.provider)?;
                c.decoding_method = strings.text("decoding-method", &config.decoding_method)?;
                c.max_active_paths = MAX_ACTIVE_PATHS;
                if let Some(rule_fsts) = &config.rule_fsts {
                    c.rule_fsts = strings.text("rule-fsts", rule_fsts)?;
                }
                let ptr = unsafe { (lib.create_offline_recognizer)(&c) };
                Handle::Offline(Arc::new(OfflineHandle(non_null(ptr, "offline recognizer")?)))
            }
        };

        tracing::info!(
            dir = %config.model_dir.display(),
            layout = config.layout.name(),
            threads = config.num_threads,
            itn = config.rule_fsts.is_some(),
            "recognizer loaded"
        );

        Ok(Self { handle })
    }
}

fn feature_config() -> ffi::FeatureConfig {
    ffi::FeatureConfig {
        sample_rate: SAMPLE_RATE as i32,
        feature_dim: FEATURE_DIM,
    }
}

fn thread_count(num_threads: usize) -> std::result::Result<i32, ConfigError> {
    i32::try_from(num_threads).map_err(|_| ConfigError::InvalidOption {
        name: "num-threads",
        reason: format!("{num_threads} is too large"),
    })
}

fn online_config(
    config: &RecognizerConfig,
    tokens: &std::path::Path,
    strings: &mut CStrings,
) -> std::result::Result<ffi::OnlineRecognizerConfig, ConfigError> {
    let mut c: ffi::OnlineRecognizerConfig = ffi::zeroed();
    c.feat_config = feature_config();
    c.model_config.tokens = strings.path(tokens)?;
    c.model_config.num_threads = thread_count(config.num_threads)?;
    c.model_config.provider = strings.text("provider", &config.provider)?;
    c.decoding_method = strings.text("decoding-method", &config.decoding_method)?;
    c.max_active_paths = MAX_ACTIVE_PATHS;
    c.enable_endpoint = 1;
    c.rule1_min_trailing_silence = config.endpoint.rule1_min_trailing_silence;
    c.rule2_min_trailing_silence = config.endpoint.rule2_min_trailing_silence;
    c.rule3_min_utterance_length = config.endpoint.rule3_min_utterance_length;
    if let Some(rule_fsts) = &config.rule_fsts {
        c.rule_fsts = strings.text("rule-fsts", rule_fsts)?;
    }
    Ok(c)
}

fn non_null<T>(ptr: *const T, what: &'static str) -> std::result::Result<*const T, ConfigError> {
    if ptr.is_null() {
        Err(ConfigError::EngineRejected(what))
    } else {
        Ok(ptr)
    }
}

/// Decoding state of one utterance.
pub enum SherpaStream {
    Online(OnlineStream),
    Offline(OfflineStream),
}

pub struct OnlineStream {
    ptr: OnlineStreamPtr,
    recognizer: Arc<OnlineHandle>,
}

impl Drop for OnlineStream {
    fn drop(&mut self) {
        if let Ok(lib) = lib() {
            unsafe { (lib.destroy_online_stream)(self.ptr) };
        }
    }
}

/// Offline engines take the waveform once, so samples are buffered until decode.
pub struct OfflineStream {
    ptr: OfflineStreamPtr,
    recognizer: Arc<OfflineHandle>,
    pending: Vec<f32>,
    finished: bool,
    decoded: bool,
}

impl Drop for OfflineStream {
    fn drop(&mut self) {
        if let Ok(lib) = lib() {
            unsafe { (lib.destroy_offline_stream)(self.ptr) };
        }
    }
}

// SAFETY: a stream is used by one thread at a time through `&mut`.
unsafe impl Send for OnlineStream {}
unsafe impl Send for OfflineStream {}

fn new_online_stream(recognizer: &Arc<OnlineHandle>) -> Result<OnlineStream> {
    let lib = lib()?;
    let ptr = unsafe { (lib.create_online_stream)(recognizer.0) };
    if ptr.is_null() {
        return Err(EngineError::NullResult("online stream").into());
    }
    Ok(OnlineStream {
        ptr,
        recognizer: Arc::clone(recognizer),
    })
}

fn new_offline_stream(recognizer: &Arc<OfflineHandle>) -> Result<OfflineStream> {
    let lib = lib()?;
    let ptr = unsafe { (lib.create_offline_stream)(recognizer.0) };
    if ptr.is_null() {
        return Err(EngineError::NullResult("offline stream").into());
    }
    Ok(OfflineStream {
        ptr,
        recognizer: Arc::clone(recognizer),
        pending: Vec::new(),
        finished: false,
        decoded: false,
    })
}

impl AsrRecognizer for SherpaRecognizer {
    type Stream = SherpaStream;

    fn kind(&self) -> RecognizerKind {
        match self.handle {
            Handle::Online(_) => RecognizerKind::Streaming,
            Handle::Offline(_) => RecognizerKind::Offline,
        }
    }

    fn create_stream(&self) -> Result<SherpaStream> {
        match &self.handle {
            Handle::Online(r) => new_online_stream(r).map(SherpaStream::Online),
            Handle::Offline(r) => new_offline_stream(r).map(SherpaStream::Offline),
        }
    }

    fn accept_waveform(
        &self,
        stream: &mut SherpaStream,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<()> {
        match stream {
            SherpaStream::Online(s) => {
                let lib = lib()?;
                let n = sample_count(samples)?;
                unsafe { (lib.online_accept_waveform)(s.ptr, sample_rate as i32, samples.as_ptr(), n) };
            }
            SherpaStream::Offline(s) => {
                if s.decoded {
                    return Err(EngineError::Other(
                        "offline stream already decoded; reset it first".to_string(),
                    )
                    .into());
                }
                if sample_rate != SAMPLE_RATE {
                    return Err(EngineError::Other(format!(
                        "offline stream expects {SAMPLE_RATE}Hz, got {sample_rate}Hz"
                    ))
                    .into());
                }
                s.pending.extend_from_slice(samples);
            }
        }
        Ok(())
    }

    fn input_finished(&self, stream: &mut SherpaStream) {
        match stream {
            SherpaStream::Online(s) => {
                if let Ok(lib) = lib() {
                    unsafe { (lib.online_input_finished)(s.ptr) };
                }
            }
            SherpaStream::Offline(s) => s.finished = true,
        }
    }

    fn is_ready(&self, stream: &SherpaStream) -> bool {
        match stream {
            SherpaStream::Online(s) => lib()
                .map(|lib| unsafe { (lib.is_online_stream_ready)(s.recognizer.0, s.ptr) } != 0)
                .unwrap_or(false),
            SherpaStream::Offline(s) => s.finished && !s.decoded,
        }
    }

    fn decode(&self, stream: &mut SherpaStream) -> Result<()> {
        let lib = lib()?;
        match stream {
            SherpaStream::Online(s) => {
                unsafe { (lib.decode_online_stream)(s.recognizer.0, s.ptr) };
            }
            SherpaStream::Offline(s) => {
                let samples = std::mem::take(&mut s.pending);
                let n = sample_count(&samples)?;
                unsafe {
                    (lib.offline_accept_waveform)(s.ptr, SAMPLE_RATE as i32, samples.as_ptr(), n);
                    (lib.decode_offline_stream)(s.recognizer.0, s.ptr);
                }
                s.decoded = true;
            }
        }
        Ok(())
    }

    fn result(&self, stream: &SherpaStream) -> Result<RecognitionResult> {
        let lib = lib()?;
        match stream {
            SherpaStream::Online(s) => {
                let ptr = unsafe { (lib.online_result_json)(s.recognizer.0, s.ptr) };
                let result = parse_result(ptr, "online stream");
                if !ptr.is_null() {
                    unsafe { (lib.destroy_online_result_json)(ptr) };
                }
                result
            }
            SherpaStream::Offline(s) if !s.decoded => Ok(RecognitionResult::default()),
            SherpaStream::Offline(s) => {
                let ptr = unsafe { (lib.offline_result_json)(s.ptr) };
                let result = parse_result(ptr, "offline stream");
                if !ptr.is_null() {
                    unsafe { (lib.destroy_offline_result_json)(ptr) };
                }
                result
            }
        }
    }

    fn is_endpoint(&self, stream: &SherpaStream) -> bool {
        match stream {
            SherpaStream::Online(s) => lib()
                .map(|lib| unsafe { (lib.online_stream_is_endpoint)(s.recognizer.0, s.ptr) } != 0)
                .unwrap_or(false),
            SherpaStream::Offline(_) => false,
        }
    }

    fn reset(&self, stream: &mut SherpaStream) -> Result<()> {
        match stream {
            SherpaStream::Online(s) => {
                let lib = lib()?;
                unsafe { (lib.online_stream_reset)(s.recognizer.0, s.ptr) };
            }
            SherpaStream::Offline(s) => {
                *s = new_offline_stream(&s.recognizer)?;
            }
        }
        Ok(())
    }
}
