//! Raw bindings to the sherpa-onnx C API.
//!
//! The shared library is loaded at run time with libloading. Struct layouts
//! follow `c-api.h` of sherpa-onnx v1.10.30; a library reporting any other
//! version is refused before its entry points are resolved.
//!
//! Search order for `sherpa-onnx-c-api`:
//! 1. explicit library directory (`--lib-dir` / `SCRIBE_LIB_DIR`)
//! 2. next to the executable, then its `lib/` child
//! 3. `<data_local_dir>/scribe/lib`
//! 4. system loader path
//!
//! ONNX Runtime is preloaded from the same directory so the C API library
//! resolves its dependency without `LD_LIBRARY_PATH` tricks.

use libloading::Library;
use std::ffi::{CStr, c_char, c_float, c_void};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub type OnlineRecognizerPtr = *const c_void;
pub type OnlineStreamPtr = *const c_void;
pub type OfflineRecognizerPtr = *const c_void;
pub type OfflineStreamPtr = *const c_void;
pub type VadPtr = *const c_void;
pub type PunctuationPtr = *const c_void;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct FeatureConfig {
    pub sample_rate: i32,
    pub feature_dim: i32,
}

// --- streaming ---

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OnlineTransducerModelConfig {
    pub encoder: *const c_char,
    pub decoder: *const c_char,
    pub joiner: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OnlineParaformerModelConfig {
    pub encoder: *const c_char,
    pub decoder: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OnlineZipformer2CtcModelConfig {
    pub model: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OnlineModelConfig {
    pub transducer: OnlineTransducerModelConfig,
    pub paraformer: OnlineParaformerModelConfig,
    pub zipformer2_ctc: OnlineZipformer2CtcModelConfig,
    pub tokens: *const c_char,
    pub num_threads: i32,
    pub provider: *const c_char,
    pub debug: i32,
    pub model_type: *const c_char,
    pub modeling_unit: *const c_char,
    pub bpe_vocab: *const c_char,
    pub tokens_buf: *const c_char,
    pub tokens_buf_size: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OnlineCtcFstDecoderConfig {
    pub graph: *const c_char,
    pub max_active: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OnlineRecognizerConfig {
    pub feat_config: FeatureConfig,
    pub model_config: OnlineModelConfig,
    pub decoding_method: *const c_char,
    pub max_active_paths: i32,
    pub enable_endpoint: i32,
    pub rule1_min_trailing_silence: c_float,
    pub rule2_min_trailing_silence: c_float,
    pub rule3_min_utterance_length: c_float,
    pub hotwords_file: *const c_char,
    pub hotwords_score: c_float,
    pub ctc_fst_decoder_config: OnlineCtcFstDecoderConfig,
    pub rule_fsts: *const c_char,
    pub rule_fars: *const c_char,
    pub blank_penalty: c_float,
    pub hotwords_buf: *const c_char,
    pub hotwords_buf_size: i32,
}

// --- offline ---

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OfflineTransducerModelConfig {
    pub encoder: *const c_char,
    pub decoder: *const c_char,
    pub joiner: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OfflineSingleModelConfig {
    pub model: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OfflineWhisperModelConfig {
    pub encoder: *const c_char,
    pub decoder: *const c_char,
    pub language: *const c_char,
    pub task: *const c_char,
    pub tail_paddings: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OfflineSenseVoiceModelConfig {
    pub model: *const c_char,
    pub language: *const c_char,
    pub use_itn: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OfflineMoonshineModelConfig {
    pub preprocessor: *const c_char,
    pub encoder: *const c_char,
    pub uncached_decoder: *const c_char,
    pub cached_decoder: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OfflineModelConfig {
    pub transducer: OfflineTransducerModelConfig,
    pub paraformer: OfflineSingleModelConfig,
    pub nemo_ctc: OfflineSingleModelConfig,
    pub whisper: OfflineWhisperModelConfig,
    pub tdnn: OfflineSingleModelConfig,
    pub tokens: *const c_char,
    pub num_threads: i32,
    pub debug: i32,
    pub provider: *const c_char,
    pub model_type: *const c_char,
    pub modeling_unit: *const c_char,
    pub bpe_vocab: *const c_char,
    pub telespeech_ctc: *const c_char,
    pub sense_voice: OfflineSenseVoiceModelConfig,
    pub moonshine: OfflineMoonshineModelConfig,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OfflineLmConfig {
    pub model: *const c_char,
    pub scale: c_float,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OfflineRecognizerConfig {
    pub feat_config: FeatureConfig,
    pub model_config: OfflineModelConfig,
    pub lm_config: OfflineLmConfig,
    pub decoding_method: *const c_char,
    pub max_active_paths: i32,
    pub hotwords_file: *const c_char,
    pub hotwords_score: c_float,
    pub rule_fsts: *const c_char,
    pub rule_fars: *const c_char,
    pub blank_penalty: c_float,
}

// --- vad ---

#[repr(C)]
#[derive(Clone, Copy)]
pub struct SileroVadModelConfig {
    pub model: *const c_char,
    pub threshold: c_float,
    pub min_silence_duration: c_float,
    pub min_speech_duration: c_float,
    pub window_size: i32,
    pub max_speech_duration: c_float,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct VadModelConfig {
    pub silero_vad: SileroVadModelConfig,
    pub sample_rate: i32,
    pub num_threads: i32,
    pub provider: *const c_char,
    pub debug: i32,
}

// --- punctuation ---

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OfflinePunctuationModelConfig {
    pub ct_transformer: *const c_char,
    pub num_threads: i32,
    pub debug: i32,
    pub provider: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OfflinePunctuationConfig {
    pub model: OfflinePunctuationModelConfig,
}

/// Zeroed config: null strings and zero numbers, which the C API reads as "unset".
pub fn zeroed<T: Copy>() -> T {
    // SAFETY: only instantiated with the repr(C) structs above, whose fields are
    // raw pointers, integers and floats, all valid when zero.
    unsafe { std::mem::zeroed() }
}

/// Release whose `c-api.h` the structs above mirror.
pub const PINNED_VERSION: &str = "1.10.30";

/// Accept only the release the struct layouts were written against.
pub fn check_version(found: &str) -> Result<(), String> {
    let found = found.trim().trim_start_matches('v');
    if found == PINNED_VERSION {
        Ok(())
    } else {
        Err(format!(
            "sherpa-onnx {found} is not supported, version {PINNED_VERSION} is required"
        ))
    }
}

/// Global library handle
static SHERPA_LIB: OnceLock<Result<SherpaLibrary, String>> = OnceLock::new();

/// Loaded library and resolved entry points.
pub struct SherpaLibrary {
    _onnxruntime: Option<Library>,
    _lib: Library,

    pub create_online_recognizer:
        unsafe extern "C" fn(*const OnlineRecognizerConfig) -> OnlineRecognizerPtr,
    pub destroy_online_recognizer: unsafe extern "C" fn(OnlineRecognizerPtr),
    pub create_online_stream: unsafe extern "C" fn(OnlineRecognizerPtr) -> OnlineStreamPtr,
    pub destroy_online_stream: unsafe extern "C" fn(OnlineStreamPtr),
    pub online_accept_waveform: unsafe extern "C" fn(OnlineStreamPtr, i32, *const c_float, i32),
    pub online_input_finished: unsafe extern "C" fn(OnlineStreamPtr),
    pub is_online_stream_ready: unsafe extern "C" fn(OnlineRecognizerPtr, OnlineStreamPtr) -> i32,
    pub decode_online_stream: unsafe extern "C" fn(OnlineRecognizerPtr, OnlineStreamPtr),
    pub online_result_json:
        unsafe extern "C" fn(OnlineRecognizerPtr, OnlineStreamPtr) -> *const c_char,
    pub destroy_online_result_json: unsafe extern "C" fn(*const c_char),
    pub online_stream_reset: unsafe extern "C" fn(OnlineRecognizerPtr, OnlineStreamPtr),
    pub online_stream_is_endpoint: unsafe extern "C" fn(OnlineRecognizerPtr, OnlineStreamPtr) -> i32,

    pub create_offline_recognizer:
        unsafe extern "C" fn(*const OfflineRecognizerConfig) -> OfflineRecognizerPtr,
    pub destroy_offline_recognizer: unsafe extern "C" fn(OfflineRecognizerPtr),
    pub create_offline_stream: unsafe extern "C" fn(OfflineRecognizerPtr) -> OfflineStreamPtr,
    pub destroy_offline_stream: unsafe extern "C" fn(OfflineStreamPtr),
    pub offline_accept_waveform: unsafe extern "C" fn(OfflineStreamPtr, i32, *const c_float, i32),
    pub decode_offline_stream: unsafe extern "C" fn(OfflineRecognizerPtr, OfflineStreamPtr),
    pub offline_result_json: unsafe extern "C" fn(OfflineStreamPtr) -> *const c_char,
    pub destroy_offline_result_json: unsafe extern "C" fn(*const c_char),

    pub create_vad: unsafe extern "C" fn(*const VadModelConfig, c_float) -> VadPtr,
    pub destroy_vad: unsafe extern "C" fn(VadPtr),
    pub vad_accept_waveform: unsafe extern "C" fn(VadPtr, *const c_float, i32),
    pub vad_detected: unsafe extern "C" fn(VadPtr) -> i32,
    pub vad_clear: unsafe extern "C" fn(VadPtr),
    pub vad_reset: unsafe extern "C" fn(VadPtr),

    pub create_punctuation:
        unsafe extern "C" fn(*const OfflinePunctuationConfig) -> PunctuationPtr,
    pub destroy_punctuation: unsafe extern "C" fn(PunctuationPtr),
    pub add_punct: unsafe extern "C" fn(PunctuationPtr, *const c_char) -> *const c_char,
    pub free_punct_text: unsafe extern "C" fn(*const c_char),
}

// SAFETY: The library handle and function pointers don't contain thread-local data
unsafe impl Send for SherpaLibrary {}
unsafe impl Sync for SherpaLibrary {}

/// Resolve one exported symbol as a plain function pointer.
///
/// # Safety
///
/// `T` must be the exact signature of the exported function.
unsafe fn symbol<T: Copy>(lib: &Library, name: &str) -> Result<T, String> {
    let mut raw = name.as_bytes().to_vec();
    raw.push(0);
    // SAFETY: upheld by the caller.
    unsafe {
        lib.get::<T>(&raw)
            .map(|s| *s)
            .map_err(|e| format!("missing symbol {name}: {e}"))
    }
}

impl SherpaLibrary {
    /// Load the C API library at `path`, preloading ONNX Runtime from `preload_dir`.
    pub fn load(path: &Path, preload_dir: Option<&Path>) -> Result<Self, String> {
        let onnxruntime = preload_dir.and_then(|dir| {
            let candidate = dir.join(onnxruntime_file_name());
            if !candidate.exists() {
                return None;
            }
            // SAFETY: loading a shared library runs its initializers; ONNX Runtime has
            // no initializers with preconditions.
            match unsafe { Library::new(&candidate) } {
                Ok(lib) => {
                    tracing::debug!(path = %candidate.display(), "preloaded onnxruntime");
                    Some(lib)
                }
                Err(e) => {
                    tracing::warn!(path = %candidate.display(), error = %e, "failed to preload onnxruntime");
                    None
                }
            }
        });

        // SAFETY: as above; every symbol below is resolved with its c-api.h signature.
        unsafe {
            let lib = Library::new(path)
                .map_err(|e| format!("failed to load {}: {e}", path.display()))?;

            let version_str: unsafe extern "C" fn() -> *const c_char =
                symbol(&lib, "SherpaOnnxGetVersionStr")?;
            let version = version_str();
            if version.is_null() {
                return Err("sherpa-onnx reported no version".to_string());
            }
            let version = CStr::from_ptr(version).to_string_lossy();
            check_version(&version).map_err(|e| format!("{}: {e}", path.display()))?;
            tracing::debug!(%version, "sherpa-onnx version");

            Ok(Self {
                create_online_recognizer: symbol(&lib, "SherpaOnnxCreateOnlineRecognizer")?,
                destroy_online_recognizer: symbol(&lib, "SherpaOnnxDestroyOnlineRecognizer")?,
                create_online_stream: symbol(&lib, "SherpaOnnxCreateOnlineStream")?,
                destroy_online_stream: symbol(&lib, "SherpaOnnxDestroyOnlineStream")?,
                online_accept_waveform: symbol(&lib, "SherpaOnnxOnlineStreamAcceptWaveform")?,
                online_input_finished: symbol(&lib, "SherpaOnnxOnlineStreamInputFinished")?,
                is_online_stream_ready: symbol(&lib, "SherpaOnnxIsOnlineStreamReady")?,
                decode_online_stream: symbol(&lib, "SherpaOnnxDecodeOnlineStream")?,
                online_result_json: symbol(&lib, "SherpaOnnxGetOnlineStreamResultAsJson")?,
                destroy_online_result_json: symbol(&lib, "SherpaOnnxDestroyOnlineStreamResultJson")?,
                online_stream_reset: symbol(&lib, "SherpaOnnxOnlineStreamReset")?,
                online_stream_is_endpoint: symbol(&lib, "SherpaOnnxOnlineStreamIsEndpoint")?,

                create_offline_recognizer: symbol(&lib, "SherpaOnnxCreateOfflineRecognizer")?,
                destroy_offline_recognizer: symbol(&lib, "SherpaOnnxDestroyOfflineRecognizer")?,
                create_offline_stream: symbol(&lib, "SherpaOnnxCreateOfflineStream")?,
                destroy_offline_stream: symbol(&lib, "SherpaOnnxDestroyOfflineStream")?,
                offline_accept_waveform: symbol(&lib, "SherpaOnnxAcceptWaveformOffline")?,
                decode_offline_stream: symbol(&lib, "SherpaOnnxDecodeOfflineStream")?,
                offline_result_json: symbol(&lib, "SherpaOnnxGetOfflineStreamResultAsJson")?,
                destroy_offline_result_json: symbol(&lib, "SherpaOnnxDestroyOfflineStreamResultJson")?,

                create_vad: symbol(&lib, "SherpaOnnxCreateVoiceActivityDetector")?,
                destroy_vad: symbol(&lib, "SherpaOnnxDestroyVoiceActivityDetector")?,
                vad_accept_waveform: symbol(&lib, "SherpaOnnxVoiceActivityDetectorAcceptWaveform")?,
                vad_detected: symbol(&lib, "SherpaOnnxVoiceActivityDetectorDetected")?,
                vad_clear: symbol(&lib, "SherpaOnnxVoiceActivityDetectorClear")?,
                vad_reset: symbol(&lib, "SherpaOnnxVoiceActivityDetectorReset")?,

                create_punctuation: symbol(&lib, "SherpaOnnxCreateOfflinePunctuation")?,
                destroy_punctuation: symbol(&lib, "SherpaOnnxDestroyOfflinePunctuation")?,
                add_punct: symbol(&lib, "SherpaOfflinePunctuationAddPunct")?,
                free_punct_text: symbol(&lib, "SherpaOfflinePunctuationFreeText")?,

                _lib: lib,
                _onnxruntime: onnxruntime,
            })
        }
    }
}

pub fn library_file_name() -> &'static str {
    if cfg!(windows) {
        "sherpa-onnx-c-api.dll"
    } else if cfg!(target_os = "macos") {
        "libsherpa-onnx-c-api.dylib"
    } else {
        "libsherpa-onnx-c-api.so"
    }
}

fn onnxruntime_file_name() -> &'static str {
    if cfg!(windows) {
        "onnxruntime.dll"
    } else if cfg!(target_os = "macos") {
        "libonnxruntime.dylib"
    } else {
        "libonnxruntime.so"
    }
}

/// Directories searched for the library, most specific first.
pub fn search_dirs(lib_dir: Option<&Path>) -> Vec<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));

    let mut candidates: Vec<PathBuf> = lib_dir.map(Path::to_path_buf).into_iter().collect();
    if let Some(exe_dir) = exe_dir {
        let lib_child = exe_dir.join("lib");
        candidates.extend([exe_dir, lib_child]);
    }
    if let Some(data) = dirs::data_local_dir() {
        candidates.push(data.join("scribe").join("lib"));
    }
    candidates
}

/// Load the library once per process.
///
/// Only the first call's `lib_dir` takes effect.
pub fn init_library(lib_dir: Option<&Path>) -> Result<&'static SherpaLibrary, String> {
    SHERPA_LIB
        .get_or_init(|| {
            let lib_name = library_file_name();
            let mut failures = Vec::new();

            for dir in search_dirs(lib_dir) {
                let path = dir.join(lib_name);
                if !path.exists() {
                    continue;
                }
                match SherpaLibrary::load(&path, Some(&dir)) {
                    Ok(lib) => {
                        tracing::info!(path = %path.display(), "loaded sherpa-onnx library");
                        return Ok(lib);
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to load sherpa-onnx library");
                        failures.push(e);
                    }
                }
            }

            // Try loading from system path
            SherpaLibrary::load(Path::new(lib_name), None)
                .inspect(|_| tracing::info!("loaded sherpa-onnx library from system path"))
                .map_err(|e| {
                    failures.push(e);
                    failures.join("; ")
                })
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// Get the loaded library or return an error
pub fn get_lib() -> Result<&'static SherpaLibrary, String> {
    match SHERPA_LIB.get() {
        Some(Ok(lib)) => Ok(lib),
        Some(Err(e)) => Err(e.clone()),
        None => Err("sherpa-onnx library not initialized".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_is_searched_first() {
        let dirs = search_dirs(Some(Path::new("/opt/scribe/lib")));

        assert_eq!(dirs[0], Path::new("/opt/scribe/lib"));
        assert!(dirs.len() >= 2);
    }

    #[test]
    fn exe_dir_precedes_its_lib_child() {
        let dirs = search_dirs(None);
        let exe_dir = std::env::current_exe()
            .unwrap()
            .parent()
            .unwrap()
            .to_path_buf();

        let exe_pos = dirs.iter().position(|d| *d == exe_dir).unwrap();
        let lib_pos = dirs.iter().position(|d| *d == exe_dir.join("lib")).unwrap();
        assert!(exe_pos < lib_pos);
    }

    #[test]
    fn accepts_only_the_pinned_release() {
        assert!(check_version("1.10.30").is_ok());
        assert!(check_version("v1.10.30\n").is_ok());

        for other in ["1.10.29", "1.11.0", "1.10.3", ""] {
            let err = check_version(other).unwrap_err();
            assert!(err.contains(PINNED_VERSION), "{other}: {err}");
        }
    }

    #[test]
    fn zeroed_config_has_null_strings() {
        let config: OnlineRecognizerConfig = zeroed();

        assert!(config.model_config.tokens.is_null());
        assert_eq!(config.enable_endpoint, 0);
    }
}
