//! sherpa-onnx backend for the engine traits.
//!
//! Call [`init`] once at startup before constructing any engine; it is the
//! capability check that locates and loads the native library.

mod ffi;
mod punct;
mod recognizer;
mod vad;

pub use punct::SherpaPunctuator;
pub use recognizer::{OfflineStream, OnlineStream, SherpaRecognizer, SherpaStream};
pub use vad::SherpaVad;

use crate::error::{ConfigError, EngineError, Result};
use crate::types::RecognitionResult;
use std::ffi::{CStr, CString, c_char};
use std::path::Path;

/// Locate and load the native library.
///
/// # Errors
///
/// [`ConfigError::LibraryUnavailable`] when no candidate could be loaded.
pub fn init(lib_dir: Option<&Path>) -> std::result::Result<(), ConfigError> {
    ffi::init_library(lib_dir)
        .map(|_| ())
        .map_err(ConfigError::LibraryUnavailable)
}

fn lib() -> Result<&'static ffi::SherpaLibrary> {
    ffi::get_lib().map_err(|e| ConfigError::LibraryUnavailable(e).into())
}

/// Owns the C strings referenced by a config struct until the engine is built.
#[derive(Default)]
struct CStrings(Vec<CString>);

impl CStrings {
    fn text(&mut self, name: &'static str, value: &str) -> std::result::Result<*const c_char, ConfigError> {
        let owned = CString::new(value).map_err(|_| ConfigError::InvalidOption {
            name,
            reason: "contains a nul byte".to_string(),
        })?;
        Ok(self.keep(owned))
    }

    fn path(&mut self, path: &Path) -> std::result::Result<*const c_char, ConfigError> {
        let owned = path
            .to_str()
            .and_then(|s| CString::new(s).ok())
            .ok_or_else(|| ConfigError::InvalidPath(path.to_path_buf()))?;
        Ok(self.keep(owned))
    }

    fn keep(&mut self, owned: CString) -> *const c_char {
        // The heap buffer does not move when the vector grows.
        let ptr = owned.as_ptr();
        self.0.push(owned);
        ptr
    }
}

fn sample_count(samples: &[f32]) -> std::result::Result<i32, EngineError> {
    i32::try_from(samples.len()).map_err(|_| EngineError::WaveformTooLarge(samples.len()))
}

/// Parse a result JSON string owned by the engine. The caller frees it.
fn parse_result(ptr: *const c_char, what: &'static str) -> Result<RecognitionResult> {
    if ptr.is_null() {
        return Err(EngineError::NullResult(what).into());
    }
    // SAFETY: non-null, nul-terminated string returned by the engine and not yet freed.
    let json = unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(EngineError::from)?;
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cstrings_stay_valid_after_growth() {
        let mut strings = CStrings::default();
        let first = strings.text("provider", "cpu").unwrap();
        for i in 0..64 {
            strings.text("filler", &format!("value-{i}")).unwrap();
        }

        // SAFETY: `strings` still owns the buffer.
        let value = unsafe { CStr::from_ptr(first) };
        assert_eq!(value.to_str().unwrap(), "cpu");
    }

    #[test]
    fn interior_nul_is_rejected() {
        let mut strings = CStrings::default();

        let result = strings.text("provider", "c\0pu");

        assert!(matches!(result, Err(ConfigError::InvalidOption { name: "provider", .. })));
    }

    #[test]
    fn parses_result_json() {
        let raw = CString::new(r#"{"text":"HI","tokens":["H","I"],"timestamps":[0.0,0.4]}"#).unwrap();

        let result = parse_result(raw.as_ptr(), "test").unwrap();

        assert_eq!(result.text, "HI");
        assert_eq!(result.tokens, ["H", "I"]);
    }

    #[test]
    fn null_result_is_engine_error() {
        let result = parse_result(std::ptr::null(), "test");

        assert!(matches!(
            result,
            Err(crate::error::Error::Engine(EngineError::NullResult("test")))
        ));
    }

    #[test]
    #[ignore = "requires the sherpa-onnx shared library"]
    fn loads_native_library() {
        init(std::env::var_os("SCRIBE_LIB_DIR").as_deref().map(Path::new)).unwrap();
    }
}
