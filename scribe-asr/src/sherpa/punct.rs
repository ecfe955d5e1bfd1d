//! CT-transformer punctuation restoration.

use super::ffi::{self, PunctuationPtr};
use super::{CStrings, lib};
use crate::config::PunctuationConfig;
use crate::error::{ConfigError, EngineError, Result};
use crate::traits::Punctuator;
use std::ffi::{CStr, CString};

pub struct SherpaPunctuator {
    ptr: PunctuationPtr,
}

// SAFETY: the punctuation model is immutable after construction.
unsafe impl Send for SherpaPunctuator {}
unsafe impl Sync for SherpaPunctuator {}

impl SherpaPunctuator {
    pub fn new(config: &PunctuationConfig) -> Result<Self> {
        let lib = lib()?;
        let mut strings = CStrings::default();

        let mut c: ffi::OfflinePunctuationConfig = ffi::zeroed();
        c.model.ct_transformer = strings.path(&config.model)?;
        c.model.num_threads = i32::try_from(config.num_threads).unwrap_or(1);
        c.model.provider = strings.text("provider", &config.provider)?;

        let ptr = unsafe { (lib.create_punctuation)(&c) };
        if ptr.is_null() {
            return Err(ConfigError::EngineRejected("punctuation model").into());
        }

        tracing::info!(model = %config.model.display(), "punctuation model loaded");

        Ok(Self { ptr })
    }
}

impl Punctuator for SherpaPunctuator {
    fn add_punctuation(&self, text: &str) -> Result<String> {
        let lib = lib()?;
        let input = CString::new(text).map_err(|_| EngineError::InvalidText)?;

        let out = unsafe { (lib.add_punct)(self.ptr, input.as_ptr()) };
        if out.is_null() {
            return Err(EngineError::NullResult("punctuation").into());
        }

        // SAFETY: non-null, nul-terminated string owned by the engine until freed below.
        let result = unsafe { CStr::from_ptr(out) }
            .to_str()
            .map(str::to_owned)
            .map_err(EngineError::from);
        unsafe { (lib.free_punct_text)(out) };

        Ok(result?)
    }
}

impl Drop for SherpaPunctuator {
    fn drop(&mut self) {
        if let Ok(lib) = lib() {
            unsafe { (lib.destroy_punctuation)(self.ptr) };
        }
    }
}
