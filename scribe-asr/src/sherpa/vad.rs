//! Silero voice activity detector.

use super::ffi::{self, VadPtr};
use super::{CStrings, lib, sample_count};
use crate::audio::SAMPLE_RATE;
use crate::config::VadConfig;
use crate::error::{ConfigError, Result};
use crate::traits::VoiceActivityDetector;

/// Speech/silence classifier. Only the detection flag is consumed; the
/// engine's own speech-segment queue is cleared after every window.
pub struct SherpaVad {
    ptr: VadPtr,
}

// SAFETY: used by one thread at a time through `&mut`.
unsafe impl Send for SherpaVad {}

impl SherpaVad {
    pub fn new(config: &VadConfig) -> Result<Self> {
        let lib = lib()?;
        let mut strings = CStrings::default();

        let mut c: ffi::VadModelConfig = ffi::zeroed();
        c.silero_vad = ffi::SileroVadModelConfig {
            model: strings.path(&config.model)?,
            threshold: config.options.threshold,
            min_silence_duration: config.options.min_silence_duration,
            min_speech_duration: config.options.min_speech_duration,
            window_size: config.options.window_size,
            max_speech_duration: config.options.max_speech_duration,
        };
        c.sample_rate = SAMPLE_RATE as i32;
        c.num_threads = i32::try_from(config.num_threads).unwrap_or(1);
        c.provider = strings.text("provider", &config.provider)?;

        let ptr = unsafe { (lib.create_vad)(&c, config.buffer_secs) };
        if ptr.is_null() {
            return Err(ConfigError::EngineRejected("voice activity detector").into());
        }

        tracing::info!(model = %config.model.display(), threshold = config.options.threshold, "vad loaded");

        Ok(Self { ptr })
    }
}

impl VoiceActivityDetector for SherpaVad {
    fn accept_waveform(&mut self, samples: &[f32]) -> Result<()> {
        let lib = lib()?;
        let n = sample_count(samples)?;
        unsafe {
            (lib.vad_accept_waveform)(self.ptr, samples.as_ptr(), n);
            (lib.vad_clear)(self.ptr);
        }
        Ok(())
    }

    fn is_detected(&self) -> bool {
        lib()
            .map(|lib| unsafe { (lib.vad_detected)(self.ptr) } != 0)
            .unwrap_or(false)
    }

    fn reset(&mut self) {
        if let Ok(lib) = lib() {
            unsafe { (lib.vad_reset)(self.ptr) };
        }
    }
}

impl Drop for SherpaVad {
    fn drop(&mut self) {
        if let Ok(lib) = lib() {
            unsafe { (lib.destroy_vad)(self.ptr) };
        }
    }
}
