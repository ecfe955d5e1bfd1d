//! Contracts of the external engines the pipeline drives.
//!
//! The recognition, voice-activity and punctuation engines are opaque
//! collaborators. These traits are the seams: the [`crate::sherpa`] backend
//! implements them over the native library, tests implement them with
//! scripted mocks.

use crate::error::Result;
use crate::types::RecognitionResult;

/// Whether a recognizer can decode incrementally with endpoint detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecognizerKind {
    /// Incremental decoding, engine-side endpoint detection
    Streaming,
    /// Whole-utterance decoding only
    Offline,
}

/// Uniform recognizer contract regardless of the concrete engine.
///
/// Callers must drain decode steps after every feed:
///
/// ```ignore
/// recognizer.accept_waveform(&mut stream, &samples, SAMPLE_RATE)?;
/// while recognizer.is_ready(&stream) {
///     recognizer.decode(&mut stream)?;
/// }
/// let result = recognizer.result(&stream)?;
/// ```
pub trait AsrRecognizer {
    /// Per-utterance decoding state.
    type Stream;

    fn kind(&self) -> RecognizerKind;

    fn create_stream(&self) -> Result<Self::Stream>;

    /// Append a waveform chunk. May be called repeatedly before decoding.
    fn accept_waveform(&self, stream: &mut Self::Stream, samples: &[f32], sample_rate: u32)
    -> Result<()>;

    /// Signal that no more audio follows so trailing frames become decodable.
    fn input_finished(&self, stream: &mut Self::Stream);

    fn is_ready(&self, stream: &Self::Stream) -> bool;

    fn decode(&self, stream: &mut Self::Stream) -> Result<()>;

    /// Snapshot of the current hypothesis. Idempotent between feeds.
    fn result(&self, stream: &Self::Stream) -> Result<RecognitionResult>;

    /// Engine-side endpoint rules satisfied. Always false for offline engines.
    fn is_endpoint(&self, stream: &Self::Stream) -> bool;

    /// Clear decoding state for the next utterance, keeping the stream.
    fn reset(&self, stream: &mut Self::Stream) -> Result<()>;

    /// Run every decode step that is ready, returning how many ran.
    fn decode_ready(&self, stream: &mut Self::Stream) -> Result<usize> {
        let mut steps = 0;
        while self.is_ready(stream) {
            self.decode(stream)?;
            steps += 1;
        }
        Ok(steps)
    }
}

/// Binary speech/silence classifier over consecutive waveform windows.
pub trait VoiceActivityDetector {
    fn accept_waveform(&mut self, samples: &[f32]) -> Result<()>;

    /// Speech state after the most recent window.
    fn is_detected(&self) -> bool;

    fn reset(&mut self);
}

/// Punctuation restoration over committed text.
pub trait Punctuator {
    fn add_punctuation(&self, text: &str) -> Result<String>;
}

impl<V: VoiceActivityDetector + ?Sized> VoiceActivityDetector for Box<V> {
    fn accept_waveform(&mut self, samples: &[f32]) -> Result<()> {
        (**self).accept_waveform(samples)
    }

    fn is_detected(&self) -> bool {
        (**self).is_detected()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

impl<P: Punctuator + ?Sized> Punctuator for Box<P> {
    fn add_punctuation(&self, text: &str) -> Result<String> {
        (**self).add_punctuation(text)
    }
}
