//! Continuous recognition session with endpoint-driven segmentation.
//!
//! ```text
//! Listening --chunk--> Listening (partial emitted)
//! Listening --endpoint--> final emitted, recognizer reset, new id --> Listening
//! Listening --finish--> final emitted, done --> Closed
//! ```
//!
//! Every chunk is fed, then all ready decode steps are drained, and only then
//! is the hypothesis read. Token end times are the elapsed audio time at which
//! each token first appeared.

use crate::audio::{SAMPLE_RATE, samples_to_secs};
use crate::error::{Error, Result};
use crate::id::IdGenerator;
use crate::postprocess::TextPostProcessor;
use crate::traits::{AsrRecognizer, RecognizerKind};
use crate::types::{Alignment, OutputEvent, RecognitionResult, TokenTrack, TranscriptSegment};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Listening,
    Closed,
}

/// State of one live transcription stream.
pub struct StreamSession<R: AsrRecognizer, G> {
    recognizer: R,
    stream: R::Stream,
    ids: G,
    post: TextPostProcessor,
    alignment: bool,
    state: SessionState,
    segment_id: String,
    segment_start: f64,
    samples_fed: usize,
    tracks: Vec<TokenTrack>,
}

impl<R: AsrRecognizer, G: IdGenerator> StreamSession<R, G> {
    /// Open a session over a streaming recognizer.
    ///
    /// # Errors
    ///
    /// [`Error::ModeUnsupported`] for offline recognizers, before any audio is read.
    pub fn new(recognizer: R, mut ids: G, post: TextPostProcessor) -> Result<Self> {
        if recognizer.kind() == RecognizerKind::Offline {
            return Err(Error::ModeUnsupported);
        }

        let stream = recognizer.create_stream()?;
        let segment_id = ids.next_id();

        Ok(Self {
            recognizer,
            stream,
            ids,
            post,
            alignment: true,
            state: SessionState::Listening,
            segment_id,
            segment_start: 0.0,
            samples_fed: 0,
            tracks: Vec::new(),
        })
    }

    /// Attach token alignment arrays to final segments (default on).
    pub fn with_alignment(mut self, alignment: bool) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn segment_id(&self) -> &str {
        &self.segment_id
    }

    /// Seconds of audio fed so far.
    pub fn elapsed(&self) -> f64 {
        samples_to_secs(self.samples_fed)
    }

    pub fn token_tracks(&self) -> &[TokenTrack] {
        &self.tracks
    }

    /// Feed one chunk and collect the resulting partial and final segments.
    pub fn accept_samples(&mut self, samples: &[f32]) -> Result<Vec<OutputEvent>> {
        if self.state == SessionState::Closed {
            tracing::warn!(samples = samples.len(), "ignoring audio after session close");
            return Ok(Vec::new());
        }

        self.recognizer
            .accept_waveform(&mut self.stream, samples, SAMPLE_RATE)?;
        self.samples_fed += samples.len();
        let steps = self.recognizer.decode_ready(&mut self.stream)?;
        tracing::trace!(samples = samples.len(), steps, "decoded chunk");

        let result = self.recognizer.result(&self.stream)?;
        self.observe(&result);

        let mut events = Vec::new();

        let text = self.post.partial(&result.text);
        if !text.is_empty() {
            events.push(
                TranscriptSegment::partial(&self.segment_id, text, self.segment_start, self.elapsed())
                    .into(),
            );
        }

        if self.recognizer.is_endpoint(&self.stream)
            && let Some(segment) = self.finalize()?
        {
            events.push(segment.into());
        }

        Ok(events)
    }

    /// Commit trailing speech and close the session.
    ///
    /// Returns the final segment (if any) followed by the done marker. Later
    /// calls return nothing.
    pub fn finish(&mut self) -> Result<Vec<OutputEvent>> {
        if self.state == SessionState::Closed {
            return Ok(Vec::new());
        }

        self.recognizer.input_finished(&mut self.stream);
        self.recognizer.decode_ready(&mut self.stream)?;

        let mut events = Vec::new();
        if let Some(segment) = self.finalize()? {
            events.push(segment.into());
        }
        events.push(OutputEvent::done());

        self.state = SessionState::Closed;
        tracing::info!(elapsed = self.elapsed(), "stream session closed");

        Ok(events)
    }

    /// Record one track entry per token not seen before.
    fn observe(&mut self, result: &RecognitionResult) {
        let elapsed = self.elapsed();
        let seen = self.tracks.len();
        self.tracks
            .extend(result.tokens.iter().skip(seen).map(|token| TokenTrack {
                token: token.clone(),
                end_time: elapsed,
            }));
    }

    fn track_alignment(&self) -> Alignment {
        let mut start = self.segment_start;
        let mut alignment = Alignment::default();
        for track in &self.tracks {
            alignment.tokens.push(track.token.clone());
            alignment.timestamps.push(start);
            alignment.durations.push(track.end_time - start);
            start = track.end_time;
        }
        alignment
    }

    /// Emit the committed utterance, then start a new one.
    fn finalize(&mut self) -> Result<Option<TranscriptSegment>> {
        let result = self.recognizer.result(&self.stream)?;
        self.observe(&result);
        let elapsed = self.elapsed();

        let segment = if result.text.trim().is_empty() {
            None
        } else {
            let text = self.post.finalize(&result.text)?;
            let end = self.tracks.last().map_or(elapsed, |t| t.end_time);
            let mut segment =
                TranscriptSegment::final_text(&self.segment_id, text, self.segment_start, end);
            if self.alignment && !self.tracks.is_empty() {
                segment = segment.with_alignment(self.track_alignment());
            }
            Some(segment).filter(|s| !s.text.is_empty())
        };

        if let Some(segment) = &segment {
            tracing::debug!(
                id = %segment.id,
                start = segment.start,
                end = segment.end,
                tokens = self.tracks.len(),
                "segment finalized"
            );
        }

        self.recognizer.reset(&mut self.stream)?;
        self.segment_id = self.ids.next_id();
        self.segment_start = elapsed;
        self.tracks.clear();

        Ok(segment)
    }
}
