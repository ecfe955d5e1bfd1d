//! Core types for scribe-asr

use serde::{Deserialize, Serialize};

/// One utterance-level unit of transcript output.
///
/// Partial segments (`is_final == false`) carry no alignment arrays. Final
/// segments carry `tokens`, `timestamps` and `durations` of equal length when
/// alignment was requested.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    /// Stable for one utterance in stream mode, fresh per unit in batch mode
    pub id: String,
    /// Post-processed transcript text, never empty when emitted
    pub text: String,
    /// Start time in seconds from the beginning of the source
    pub start: f64,
    /// End time in seconds from the beginning of the source
    pub end: f64,
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durations: Option<Vec<f64>>,
}

impl TranscriptSegment {
    /// In-progress hypothesis for the current utterance.
    pub fn partial(id: impl Into<String>, text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            start,
            end: end.max(start),
            is_final: false,
            tokens: None,
            timestamps: None,
            durations: None,
        }
    }

    /// Committed utterance without alignment arrays.
    pub fn final_text(id: impl Into<String>, text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            is_final: true,
            ..Self::partial(id, text, start, end)
        }
    }

    /// Attach token alignment to a final segment.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.tokens = Some(alignment.tokens);
        self.timestamps = Some(alignment.timestamps);
        self.durations = Some(alignment.durations);
        self
    }
}

/// Parallel token, start-offset and duration arrays of a final segment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Alignment {
    pub tokens: Vec<String>,
    pub timestamps: Vec<f64>,
    pub durations: Vec<f64>,
}

impl Alignment {
    /// Build alignment from token start offsets.
    ///
    /// Each duration runs to the next token's start; the last one runs to
    /// `end`. Returns `None` when the arrays differ in length.
    pub fn from_starts(tokens: Vec<String>, timestamps: Vec<f64>, end: f64) -> Option<Self> {
        if tokens.len() != timestamps.len() {
            return None;
        }

        let durations = timestamps
            .iter()
            .enumerate()
            .map(|(i, &start)| timestamps.get(i + 1).copied().unwrap_or(end) - start)
            .collect();

        Some(Self {
            tokens,
            timestamps,
            durations,
        })
    }
}

/// A token observed by a stream session and the elapsed time when it first appeared.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenTrack {
    pub token: String,
    /// Elapsed seconds of fed audio at the time the token appeared
    pub end_time: f64,
}

/// A window of samples produced by the segmentation engine.
///
/// The consumer takes ownership of `samples`.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentationUnit {
    pub samples: Vec<f32>,
    /// Index one past the last source sample contained in `samples`
    pub end_sample_index: usize,
    /// Duration of `samples` in seconds
    pub duration: Option<f64>,
}

impl SegmentationUnit {
    pub fn new(samples: Vec<f32>, end_sample_index: usize) -> Self {
        let duration = Some(crate::audio::samples_to_secs(samples.len()));
        Self {
            samples,
            end_sample_index,
            duration,
        }
    }

    /// End of the unit in seconds from the start of the source.
    pub fn end_time(&self) -> f64 {
        crate::audio::samples_to_secs(self.end_sample_index)
    }

    /// Start of the unit in seconds, clamped at zero.
    pub fn start_time(&self) -> f64 {
        let duration = self
            .duration
            .unwrap_or_else(|| crate::audio::samples_to_secs(self.samples.len()));
        (self.end_time() - duration).max(0.0)
    }
}

/// Snapshot of the recognizer's current hypothesis.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Token start offsets in seconds, relative to the stream start
    #[serde(default)]
    pub timestamps: Vec<f32>,
}

/// One line of the process boundary protocol.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputEvent {
    Segment(TranscriptSegment),
    Progress { progress: u8 },
    Done { done: bool },
    Error { error: String },
}

impl OutputEvent {
    pub fn done() -> Self {
        OutputEvent::Done { done: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        OutputEvent::Error {
            error: message.into(),
        }
    }
}

impl From<TranscriptSegment> for OutputEvent {
    fn from(segment: TranscriptSegment) -> Self {
        OutputEvent::Segment(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_serializes_without_alignment() {
        let segment = TranscriptSegment::partial("a", "hello", 0.0, 1.5);

        let value = serde_json::to_value(&segment).unwrap();

        assert_eq!(
            value,
            json!({"id": "a", "text": "hello", "start": 0.0, "end": 1.5, "isFinal": false})
        );
    }

    #[test]
    fn final_serializes_alignment_arrays() {
        let alignment =
            Alignment::from_starts(vec!["he".into(), "llo".into()], vec![0.0, 0.5], 1.0).unwrap();
        let segment = TranscriptSegment::final_text("b", "hello", 0.0, 1.0).with_alignment(alignment);

        let value = serde_json::to_value(OutputEvent::from(segment)).unwrap();

        assert_eq!(value["isFinal"], json!(true));
        assert_eq!(value["tokens"], json!(["he", "llo"]));
        assert_eq!(value["timestamps"], json!([0.0, 0.5]));
        assert_eq!(value["durations"], json!([0.5, 0.5]));
    }

    #[test]
    fn alignment_rejects_mismatched_lengths() {
        assert!(Alignment::from_starts(vec!["a".into()], vec![], 1.0).is_none());
    }

    #[test]
    fn control_events_serialize_flat() {
        assert_eq!(
            serde_json::to_string(&OutputEvent::done()).unwrap(),
            r#"{"done":true}"#
        );
        assert_eq!(
            serde_json::to_string(&OutputEvent::error("boom")).unwrap(),
            r#"{"error":"boom"}"#
        );
        assert_eq!(
            serde_json::to_string(&OutputEvent::Progress { progress: 42 }).unwrap(),
            r#"{"progress":42}"#
        );
    }

    #[test]
    fn unit_start_is_clamped() {
        let unit = SegmentationUnit {
            samples: vec![0.0; 16000],
            end_sample_index: 8000,
            duration: Some(1.0),
        };

        assert_eq!(unit.start_time(), 0.0);
        assert_eq!(unit.end_time(), 0.5);
    }

    #[test]
    fn parses_engine_result_json() {
        let raw = r#"{"text":" HI","tokens":[" H","I"],"timestamps":[0.12,0.2],"is_final":false}"#;

        let result: RecognitionResult = serde_json::from_str(raw).unwrap();

        assert_eq!(result.text, " HI");
        assert_eq!(result.tokens.len(), 2);
        assert!((result.timestamps[1] - 0.2).abs() < 1e-6);
    }
}
