//! SubRip export of batch transcripts.
//!
//! Only committed text becomes a cue. Partial hypotheses and segments whose
//! text is blank after trimming are dropped, and cue numbers stay consecutive
//! over what remains.

use scribe_asr::types::TranscriptSegment;
use srtlib::{Subtitle, Timestamp};

/// Final, non-blank segments as numbered cues.
pub fn to_subtitles(segments: &[TranscriptSegment]) -> Vec<Subtitle> {
    segments
        .iter()
        .filter(|s| s.is_final)
        .filter_map(|s| {
            let text = s.text.trim();
            (!text.is_empty()).then(|| (text, s.start, s.end))
        })
        .zip(1..)
        .map(|((text, start, end), num)| {
            Subtitle::new(num, timestamp(start), timestamp(end.max(start)), text.to_string())
        })
        .collect()
}

/// Cue time at millisecond precision; negative offsets clamp to zero.
fn timestamp(secs: f64) -> Timestamp {
    Timestamp::from_milliseconds((secs.max(0.0) * 1000.0).round() as u32)
}

/// SRT file content for a transcript.
pub fn render(segments: &[TranscriptSegment]) -> String {
    to_subtitles(segments)
        .iter()
        .map(Subtitle::to_string)
        .collect::<Vec<_>>()
        .join("\n\n")
}
