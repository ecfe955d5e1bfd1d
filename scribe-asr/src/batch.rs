//! Whole-file transcription.
//!
//! The source is segmented first; each unit then gets its own recognizer
//! stream, so no state carries over between units. Segments come out in
//! source order.

use crate::audio::SAMPLE_RATE;
use crate::error::Result;
use crate::id::IdGenerator;
use crate::postprocess::TextPostProcessor;
use crate::segmentation::{SegmentEvent, SegmenterConfig, segment};
use crate::traits::{AsrRecognizer, VoiceActivityDetector};
use crate::transcode::Transcoder;
use crate::types::{Alignment, SegmentationUnit, TranscriptSegment};
use std::path::Path;

pub struct BatchPipeline<R, G> {
    recognizer: R,
    ids: G,
    post: TextPostProcessor,
    segmenter: SegmenterConfig,
    alignment: bool,
}

impl<R: AsrRecognizer, G: IdGenerator> BatchPipeline<R, G> {
    pub fn new(recognizer: R, ids: G, post: TextPostProcessor, segmenter: SegmenterConfig) -> Self {
        Self {
            recognizer,
            ids,
            post,
            segmenter,
            alignment: true,
        }
    }

    /// Attach token alignment arrays to segments (default on).
    pub fn with_alignment(mut self, alignment: bool) -> Self {
        self.alignment = alignment;
        self
    }

    /// Decode `input` and transcribe it.
    pub fn transcribe_file<V: VoiceActivityDetector>(
        &mut self,
        input: &Path,
        transcoder: &Transcoder,
        vad: Option<V>,
        on_progress: impl FnMut(u8),
    ) -> Result<Vec<TranscriptSegment>> {
        let samples = transcoder.decode_file(input)?;
        tracing::info!(
            path = %input.display(),
            duration = crate::audio::samples_to_secs(samples.len()),
            vad = vad.is_some(),
            "transcribing file"
        );
        self.transcribe(&samples, vad, on_progress)
    }

    /// Transcribe an already decoded 16 kHz sample buffer.
    ///
    /// `on_progress` receives increasing percentages of samples segmented.
    pub fn transcribe<V: VoiceActivityDetector>(
        &mut self,
        samples: &[f32],
        vad: Option<V>,
        mut on_progress: impl FnMut(u8),
    ) -> Result<Vec<TranscriptSegment>> {
        let mut segments = segment(samples, vad, &self.segmenter);
        let mut out = Vec::new();
        let mut units = 0usize;

        for event in segments.by_ref() {
            match event? {
                SegmentEvent::Progress(pct) => on_progress(pct),
                SegmentEvent::Unit(unit) => {
                    units += 1;
                    if let Some(segment) = self.transcribe_unit(unit)? {
                        out.push(segment);
                    }
                }
            }
        }

        tracing::info!(
            units,
            segments = out.len(),
            discarded = segments.discarded_samples(),
            "batch transcription finished"
        );

        Ok(out)
    }

    /// Recognize one unit on a fresh stream.
    pub fn transcribe_unit(&mut self, unit: SegmentationUnit) -> Result<Option<TranscriptSegment>> {
        let mut stream = self.recognizer.create_stream()?;
        self.recognizer
            .accept_waveform(&mut stream, &unit.samples, SAMPLE_RATE)?;
        self.recognizer.input_finished(&mut stream);
        self.recognizer.decode_ready(&mut stream)?;
        let result = self.recognizer.result(&stream)?;

        if result.text.trim().is_empty() {
            return Ok(None);
        }

        let end = unit.end_time();
        let start = unit.start_time();
        let text = self.post.finalize(&result.text)?;
        if text.is_empty() {
            return Ok(None);
        }

        let mut segment = TranscriptSegment::final_text(self.ids.next_id(), text, start, end);

        if self.alignment && !result.tokens.is_empty() {
            let timestamps = result
                .timestamps
                .iter()
                .map(|&t| start + f64::from(t))
                .collect();
            match Alignment::from_starts(result.tokens, timestamps, end) {
                Some(alignment) => segment = segment.with_alignment(alignment),
                None => tracing::warn!(
                    id = %segment.id,
                    "token and timestamp counts differ, alignment omitted"
                ),
            }
        }

        tracing::debug!(id = %segment.id, start, end, "unit transcribed");

        Ok(Some(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SequentialIdGen;
    use crate::traits::RecognizerKind;
    use crate::types::RecognitionResult;

    /// Offline-style recognizer that reports one word per second of audio.
    struct CountingRecognizer;

    #[derive(Default)]
    struct CountingStream {
        samples: usize,
        finished: bool,
        decoded: bool,
    }

    impl AsrRecognizer for CountingRecognizer {
        type Stream = CountingStream;

        fn kind(&self) -> RecognizerKind {
            RecognizerKind::Offline
        }

        fn create_stream(&self) -> Result<CountingStream> {
            Ok(CountingStream::default())
        }

        fn accept_waveform(&self, stream: &mut CountingStream, samples: &[f32], _: u32) -> Result<()> {
            stream.samples += samples.iter().filter(|s| s.abs() > 0.1).count();
            Ok(())
        }

        fn input_finished(&self, stream: &mut CountingStream) {
            stream.finished = true;
        }

        fn is_ready(&self, stream: &CountingStream) -> bool {
            stream.finished && !stream.decoded
        }

        fn decode(&self, stream: &mut CountingStream) -> Result<()> {
            stream.decoded = true;
            Ok(())
        }

        fn result(&self, stream: &CountingStream) -> Result<RecognitionResult> {
            if !stream.decoded {
                return Ok(RecognitionResult::default());
            }
            let words = stream.samples / SAMPLE_RATE as usize;
            Ok(RecognitionResult {
                text: vec!["WORD"; words].join(" "),
                tokens: vec!["WORD".to_string(); words],
                timestamps: (0..words).map(|i| i as f32).collect(),
            })
        }

        fn is_endpoint(&self, _: &CountingStream) -> bool {
            false
        }

        fn reset(&self, stream: &mut CountingStream) -> Result<()> {
            *stream = CountingStream::default();
            Ok(())
        }
    }

    fn pipeline() -> BatchPipeline<CountingRecognizer, SequentialIdGen> {
        BatchPipeline::new(
            CountingRecognizer,
            SequentialIdGen::default(),
            TextPostProcessor::default(),
            SegmenterConfig::default(),
        )
    }

    #[test]
    fn unit_timestamps_are_offset_by_start() {
        let unit = SegmentationUnit::new(vec![0.5; 2 * SAMPLE_RATE as usize], 5 * SAMPLE_RATE as usize);

        let segment = pipeline().transcribe_unit(unit).unwrap().unwrap();

        assert_eq!(segment.id, "seg-0");
        assert_eq!(segment.text, "Word word");
        assert_eq!((segment.start, segment.end), (3.0, 5.0));
        assert_eq!(segment.timestamps.as_deref(), Some(&[3.0, 4.0][..]));
        assert_eq!(segment.durations.as_deref(), Some(&[1.0, 1.0][..]));
        assert!(segment.is_final);
    }

    #[test]
    fn silent_unit_yields_nothing() {
        let unit = SegmentationUnit::new(vec![0.0; SAMPLE_RATE as usize], SAMPLE_RATE as usize);

        assert!(pipeline().transcribe_unit(unit).unwrap().is_none());
    }

    #[test]
    fn fixed_chunks_produce_ordered_segments_and_progress() {
        let samples = vec![0.5; 75 * SAMPLE_RATE as usize];
        let mut progress = Vec::new();

        let segments = pipeline()
            .transcribe::<crate::sherpa::SherpaVad>(&samples, None, |p| progress.push(p))
            .unwrap();

        assert_eq!(segments.len(), 3);
        assert_eq!(
            segments.iter().map(|s| (s.start, s.end)).collect::<Vec<_>>(),
            vec![(0.0, 30.0), (30.0, 60.0), (60.0, 75.0)]
        );
        assert_eq!(progress, vec![40, 80, 100]);
        let ids: Vec<&str> = segments.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["seg-0", "seg-1", "seg-2"]);
    }

    #[test]
    fn alignment_can_be_disabled() {
        let unit = SegmentationUnit::new(vec![0.5; SAMPLE_RATE as usize], SAMPLE_RATE as usize);

        let segment = pipeline()
            .with_alignment(false)
            .transcribe_unit(unit)
            .unwrap()
            .unwrap();

        assert!(segment.tokens.is_none());
    }
}
