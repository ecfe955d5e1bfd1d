//! Speech-bounded (VAD) or fixed-duration segmentation of a sample buffer.
//!
//! Both strategies are lazy iterators yielding [`SegmentEvent`]s: units of
//! samples interleaved with progress percentages.
//!
//! VAD mode walks the source in 30 ms windows. Silent windows go into a ring
//! buffer; when speech starts the ring is prepended as pre-roll so onsets are
//! not clipped. Silent windows evicted from the ring are counted as discarded,
//! so `sum(unit samples) + discarded == source length`.

use crate::audio::{SAMPLE_RATE, samples_to_secs};
use crate::chunk::{ChunkConfig, ChunkRangeIter};
use crate::error::{ConfigError, Result};
use crate::traits::VoiceActivityDetector;
use crate::types::SegmentationUnit;
use std::collections::VecDeque;

/// VAD window length: 30 ms at 16 kHz.
pub const VAD_WINDOW_SAMPLES: usize = 480;

const VAD_WINDOW_SECS: f32 = VAD_WINDOW_SAMPLES as f32 / SAMPLE_RATE as f32;

const DEFAULT_RING_SECS: f32 = 1.0;

/// Segmentation tuning.
#[derive(clap::Args, Clone, Copy, Debug)]
pub struct SegmenterConfig {
    /// Seconds of silence kept as pre-roll before detected speech
    #[arg(long = "ring-secs", default_value_t = DEFAULT_RING_SECS)]
    pub ring_secs: f32,

    #[command(flatten)]
    pub chunk: ChunkConfig,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            ring_secs: DEFAULT_RING_SECS,
            chunk: ChunkConfig::default(),
        }
    }
}

impl SegmenterConfig {
    /// Reject chunk lengths and pre-roll the segmenter cannot honor.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let duration = self.chunk.duration;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(ConfigError::InvalidOption {
                name: "chunk-secs",
                reason: format!("must be a positive number of seconds, got {duration}"),
            });
        }
        if !self.ring_secs.is_finite() || self.ring_secs < 0.0 {
            return Err(ConfigError::InvalidOption {
                name: "ring-secs",
                reason: format!("must not be negative, got {}", self.ring_secs),
            });
        }
        Ok(())
    }

    /// Ring buffer capacity in windows.
    pub fn ring_capacity(&self) -> usize {
        (self.ring_secs.max(0.0) / VAD_WINDOW_SECS).floor() as usize
    }
}

#[derive(Debug, PartialEq)]
pub enum SegmentEvent {
    Unit(SegmentationUnit),
    /// Percentage of source samples consumed so far
    Progress(u8),
}

/// Emits a percentage only when its integer value increases.
#[derive(Debug)]
struct ProgressTracker {
    total: usize,
    last: Option<u8>,
}

impl ProgressTracker {
    fn new(total: usize) -> Self {
        Self { total, last: None }
    }

    fn update(&mut self, done: usize) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        let pct = (done.min(self.total) * 100 / self.total) as u8;
        if self.last.is_some_and(|last| pct <= last) {
            return None;
        }
        self.last = Some(pct);
        Some(pct)
    }
}

/// Segment `samples` with `vad` if given, else in fixed chunks.
pub fn segment<'a, V: VoiceActivityDetector>(
    samples: &'a [f32],
    vad: Option<V>,
    config: &SegmenterConfig,
) -> Segments<'a, V> {
    match vad {
        Some(vad) => Segments::Vad(VadSegments::new(samples, vad, config.ring_capacity())),
        None => Segments::Fixed(FixedSegments::new(samples, &config.chunk)),
    }
}

/// Either segmentation strategy.
pub enum Segments<'a, V> {
    Vad(VadSegments<'a, V>),
    Fixed(FixedSegments<'a>),
}

impl<V> Segments<'_, V> {
    /// Samples dropped as silence so far.
    pub fn discarded_samples(&self) -> usize {
        match self {
            Segments::Vad(s) => s.discarded,
            Segments::Fixed(_) => 0,
        }
    }
}

impl<V: VoiceActivityDetector> Iterator for Segments<'_, V> {
    type Item = Result<SegmentEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Segments::Vad(s) => s.next(),
            Segments::Fixed(s) => s.next().map(Ok),
        }
    }
}

/// VAD-gated segmentation with a pre-roll ring buffer.
pub struct VadSegments<'a, V> {
    source: &'a [f32],
    vad: V,
    position: usize,
    ring: VecDeque<&'a [f32]>,
    ring_capacity: usize,
    current: Vec<f32>,
    current_end: usize,
    discarded: usize,
    queued: VecDeque<SegmentEvent>,
    progress: ProgressTracker,
    finished: bool,
}

impl<'a, V: VoiceActivityDetector> VadSegments<'a, V> {
    pub fn new(source: &'a [f32], mut vad: V, ring_capacity: usize) -> Self {
        vad.reset();
        Self {
            source,
            vad,
            position: 0,
            ring: VecDeque::with_capacity(ring_capacity + 1),
            ring_capacity,
            current: Vec::new(),
            current_end: 0,
            discarded: 0,
            queued: VecDeque::new(),
            progress: ProgressTracker::new(source.len()),
            finished: false,
        }
    }

    fn take_unit(&mut self) -> SegmentationUnit {
        let samples = std::mem::take(&mut self.current);
        tracing::debug!(
            end = samples_to_secs(self.current_end),
            duration = samples_to_secs(samples.len()),
            "speech unit"
        );
        SegmentationUnit::new(samples, self.current_end)
    }

    fn push_silence(&mut self, window: &'a [f32]) {
        self.ring.push_back(window);
        while self.ring.len() > self.ring_capacity {
            if let Some(evicted) = self.ring.pop_front() {
                self.discarded += evicted.len();
            }
        }
    }

    fn step(&mut self) -> Result<()> {
        let source = self.source;
        let start = self.position;
        let end = (start + VAD_WINDOW_SAMPLES).min(source.len());
        let window = &source[start..end];
        self.position = end;

        self.vad.accept_waveform(window)?;

        if self.vad.is_detected() {
            if self.current.is_empty() {
                for pre_roll in self.ring.drain(..) {
                    self.current.extend_from_slice(pre_roll);
                }
            }
            self.current.extend_from_slice(window);
            self.current_end = end;
        } else {
            if !self.current.is_empty() {
                let unit = self.take_unit();
                self.queued.push_back(SegmentEvent::Unit(unit));
            }
            self.push_silence(window);
        }

        if let Some(pct) = self.progress.update(self.position) {
            self.queued.push_back(SegmentEvent::Progress(pct));
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.finished = true;
        if !self.current.is_empty() {
            let unit = self.take_unit();
            self.queued.push_back(SegmentEvent::Unit(unit));
        }
        self.discarded += self.ring.drain(..).map(<[f32]>::len).sum::<usize>();
    }
}

impl<V: VoiceActivityDetector> Iterator for VadSegments<'_, V> {
    type Item = Result<SegmentEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            if self.position >= self.source.len() {
                self.finish();
                continue;
            }
            if let Err(e) = self.step() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}

/// Non-overlapping fixed-duration windows regardless of speech activity.
pub struct FixedSegments<'a> {
    source: &'a [f32],
    ranges: ChunkRangeIter,
    progress: ProgressTracker,
    pending_progress: Option<u8>,
}

impl<'a> FixedSegments<'a> {
    pub fn new(source: &'a [f32], config: &ChunkConfig) -> Self {
        Self {
            source,
            ranges: config.iter_ranges(source.len()),
            progress: ProgressTracker::new(source.len()),
            pending_progress: None,
        }
    }
}

impl Iterator for FixedSegments<'_> {
    type Item = SegmentEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(pct) = self.pending_progress.take() {
            return Some(SegmentEvent::Progress(pct));
        }

        let range = self.ranges.next()?;
        self.pending_progress = self.progress.update(range.end);
        let unit = SegmentationUnit::new(self.source[range.clone()].to_vec(), range.end);
        Some(SegmentEvent::Unit(unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Speech whenever the window's peak amplitude exceeds a threshold.
    struct AmplitudeVad {
        detected: bool,
        windows: usize,
    }

    impl AmplitudeVad {
        fn new() -> Self {
            Self {
                detected: false,
                windows: 0,
            }
        }
    }

    impl VoiceActivityDetector for AmplitudeVad {
        fn accept_waveform(&mut self, samples: &[f32]) -> Result<()> {
            self.windows += 1;
            self.detected = samples.iter().any(|s| s.abs() > 0.1);
            Ok(())
        }

        fn is_detected(&self) -> bool {
            self.detected
        }

        fn reset(&mut self) {
            self.detected = false;
        }
    }

    fn secs(n: f32) -> usize {
        (n * SAMPLE_RATE as f32) as usize
    }

    fn signal(parts: &[(f32, f32)]) -> Vec<f32> {
        parts
            .iter()
            .flat_map(|&(duration, level)| std::iter::repeat_n(level, secs(duration)))
            .collect()
    }

    fn units<V: VoiceActivityDetector>(segments: &mut Segments<'_, V>) -> Vec<SegmentationUnit> {
        segments
            .by_ref()
            .filter_map(|event| match event.unwrap() {
                SegmentEvent::Unit(unit) => Some(unit),
                SegmentEvent::Progress(_) => None,
            })
            .collect()
    }

    #[test]
    fn ring_capacity_in_windows() {
        let config = SegmenterConfig {
            ring_secs: 1.0,
            ..SegmenterConfig::default()
        };
        assert_eq!(config.ring_capacity(), 33);
        assert_eq!(
            SegmenterConfig {
                ring_secs: 0.0,
                ..config
            }
            .ring_capacity(),
            0
        );
    }

    #[test]
    fn silence_speech_silence_yields_one_unit_with_pre_roll() {
        let audio = signal(&[(5.0, 0.0), (2.0, 0.5), (3.0, 0.0)]);
        let config = SegmenterConfig::default();

        let mut segments = segment(&audio, Some(AmplitudeVad::new()), &config);
        let units = units(&mut segments);

        assert_eq!(units.len(), 1);
        let unit = &units[0];
        let expected = secs(3.0) as i64;
        let tolerance = 2 * VAD_WINDOW_SAMPLES as i64;
        assert!((unit.samples.len() as i64 - expected).abs() <= tolerance);

        // Pre-roll is silence, the speech follows it intact.
        let speech = unit.samples.iter().filter(|s| s.abs() > 0.1).count();
        assert_eq!(speech, secs(2.0));
        assert!(unit.samples[..secs(0.9)].iter().all(|s| *s == 0.0));

        assert!((unit.end_time() - 7.0).abs() < 0.05);
        assert!((unit.start_time() - 4.0).abs() < 0.05);
    }

    #[test]
    fn vad_round_trip_accounts_for_every_sample() {
        let audio = signal(&[
            (0.7, 0.0),
            (1.3, 0.4),
            (0.2, 0.0),
            (0.5, -0.3),
            (2.1, 0.0),
            (0.9, 0.6),
        ]);
        let config = SegmenterConfig {
            ring_secs: 0.5,
            ..SegmenterConfig::default()
        };

        let mut segments = segment(&audio, Some(AmplitudeVad::new()), &config);
        let units = units(&mut segments);
        let kept: usize = units.iter().map(|u| u.samples.len()).sum();

        assert_eq!(units.len(), 3);
        assert_eq!(kept + segments.discarded_samples(), audio.len());
        // Trailing speech is flushed at end of input.
        assert_eq!(units[2].end_sample_index, audio.len());
    }

    #[test]
    fn units_are_ordered_and_non_overlapping() {
        let audio = signal(&[(1.0, 0.0), (1.0, 0.5), (1.0, 0.0), (1.0, 0.5), (1.0, 0.0)]);

        let mut segments = segment(&audio, Some(AmplitudeVad::new()), &SegmenterConfig::default());
        let units = units(&mut segments);

        assert_eq!(units.len(), 2);
        assert!(units[0].end_sample_index <= units[1].end_sample_index - units[1].samples.len());
    }

    #[test]
    fn progress_is_increasing_and_complete() {
        let audio = signal(&[(2.0, 0.0), (1.0, 0.5)]);

        let progress: Vec<u8> = segment(&audio, Some(AmplitudeVad::new()), &SegmenterConfig::default())
            .filter_map(|event| match event.unwrap() {
                SegmentEvent::Progress(p) => Some(p),
                SegmentEvent::Unit(_) => None,
            })
            .collect();

        assert!(progress.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(progress.last(), Some(&100));
    }

    #[test]
    fn all_silence_yields_no_units() {
        let audio = signal(&[(3.0, 0.0)]);

        let mut segments = segment(&audio, Some(AmplitudeVad::new()), &SegmenterConfig::default());

        assert!(units(&mut segments).is_empty());
        assert_eq!(segments.discarded_samples(), audio.len());
    }

    #[test]
    fn empty_source_yields_nothing() {
        let mut segments = segment(&[], Some(AmplitudeVad::new()), &SegmenterConfig::default());

        assert!(segments.next().is_none());
    }

    #[test]
    fn vad_errors_stop_iteration() {
        struct FailingVad;
        impl VoiceActivityDetector for FailingVad {
            fn accept_waveform(&mut self, _: &[f32]) -> Result<()> {
                Err(crate::error::EngineError::Other("vad failed".into()).into())
            }
            fn is_detected(&self) -> bool {
                false
            }
            fn reset(&mut self) {}
        }

        let audio = vec![0.0; 4800];
        let mut segments = segment(&audio, Some(FailingVad), &SegmenterConfig::default());

        assert!(matches!(segments.next(), Some(Err(_))));
        assert!(segments.next().is_none());
    }

    #[test]
    fn validate_rejects_unusable_lengths() {
        let with = |ring_secs: f32, duration: f32| SegmenterConfig {
            ring_secs,
            chunk: ChunkConfig::new(duration),
        };

        assert!(SegmenterConfig::default().validate().is_ok());
        assert!(with(0.0, 5.0).validate().is_ok());

        for (config, option) in [
            (with(1.0, 0.0), "chunk-secs"),
            (with(1.0, -3.0), "chunk-secs"),
            (with(1.0, f32::NAN), "chunk-secs"),
            (with(-0.5, 30.0), "ring-secs"),
        ] {
            match config.validate() {
                Err(ConfigError::InvalidOption { name, .. }) => assert_eq!(name, option),
                other => panic!("expected {option} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn fixed_chunks_cover_source() {
        let audio = vec![0.25; secs(75.0)];

        let events: Vec<SegmentEvent> = segment::<AmplitudeVad>(&audio, None, &SegmenterConfig::default())
            .map(|e| e.unwrap())
            .collect();

        match events.as_slice() {
            [
                SegmentEvent::Unit(a),
                SegmentEvent::Progress(40),
                SegmentEvent::Unit(b),
                SegmentEvent::Progress(80),
                SegmentEvent::Unit(c),
                SegmentEvent::Progress(100),
            ] => {
                assert_eq!(a.samples.len(), secs(30.0));
                assert_eq!(b.end_sample_index, secs(60.0));
                assert_eq!(c.samples.len(), secs(15.0));
                assert!((c.start_time() - 60.0).abs() < 1e-9);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }
}
