//! Fixed-duration chunking used when no VAD model is available.

use crate::audio::SAMPLE_RATE;

/// Default chunk duration in seconds
const DEFAULT_CHUNK_DURATION: f32 = 30.0;

/// Configuration for fixed-duration chunking.
#[derive(clap::Args, Clone, Copy, Debug)]
pub struct ChunkConfig {
    /// Fixed window duration in seconds when no VAD model is given
    #[arg(long = "chunk-secs", default_value_t = DEFAULT_CHUNK_DURATION)]
    pub duration: f32,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_CHUNK_DURATION,
        }
    }
}

impl ChunkConfig {
    /// Create a new chunk configuration.
    pub fn new(duration_sec: f32) -> Self {
        Self {
            duration: duration_sec,
        }
    }

    /// Get chunk size in samples (at least one sample).
    pub fn chunk_samples(&self) -> usize {
        ((self.duration * SAMPLE_RATE as f32) as usize).max(1)
    }

    /// Sample ranges of consecutive chunks covering `len` samples.
    pub fn iter_ranges(&self, len: usize) -> ChunkRangeIter {
        ChunkRangeIter {
            len,
            chunk_size: self.chunk_samples(),
            position: 0,
        }
    }
}

/// Iterator over non-overlapping chunk ranges.
#[derive(Clone, Debug)]
pub struct ChunkRangeIter {
    len: usize,
    chunk_size: usize,
    position: usize,
}

impl Iterator for ChunkRangeIter {
    type Item = std::ops::Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.len {
            return None;
        }

        let start = self.position;
        let end = (start + self.chunk_size).min(self.len);
        self.position = end;

        Some(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_audio_returns_single_range() {
        let len = 10 * SAMPLE_RATE as usize;
        let config = ChunkConfig::new(30.0);

        let ranges: Vec<_> = config.iter_ranges(len).collect();

        assert_eq!(ranges, vec![0..len]);
    }

    #[test]
    fn long_audio_splits_without_overlap() {
        let len = 75 * SAMPLE_RATE as usize;
        let config = ChunkConfig::new(30.0);

        let ranges: Vec<_> = config.iter_ranges(len).collect();

        // Chunks at: 0, 30, 60 (last one 15s)
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[1].start, 30 * SAMPLE_RATE as usize);
        assert_eq!(ranges[2].start, 60 * SAMPLE_RATE as usize);
        assert_eq!(ranges[2].len(), 15 * SAMPLE_RATE as usize);

        let total: usize = ranges.iter().map(|r| r.len()).sum();
        assert_eq!(total, len);
    }

    #[test]
    fn empty_audio_yields_nothing() {
        let config = ChunkConfig::default();
        assert!(config.iter_ranges(0).next().is_none());
    }

    #[test]
    fn chunk_samples_calculation() {
        let config = ChunkConfig::new(30.0);

        assert_eq!(config.chunk_samples(), 30 * SAMPLE_RATE as usize);
        assert_eq!(ChunkConfig::new(0.0).chunk_samples(), 1);
    }
}
