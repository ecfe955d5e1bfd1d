//! Waveform codec: 16-bit PCM bytes to normalized samples and back.

use hound::{SampleFormat, WavSpec};

/// Sample rate expected by every engine in the pipeline (16kHz)
pub const SAMPLE_RATE: u32 = 16000;

/// Scale between `i16` samples and normalized `f32` samples.
pub(crate) const PCM_SCALE: f32 = 32768.0;

/// Decode signed 16-bit little-endian PCM into normalized samples in `[-1.0, 1.0)`.
///
/// A trailing odd byte is ignored; use [`PcmDecoder`] when bytes arrive in
/// arbitrary pieces.
pub fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM_SCALE)
        .collect()
}

/// Encode normalized samples as signed 16-bit little-endian PCM.
///
/// Samples are clamped to `[-1.0, 1.0]` first.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| {
            let v = (s.clamp(-1.0, 1.0) * PCM_SCALE).clamp(i16::MIN as f32, i16::MAX as f32);
            (v as i16).to_le_bytes()
        })
        .collect()
}

/// Convert a sample count to seconds at [`SAMPLE_RATE`].
pub fn samples_to_secs(samples: usize) -> f64 {
    samples as f64 / SAMPLE_RATE as f64
}

/// Incremental PCM decoder that keeps a dangling byte between pushes.
///
/// Reads from a pipe can end in the middle of a sample; the odd byte is
/// carried over and joined with the first byte of the next push.
#[derive(Debug, Default)]
pub struct PcmDecoder {
    carry: Option<u8>,
}

impl PcmDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next piece of the byte stream.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<f32> {
        let mut rest = bytes;
        let mut out = Vec::with_capacity(bytes.len().div_ceil(2));

        if let Some(low) = self.carry.take() {
            match rest.split_first() {
                Some((&high, tail)) => {
                    out.push(i16::from_le_bytes([low, high]) as f32 / PCM_SCALE);
                    rest = tail;
                }
                None => {
                    self.carry = Some(low);
                    return out;
                }
            }
        }

        out.extend(pcm16_to_f32(rest));

        if rest.len() % 2 == 1 {
            self.carry = rest.last().copied();
        }

        out
    }

    /// Whether a partial sample is waiting for its second byte.
    pub fn has_pending_byte(&self) -> bool {
        self.carry.is_some()
    }
}

/// Whether a WAV spec can be decoded in-process without resampling.
pub fn is_native_wav(spec: &WavSpec) -> bool {
    spec.sample_rate == SAMPLE_RATE
        && spec.channels == 1
        && spec.bits_per_sample == 16
        && spec.sample_format == SampleFormat::Int
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pcm_extremes() {
        let bytes = [0x00, 0x80, 0xff, 0x7f, 0x00, 0x00];
        let samples = pcm16_to_f32(&bytes);

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], -1.0);
        assert!((samples[1] - 32767.0 / 32768.0).abs() < 1e-6);
        assert_eq!(samples[2], 0.0);
    }

    #[test]
    fn encodes_and_clamps() {
        let bytes = f32_to_pcm16(&[2.0, -2.0, 0.5]);

        assert_eq!(&bytes[0..2], &i16::MAX.to_le_bytes());
        assert_eq!(&bytes[2..4], &i16::MIN.to_le_bytes());
        assert_eq!(&bytes[4..6], &16384i16.to_le_bytes());
    }

    #[test]
    fn decoder_joins_split_samples() {
        let bytes = f32_to_pcm16(&[0.25, -0.5, 0.75]);
        let mut decoder = PcmDecoder::new();

        let mut samples = decoder.push(&bytes[..3]);
        assert!(decoder.has_pending_byte());
        samples.extend(decoder.push(&bytes[3..4]));
        assert!(!decoder.has_pending_byte());
        samples.extend(decoder.push(&bytes[4..]));

        assert_eq!(samples, pcm16_to_f32(&bytes));
    }

    #[test]
    fn decoder_keeps_carry_on_empty_push() {
        let mut decoder = PcmDecoder::new();

        assert!(decoder.push(&[0x01]).is_empty());
        assert!(decoder.push(&[]).is_empty());
        assert_eq!(decoder.push(&[0x00]).len(), 1);
    }

    #[test]
    fn native_wav_detection() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        assert!(is_native_wav(&spec));
        assert!(!is_native_wav(&WavSpec { channels: 2, ..spec }));
        assert!(!is_native_wav(&WavSpec {
            sample_rate: 44100,
            ..spec
        }));
    }
}
