//! Input decoding for batch jobs.
//!
//! 16 kHz mono 16-bit WAV files are read in-process. Everything else goes
//! through an external ffmpeg process writing raw s16le PCM to stdout.

use crate::audio::{PCM_SCALE, SAMPLE_RATE, is_native_wav, pcm16_to_f32};
use crate::error::{Result, TranscodeError};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const DEFAULT_FFMPEG: &str = "ffmpeg";

#[derive(clap::Args, Clone, Debug)]
pub struct TranscodeConfig {
    /// Transcoder executable used for non-WAV input
    #[arg(long, env = "SCRIBE_FFMPEG", default_value = DEFAULT_FFMPEG)]
    pub ffmpeg: PathBuf,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from(DEFAULT_FFMPEG),
        }
    }
}

/// Decodes arbitrary media files to 16 kHz mono samples.
#[derive(Clone, Debug)]
pub struct Transcoder {
    program: PathBuf,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG)
    }
}

impl From<&TranscodeConfig> for Transcoder {
    fn from(config: &TranscodeConfig) -> Self {
        Self::new(&config.ffmpeg)
    }
}

impl Transcoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Decode `input` to normalized samples.
    ///
    /// # Errors
    ///
    /// [`TranscodeError`] when the file is missing, the transcoder cannot be
    /// started, or it exits unsuccessfully.
    pub fn decode_file(&self, input: &Path) -> Result<Vec<f32>> {
        if !input.is_file() {
            return Err(TranscodeError::InputNotFound(input.to_path_buf()).into());
        }

        if let Some(samples) = read_native_wav(input)? {
            tracing::debug!(path = %input.display(), samples = samples.len(), "decoded wav in-process");
            return Ok(samples);
        }

        let samples = run_to_pcm(self.command(input), &self.program.to_string_lossy())?;
        tracing::debug!(path = %input.display(), samples = samples.len(), "transcoded input");
        Ok(samples)
    }

    fn command(&self, input: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"])
            .arg(input)
            .args(["-f", "s16le", "-acodec", "pcm_s16le", "-ac", "1", "-ar"])
            .arg(SAMPLE_RATE.to_string())
            .arg("-");
        cmd
    }
}

/// Samples of a WAV file that needs no resampling, or `None` to transcode.
fn read_native_wav(path: &Path) -> Result<Option<Vec<f32>>> {
    let Ok(reader) = WavReader::open(path) else {
        return Ok(None);
    };
    if !is_native_wav(&reader.spec()) {
        return Ok(None);
    }
    let samples = reader
        .into_samples::<i16>()
        .map(|s| s.map(|s| s as f32 / PCM_SCALE))
        .collect::<hound::Result<Vec<f32>>>()?;
    Ok(Some(samples))
}

/// Run a transcoder command and decode its stdout as s16le PCM.
pub fn run_to_pcm(mut cmd: Command, program: &str) -> std::result::Result<Vec<f32>, TranscodeError> {
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| TranscodeError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let output = child.wait_with_output().map_err(TranscodeError::Pipe)?;

    if !output.status.success() {
        return Err(TranscodeError::Exit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    if output.stdout.len() % 2 == 1 {
        tracing::warn!(bytes = output.stdout.len(), "transcoder output ends mid-sample");
    }

    Ok(pcm16_to_f32(&output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn write_wav(path: &Path, sample_rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn native_wav_skips_transcoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speech.wav");
        write_wav(&path, SAMPLE_RATE, &[0, 16384, -32768]);

        let samples = Transcoder::new("/nonexistent/ffmpeg").decode_file(&path).unwrap();

        assert_eq!(samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn missing_input_is_transcode_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = Transcoder::default().decode_file(&dir.path().join("missing.mp3"));

        assert!(matches!(
            result,
            Err(Error::Transcode(TranscodeError::InputNotFound(_)))
        ));
    }

    #[test]
    fn missing_transcoder_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speech.wav");
        write_wav(&path, 44100, &[0, 1, 2]);

        let result = Transcoder::new("/nonexistent/ffmpeg").decode_file(&path);

        assert!(matches!(
            result,
            Err(Error::Transcode(TranscodeError::Spawn { .. }))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn decodes_transcoder_stdout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", r"printf '\000\100\000\300'"]);

        let samples = run_to_pcm(cmd, "sh").unwrap();

        assert_eq!(samples, vec![0.5, -0.5]);
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_transcode_error() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo 'invalid data found' >&2; exit 3"]);

        let result = run_to_pcm(cmd, "sh");

        match result {
            Err(TranscodeError::Exit { code, stderr }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "invalid data found");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn command_requests_mono_16k_pcm() {
        let cmd = Transcoder::default().command(Path::new("talk.mp3"));

        let args: Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();

        assert!(args.windows(2).any(|w| w == ["-ar", "16000"]));
        assert!(args.windows(2).any(|w| w == ["-ac", "1"]));
        assert!(args.windows(2).any(|w| w == ["-f", "s16le"]));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }
}
