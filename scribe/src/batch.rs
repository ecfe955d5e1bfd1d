//! Batch subcommand: transcribe a media file into final segments.

use crate::config::{ModelArgs, ModelConfig};
use crate::srt;
use eyre::{Result, WrapErr};
use scribe_asr::batch::BatchPipeline;
use scribe_asr::config::{EngineConfig, VadConfig, VadOptions};
use scribe_asr::id::UuidIdGen;
use scribe_asr::segmentation::SegmenterConfig;
use scribe_asr::sherpa::SherpaVad;
use scribe_asr::transcode::{TranscodeConfig, Transcoder};
use scribe_asr::types::{OutputEvent, TranscriptSegment};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON array of final segments
    #[default]
    Json,
    /// SubRip subtitles
    Srt,
}

#[derive(clap::Args, Debug)]
pub struct Args {
    /// Input media file
    pub input: PathBuf,

    /// Write the result to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Print {"progress": N} lines on stdout while transcribing
    #[arg(long)]
    pub progress: bool,

    /// Silero VAD model; without it the input is cut into fixed chunks
    #[arg(long, env = "SCRIBE_VAD_MODEL")]
    pub vad_model: Option<PathBuf>,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub vad: VadOptions,

    #[command(flatten)]
    pub segmenter: SegmenterConfig,

    #[command(flatten)]
    pub transcode: TranscodeConfig,
}

#[derive(Debug)]
pub struct Config {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
    pub progress: bool,
    pub model: ModelConfig,
    pub vad: Option<VadConfig>,
    pub segmenter: SegmenterConfig,
    pub transcoder: Transcoder,
}

impl TryFrom<Args> for Config {
    type Error = eyre::Error;

    fn try_from(args: Args) -> Result<Self> {
        let vad = args
            .vad_model
            .map(|model| VadConfig::new(model, args.vad, &args.model.engine));
        if let Some(vad) = &vad {
            EngineConfig::Vad(vad.clone())
                .validate()
                .wrap_err("invalid vad configuration")?;
        }
        args.segmenter.validate().wrap_err("invalid segmentation configuration")?;

        Ok(Self {
            input: args.input,
            output: args.output,
            format: args.format,
            progress: args.progress,
            model: ModelConfig::try_from(args.model)?,
            vad,
            segmenter: args.segmenter,
            transcoder: Transcoder::from(&args.transcode),
        })
    }
}

pub fn execute(config: Config) -> Result<()> {
    tracing::info!(
        input = %config.input.display(),
        format = ?config.format,
        vad = config.vad.is_some(),
        "batch transcription"
    );

    let s = Instant::now();
    let (recognizer, post) = config.model.load()?;
    let vad = config
        .vad
        .as_ref()
        .map(SherpaVad::new)
        .transpose()
        .wrap_err("failed to load vad")?;
    tracing::info!(duration = %format_secs(s.elapsed().as_secs_f32()), "engines loaded");

    let mut pipeline = BatchPipeline::new(recognizer, UuidIdGen, post, config.segmenter)
        .with_alignment(config.model.alignment);

    let s = Instant::now();
    let progress = config.progress;
    let segments = pipeline
        .transcribe_file(&config.input, &config.transcoder, vad, |pct| {
            if progress {
                print_progress(pct);
            }
        })
        .wrap_err_with(|| format!("failed to transcribe: {:?}", config.input.display()))?;
    tracing::info!(
        duration = %format_secs(s.elapsed().as_secs_f32()),
        segments = segments.len(),
        "inference completed"
    );

    let rendered = render(&segments, config.format)?;
    match &config.output {
        Some(path) => {
            tracing::info!(path = %path.display(), "write output file");
            std::fs::write(path, rendered)
                .wrap_err_with(|| format!("failed to write output: {:?}", path.display()))?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{rendered}")?;
            stdout.flush()?;
        }
    }

    Ok(())
}

/// Render final segments in the requested format.
pub fn render(segments: &[TranscriptSegment], format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string(segments)?,
        OutputFormat::Srt => srt::render(segments),
    })
}

/// One progress line on stdout, flushed so the host sees it immediately.
fn print_progress(progress: u8) {
    if let Err(e) = write_progress(&mut io::stdout().lock(), progress) {
        tracing::warn!(error = %e, progress, "failed to report progress");
    }
}

fn write_progress(out: &mut impl Write, progress: u8) -> io::Result<()> {
    serde_json::to_writer(&mut *out, &OutputEvent::Progress { progress })?;
    out.write_all(b"\n")?;
    out.flush()
}

fn format_secs(secs: f32) -> String {
    format!("{:.2}s", secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use scribe_asr::types::Alignment;

    fn segments() -> Vec<TranscriptSegment> {
        let tokens = vec!["hi".to_string(), " there".to_string()];
        let alignment = Alignment::from_starts(tokens, vec![0.5, 1.0], 1.5).unwrap();
        vec![TranscriptSegment::final_text("a", "Hi there.", 0.5, 1.5).with_alignment(alignment)]
    }

    #[test]
    fn renders_json_array() {
        let json = render(&segments(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["id"], "a");
        assert_eq!(value[0]["isFinal"], true);
        assert_eq!(value[0]["durations"], serde_json::json!([0.5, 0.5]));
    }

    #[test]
    fn renders_empty_json_array() {
        assert_eq!(render(&[], OutputFormat::Json).unwrap(), "[]");
    }

    #[test]
    fn progress_lines_are_json() {
        let mut out = Vec::new();

        write_progress(&mut out, 40).unwrap();
        write_progress(&mut out, 100).unwrap();

        assert_eq!(out, b"{\"progress\":40}\n{\"progress\":100}\n");
    }

    fn parse(extra: &[&str]) -> Args {
        let cli = crate::cli::Cli::try_parse_from(
            ["scribe", "batch", "in.wav", "--model-dir", "/models/x"]
                .into_iter()
                .chain(extra.iter().copied()),
        )
        .unwrap();
        match cli.command {
            crate::cli::Commands::Batch(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn zero_chunk_length_is_rejected() {
        let err = Config::try_from(parse(&["--chunk-secs", "0"])).unwrap_err();
        let chain = format!("{err:#}");

        assert!(chain.contains("invalid segmentation configuration"));
        assert!(chain.contains("chunk-secs"));
    }

    #[test]
    fn negative_ring_is_rejected() {
        let err = Config::try_from(parse(&["--ring-secs=-1"])).unwrap_err();

        assert!(format!("{err:#}").contains("ring-secs"));
    }

    #[test]
    fn renders_srt() {
        let text = render(&segments(), OutputFormat::Srt).unwrap();

        assert!(text.contains("00:00:00,500 --> 00:00:01,500"));
        assert!(text.contains("Hi there."));
    }
}
