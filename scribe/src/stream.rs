//! Stream subcommand: raw PCM in, one JSON event per line out.
//!
//! Input is 16 kHz mono s16le. It ends at EOF or at the stop marker, which may
//! be split across reads. Bytes after the marker are ignored.

use crate::config::{ModelArgs, ModelConfig};
use eyre::{Result, WrapErr, bail};
use scribe_asr::audio::PcmDecoder;
use scribe_asr::error::Error;
use scribe_asr::id::{IdGenerator, UuidIdGen};
use scribe_asr::session::StreamSession;
use scribe_asr::traits::{AsrRecognizer, RecognizerKind};
use scribe_asr::types::OutputEvent;
use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::path::PathBuf;
use std::time::Instant;

pub const DEFAULT_STOP_MARKER: &str = "SCRIBE_END_OF_STREAM";

/// 100 ms of s16le audio.
const DEFAULT_READ_SIZE: usize = 3200;

#[derive(clap::Args, Debug)]
pub struct Args {
    /// Raw s16le 16 kHz mono PCM file to read instead of stdin
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Byte sequence in the input that ends the stream like EOF
    #[arg(long, default_value = DEFAULT_STOP_MARKER)]
    pub stop_marker: String,

    /// Bytes read from the input per step
    #[arg(long, default_value_t = DEFAULT_READ_SIZE)]
    pub read_size: usize,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Debug)]
pub struct Config {
    pub input: Option<PathBuf>,
    pub stop_marker: Vec<u8>,
    pub read_size: usize,
    pub model: ModelConfig,
}

impl TryFrom<Args> for Config {
    type Error = eyre::Error;

    fn try_from(args: Args) -> Result<Self> {
        if args.stop_marker.is_empty() {
            bail!("stop marker must not be empty");
        }
        if args.read_size == 0 {
            bail!("read size must be at least one byte");
        }

        let model = ModelConfig::try_from(args.model)?;
        if model.recognizer.kind() == RecognizerKind::Offline {
            return Err(Error::ModeUnsupported.into());
        }

        Ok(Self {
            input: args.input,
            stop_marker: args.stop_marker.into_bytes(),
            read_size: args.read_size,
            model,
        })
    }
}

pub fn execute(config: Config) -> Result<()> {
    let s = Instant::now();
    let (recognizer, post) = config.model.load()?;
    tracing::info!(duration = %format_secs(s.elapsed().as_secs_f32()), "engines loaded");

    let session =
        StreamSession::new(recognizer, UuidIdGen, post)?.with_alignment(config.model.alignment);
    let mut driver = SessionDriver::new(session, config.stop_marker, config.read_size);
    let stdout = io::stdout().lock();

    let summary = match &config.input {
        Some(path) => {
            let file = File::open(path)
                .wrap_err_with(|| format!("failed to open input: {:?}", path.display()))?;
            tracing::info!(path = %path.display(), "streaming from file");
            driver.run(file, stdout)?
        }
        None => {
            tracing::info!("streaming from stdin");
            driver.run(io::stdin().lock(), stdout)?
        }
    };

    tracing::info!(
        bytes = summary.bytes,
        finals = summary.finals,
        stopped_by_marker = summary.stopped_by_marker,
        "stream finished"
    );

    Ok(())
}

/// What one driver run consumed and produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriveSummary {
    /// PCM bytes forwarded to the decoder
    pub bytes: usize,
    /// Final segments written
    pub finals: usize,
    pub stopped_by_marker: bool,
}

/// Pumps bytes from a reader through a [`StreamSession`] into a writer.
pub struct SessionDriver<R: AsrRecognizer, G> {
    session: StreamSession<R, G>,
    scanner: StopScanner,
    decoder: PcmDecoder,
    read_size: usize,
}

impl<R: AsrRecognizer, G: IdGenerator> SessionDriver<R, G> {
    pub fn new(
        session: StreamSession<R, G>,
        stop_marker: impl Into<Vec<u8>>,
        read_size: usize,
    ) -> Self {
        Self {
            session,
            scanner: StopScanner::new(stop_marker),
            decoder: PcmDecoder::new(),
            read_size: read_size.max(1),
        }
    }

    /// Run until EOF or the stop marker, then finish the session.
    ///
    /// Every event line is flushed as soon as it is written.
    pub fn run(&mut self, mut input: impl Read, mut output: impl Write) -> Result<DriveSummary> {
        let mut buf = vec![0u8; self.read_size];
        let mut summary = DriveSummary::default();

        loop {
            let n = match input.read(&mut buf) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).wrap_err("failed to read input"),
            };

            let (bytes, stop) = if n == 0 {
                (self.scanner.finish(), false)
            } else {
                match self.scanner.push(&buf[..n]) {
                    Scan::Data(bytes) => (bytes, false),
                    Scan::Stop(bytes) => (bytes, true),
                }
            };

            summary.bytes += bytes.len();
            let samples = self.decoder.push(&bytes);
            if !samples.is_empty() {
                let events = self.session.accept_samples(&samples)?;
                summary.finals += write_events(&mut output, &events)?;
            }

            if stop {
                tracing::debug!("stop marker received");
                summary.stopped_by_marker = true;
                break;
            }
            if n == 0 {
                break;
            }
        }

        if self.decoder.has_pending_byte() {
            tracing::warn!("input ended inside a sample, dropping the odd byte");
        }

        let events = self.session.finish()?;
        summary.finals += write_events(&mut output, &events)?;

        Ok(summary)
    }
}

/// Write events as JSON lines and flush. Returns the number of finals.
fn write_events(output: &mut impl Write, events: &[OutputEvent]) -> Result<usize> {
    let mut finals = 0;
    for event in events {
        serde_json::to_writer(&mut *output, event)?;
        output.write_all(b"\n")?;
        if matches!(event, OutputEvent::Segment(s) if s.is_final) {
            finals += 1;
        }
    }
    output.flush().wrap_err("failed to flush output")?;
    Ok(finals)
}

/// Result of scanning one read.
#[derive(Debug, PartialEq, Eq)]
pub enum Scan {
    /// Bytes safe to forward; scanning continues
    Data(Vec<u8>),
    /// Marker found; bytes before it are the last to forward
    Stop(Vec<u8>),
}

/// Finds a byte marker in a stream read in arbitrary pieces.
///
/// The last `marker.len() - 1` bytes of each read are held back until the
/// next read shows they are not the start of the marker.
#[derive(Debug)]
pub struct StopScanner {
    marker: Vec<u8>,
    held: Vec<u8>,
    stopped: bool,
}

impl StopScanner {
    pub fn new(marker: impl Into<Vec<u8>>) -> Self {
        Self {
            marker: marker.into(),
            held: Vec::new(),
            stopped: false,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Scan {
        if self.stopped {
            return Scan::Stop(Vec::new());
        }

        self.held.extend_from_slice(bytes);

        if let Some(pos) = find(&self.held, &self.marker) {
            self.stopped = true;
            let mut data = std::mem::take(&mut self.held);
            data.truncate(pos);
            return Scan::Stop(data);
        }

        let keep = self.marker.len().saturating_sub(1).min(self.held.len());
        let tail = self.held.split_off(self.held.len() - keep);
        Scan::Data(std::mem::replace(&mut self.held, tail))
    }

    /// Release held bytes at EOF.
    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.held)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn format_secs(secs: f32) -> String {
    format!("{:.2}s", secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(marker: &str, reads: &[&[u8]]) -> (Vec<u8>, bool) {
        let mut scanner = StopScanner::new(marker);
        let mut out = Vec::new();
        for read in reads {
            match scanner.push(read) {
                Scan::Data(bytes) => out.extend(bytes),
                Scan::Stop(bytes) => {
                    out.extend(bytes);
                    return (out, true);
                }
            }
        }
        out.extend(scanner.finish());
        (out, false)
    }

    #[test]
    fn passes_everything_without_marker() {
        let (out, stopped) = scan_all("END", &[b"abcdef", b"gh", b"E"]);

        assert_eq!(out, b"abcdefghE");
        assert!(!stopped);
    }

    #[test]
    fn stops_at_marker_within_one_read() {
        let (out, stopped) = scan_all("END", &[b"abcENDxyz"]);

        assert_eq!(out, b"abc");
        assert!(stopped);
    }

    #[test]
    fn finds_marker_split_across_reads() {
        let (out, stopped) = scan_all("END", &[b"abcE", b"N", b"Dxyz", b"more"]);

        assert_eq!(out, b"abc");
        assert!(stopped);
    }

    #[test]
    fn marker_at_start_forwards_nothing() {
        let (out, stopped) = scan_all("END", &[b"EN", b"D"]);

        assert!(out.is_empty());
        assert!(stopped);
    }

    #[test]
    fn holds_back_only_a_possible_prefix() {
        let mut scanner = StopScanner::new("END");

        assert_eq!(scanner.push(b"abcdef"), Scan::Data(b"abcd".to_vec()));
        assert_eq!(scanner.push(b"g"), Scan::Data(b"e".to_vec()));
        assert_eq!(scanner.finish(), b"fg");
    }

    #[test]
    fn pushes_after_stop_yield_nothing() {
        let mut scanner = StopScanner::new("END");

        assert_eq!(scanner.push(b"xEND"), Scan::Stop(b"x".to_vec()));
        assert_eq!(scanner.push(b"more"), Scan::Stop(Vec::new()));
    }
}
