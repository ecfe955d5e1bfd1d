//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use eyre::Result;
use scribe_asr::types::OutputEvent;
use std::ffi::OsStr;
use std::io::Write;

#[derive(Debug, Parser)]
#[command(name = "scribe")]
#[command(about = "Speech transcription sidecar")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Transcribe live PCM from stdin into JSON lines
    Stream(crate::stream::Args),

    /// Transcribe a media file into a JSON array or SRT
    Batch(crate::batch::Args),
}

/// Where a fatal error object is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorChannel {
    Stdout,
    Stderr,
}

impl Commands {
    /// Stream hosts read errors from the protocol channel, batch hosts from stderr.
    pub fn error_channel(&self) -> ErrorChannel {
        match self {
            Commands::Stream(_) => ErrorChannel::Stdout,
            Commands::Batch(_) => ErrorChannel::Stderr,
        }
    }
}

/// Channel for a command line that did not parse, judged from the raw arguments.
pub fn channel_for_args<I, T>(args: I) -> ErrorChannel
where
    I: IntoIterator<Item = T>,
    T: AsRef<OsStr>,
{
    let subcommand = args
        .into_iter()
        .skip(1)
        .find(|arg| !arg.as_ref().to_string_lossy().starts_with('-'));
    match subcommand {
        Some(arg) if arg.as_ref() == "stream" => ErrorChannel::Stdout,
        _ => ErrorChannel::Stderr,
    }
}

/// Turn a parse failure into a reportable error.
///
/// Help and version requests are not failures and yield `None`.
pub fn usage_error(err: &clap::Error) -> Option<eyre::Report> {
    if !err.use_stderr() {
        return None;
    }
    let rendered = err.to_string();
    let first = rendered.split("\n\n").next().unwrap_or_default();
    let message = first
        .trim_start_matches("error: ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    Some(eyre::eyre!("invalid arguments: {message}"))
}

/// Execute CLI command - separated for testing.
pub fn run_cli(cli: Cli) -> Result<()> {
    tracing::debug!(?cli, "parsed arguments");

    match cli.command {
        Commands::Stream(args) => crate::stream::execute(args.try_into()?),
        Commands::Batch(args) => crate::batch::execute(args.try_into()?),
    }
}

/// `{"error": "..."}` carrying the whole context chain.
pub fn error_line(err: &eyre::Report) -> String {
    let event = OutputEvent::error(format!("{err:#}"));
    serde_json::to_string(&event).unwrap_or_else(|_| r#"{"error":"unknown error"}"#.to_string())
}

/// Write the error object to its channel.
pub fn report_error(err: &eyre::Report, channel: ErrorChannel) {
    let line = error_line(err);
    let written = match channel {
        ErrorChannel::Stdout => writeln!(std::io::stdout().lock(), "{line}"),
        ErrorChannel::Stderr => writeln!(std::io::stderr().lock(), "{line}"),
    };
    if let Err(e) = written {
        tracing::error!(error = %e, "failed to report error");
    }
}
