//! scribe - speech transcription sidecar

use clap::Parser;
use scribe::cli::{Cli, channel_for_args, report_error, run_cli, usage_error};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let (non_blocking, _guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match usage_error(&err) {
            Some(report) => {
                tracing::error!("{report:#}");
                report_error(&report, channel_for_args(std::env::args_os()));
                return ExitCode::FAILURE;
            }
            None => err.exit(),
        },
    };
    let channel = cli.command.error_channel();

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            report_error(&err, channel);
            ExitCode::FAILURE
        }
    }
}
