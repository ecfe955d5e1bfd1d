//! scribe: transcription sidecar process.
//!
//! `scribe stream` turns PCM on stdin into JSON segment lines on stdout.
//! `scribe batch` transcribes a media file into one JSON array or SRT text.

pub mod batch;
pub mod cli;
pub mod config;
pub mod srt;
pub mod stream;
