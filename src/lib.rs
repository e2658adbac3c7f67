//! Streamfetch Core Library
//!
//! Resilient streaming downloads over HTTP(S): each input item (a URL string,
//! a parsed URL, or a record with per-item overrides) is resolved to a
//! destination on disk and transferred with range-request resume, fixed-delay
//! retries, and a write buffer sized from the expected length and free memory.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - Input resolution, path planning, transports, and the engine
//!
//! The `streamfetch` binary wraps [`download::process_batch`] with a clap CLI,
//! an optional config file, and an indicatif progress bar.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
#[cfg(test)]
pub(crate) mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use download::{
    BatchOptions, DownloadDefaults, DownloadError, DownloadInput, DownloadOutcome, DownloadSpec,
    DownloadStatus, HttpTransport, LogLevel, LogSink, TracingSink, download_one, process_batch,
};
