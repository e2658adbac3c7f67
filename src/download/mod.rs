//! Streaming HTTP downloads with resume, retries, and adaptive buffering.
//!
//! Inputs are normalized into [`DownloadRequest`]s, written to a planned
//! destination through a buffer sized from the expected length and free
//! memory, and reported back as one [`DownloadOutcome`] per item.
//!
//! # Features
//!
//! - Streaming to disk (the body is never held in memory)
//! - Range-request resume with `Content-Range` validation
//! - Fixed-delay retries with a per-item budget
//! - Caller-supplied or engine-built transports with explicit ownership
//! - Throttled progress events through a [`LogSink`]
//!
//! # Example
//!
//! ```no_run
//! use streamfetch_core::download::{
//!     BatchOptions, DownloadInput, DownloadSpec, TracingSink, process_batch,
//! };
//!
//! # async fn example() {
//! let record = DownloadSpec {
//!     resume: Some(true),
//!     ..DownloadSpec::new("https://example.com/big.iso")
//! };
//! let inputs = vec![DownloadInput::from(record)];
//! let outcomes = process_batch(inputs, &BatchOptions::default(), &TracingSink).await;
//! assert_eq!(outcomes.len(), 1);
//! # }
//! ```

mod buffer;
mod engine;
mod error;
mod filename;
mod input;
mod log;
mod outcome;
mod path;
mod progress;
mod retry;
pub mod tls;
mod transport;

pub use buffer::{MAX_BUFFER_FACTOR, MAX_BUFFER_SIZE, MIN_BUFFER_SIZE, buffer_size, memory_snapshot};
pub use engine::{
    AttemptParams, BatchOptions, ContentRange, Negotiation, Preflight, SkipReason, StartPosition,
    download_one, negotiate, parse_content_range, preflight, process_batch,
};
pub use error::DownloadError;
pub use filename::{
    FileNameSource, PLACEHOLDER_EXTENSION, ensure_extension, has_extension, resolve_file_name,
};
pub use input::{DownloadDefaults, DownloadInput, DownloadRequest, DownloadSpec, resolve_input};
pub use log::{LogLevel, LogSink, RecordingSink, TracingSink};
pub use outcome::{DownloadOutcome, DownloadStatus, OutcomeContext};
pub use path::{PlannedPath, plan_destination};
pub use progress::{PROGRESS_INTERVAL, ProgressEvent, ProgressThrottle, format_bytes, format_progress};
pub use retry::{
    DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY, FailureType, RetryDecision, RetryPolicy,
    classify_error,
};
pub use transport::{
    DEFAULT_TIMEOUT, HttpTransport, Ownership, TransportHandle, TransportOptions,
    acquire_transport,
};

// Note: no module-local Result alias. Use `Result<T, DownloadError>` explicitly.
