//! Sequential download engine with resume negotiation and fixed-delay retries.
//!
//! Each input item runs through resolution, destination planning, a
//! pre-flight check, transport acquisition, and at most `retry_count + 1`
//! attempts. Items are isolated: whatever happens to one, the batch moves on
//! and every item yields exactly one [`DownloadOutcome`].
//!
//! # Example
//!
//! ```no_run
//! use streamfetch_core::download::{BatchOptions, DownloadInput, TracingSink, process_batch};
//!
//! # async fn example() {
//! let inputs = vec![DownloadInput::from("https://example.com/image.iso")];
//! let outcomes = process_batch(inputs, &BatchOptions::default(), &TracingSink).await;
//! for outcome in &outcomes {
//!     println!("{}: {:?}", outcome.status, outcome.path);
//! }
//! # }
//! ```

use std::path::Path;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, HeaderMap, RANGE};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::buffer::{buffer_size, memory_snapshot};
use super::error::DownloadError;
use super::input::{DownloadDefaults, DownloadInput, DownloadRequest, resolve_input};
use super::log::{LogLevel, LogSink};
use super::outcome::{DownloadOutcome, OutcomeContext};
use super::path::plan_destination;
use super::progress::{ProgressEvent, ProgressThrottle, format_bytes};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use super::tls::{TlsFloor, TlsPolicyGuard};
use super::transport::{TransportHandle, acquire_transport, header_map};

/// Batch-wide switches.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Settings for items that do not override them.
    pub defaults: DownloadDefaults,
    /// Plan every item but transfer nothing.
    pub dry_run: bool,
    /// Overwriting existing files was confirmed up front.
    pub confirm_overwrite: bool,
}

/// Where an attempt starts writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Truncate and write from byte 0.
    Fresh,
    /// Ask for the remainder after `offset` bytes already on disk.
    Resume {
        /// Bytes already on disk.
        offset: u64,
    },
}

impl StartPosition {
    /// Picks the start position for a file of `on_disk` bytes.
    ///
    /// Missing and empty files always start fresh.
    #[must_use]
    pub fn for_existing(resume: bool, on_disk: Option<u64>) -> Self {
        match on_disk {
            Some(offset) if resume && offset > 0 => Self::Resume { offset },
            _ => Self::Fresh,
        }
    }
}

/// Parameters for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptParams {
    /// 1-indexed attempt number.
    pub attempt: u32,
    /// URL to request; after a redirect, the redirect target.
    pub url: Url,
    /// Where writing starts.
    pub start: StartPosition,
}

impl AttemptParams {
    /// Parameters for the initial attempt.
    #[must_use]
    pub fn first(url: Url, start: StartPosition) -> Self {
        Self {
            attempt: 1,
            url,
            start,
        }
    }

    /// Parameters for the attempt following a failed one.
    ///
    /// `final_url` is where the failed attempt ended up after redirects and
    /// `on_disk` is the destination size observed after the retry delay.
    #[must_use]
    pub fn after_failure(&self, final_url: Option<&Url>, resume: bool, on_disk: Option<u64>) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            url: final_url.unwrap_or(&self.url).clone(),
            start: StartPosition::for_existing(resume, on_disk),
        }
    }
}

/// Pre-flight decision, made before any network I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preflight {
    /// Leave the destination alone.
    Skip(SkipReason),
    /// Transfer, starting at the given position.
    Proceed(StartPosition),
}

/// Why an item was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Dry run: nothing is transferred.
    DryRun,
    /// The destination exists and neither resume, force nor confirmation applies.
    Exists,
}

/// Decides whether an item transfers at all, given the destination's current size.
#[must_use]
pub fn preflight(existing: Option<u64>, request: &DownloadRequest, options: &BatchOptions) -> Preflight {
    if options.dry_run {
        return Preflight::Skip(SkipReason::DryRun);
    }
    if existing.is_some() && !request.resume && !request.force && !options.confirm_overwrite {
        return Preflight::Skip(SkipReason::Exists);
    }
    Preflight::Proceed(StartPosition::for_existing(request.resume, existing))
}

/// How the server answered relative to the requested start position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    /// Write from byte 0.
    Fresh {
        /// Expected final size.
        expected_total: Option<u64>,
    },
    /// Append after `offset`.
    Resumed {
        /// Bytes already on disk.
        offset: u64,
        /// Expected final size.
        expected_total: Option<u64>,
    },
    /// A `206` that does not start at the requested offset.
    ///
    /// Only a body served from byte 0 is written; anything else is discarded
    /// and the whole file requested again.
    Mismatched {
        /// Offset that was requested.
        requested: u64,
        /// First byte the server reported, if parseable.
        served: Option<u64>,
        /// Expected final size.
        expected_total: Option<u64>,
    },
}

impl Negotiation {
    /// Bytes already on disk that this attempt keeps.
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self {
            Self::Resumed { offset, .. } => *offset,
            Self::Fresh { .. } | Self::Mismatched { .. } => 0,
        }
    }

    /// Expected size of the finished file.
    #[must_use]
    pub fn expected_total(&self) -> Option<u64> {
        match self {
            Self::Fresh { expected_total }
            | Self::Resumed { expected_total, .. }
            | Self::Mismatched { expected_total, .. } => *expected_total,
        }
    }

    /// Returns true when the range request was honored.
    #[must_use]
    pub fn is_resumed(&self) -> bool {
        matches!(self, Self::Resumed { .. })
    }

    /// Returns true when the body cannot be used as-is: a mismatched `206`
    /// that does not start at byte 0 is a slice from the middle of the file.
    #[must_use]
    pub fn needs_full_request(&self) -> bool {
        matches!(self, Self::Mismatched { served, .. } if *served != Some(0))
    }
}

/// A parsed `Content-Range: bytes <start>-<end>/<complete>` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// First byte in the body.
    pub start: u64,
    /// Last byte in the body.
    pub end: u64,
    /// Complete length, unless the server sent `*`.
    pub complete: Option<u64>,
}

/// Parses a byte `Content-Range` value.
#[must_use]
pub fn parse_content_range(value: &str) -> Option<ContentRange> {
    let spec = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, complete) = spec.split_once('/')?;
    let (start, end) = range.trim().split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = end.trim().parse().ok()?;
    if end < start {
        return None;
    }
    let complete = match complete.trim() {
        "*" => None,
        length => Some(length.parse().ok()?),
    };
    Some(ContentRange {
        start,
        end,
        complete,
    })
}

/// Interprets response headers against the requested start position.
///
/// # Errors
///
/// Returns [`DownloadError::HttpStatus`] for any non-2xx status.
pub fn negotiate(
    start: StartPosition,
    status: StatusCode,
    headers: &HeaderMap,
    url: &str,
) -> Result<Negotiation, DownloadError> {
    if !status.is_success() {
        return Err(DownloadError::http_status(url, status.as_u16()));
    }
    let content_length = header_u64(headers, &CONTENT_LENGTH);

    let StartPosition::Resume { offset } = start else {
        return Ok(Negotiation::Fresh {
            expected_total: content_length,
        });
    };
    if status != StatusCode::PARTIAL_CONTENT {
        return Ok(Negotiation::Fresh {
            expected_total: content_length,
        });
    }

    let range = headers
        .get(CONTENT_RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_content_range);
    match range {
        Some(range) if range.start == offset => Ok(Negotiation::Resumed {
            offset,
            expected_total: range
                .complete
                .or_else(|| content_length.map(|length| offset.saturating_add(length))),
        }),
        _ => Ok(Negotiation::Mismatched {
            requested: offset,
            served: range.map(|range| range.start),
            expected_total: content_length,
        }),
    }
}

fn header_u64(headers: &HeaderMap, name: &reqwest::header::HeaderName) -> Option<u64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Processes every input in order, one at a time.
///
/// The process TLS floor is raised for the duration of the batch and restored
/// afterwards.
#[instrument(skip_all, fields(items = inputs.len(), dry_run = options.dry_run))]
pub async fn process_batch(
    inputs: Vec<DownloadInput>,
    options: &BatchOptions,
    sink: &dyn LogSink,
) -> Vec<DownloadOutcome> {
    let guard = TlsPolicyGuard::enforce(TlsFloor::REQUIRED);
    sink.log(
        LogLevel::Debug,
        &format!(
            "TLS floor {:?} (was {:?}, newest available {:?})",
            guard.enforced(),
            guard.previous(),
            TlsFloor::NEWEST_SUPPORTED
        ),
    );

    let total = inputs.len();
    let mut outcomes = Vec::with_capacity(total);
    for (index, input) in inputs.into_iter().enumerate() {
        debug!(item = index + 1, total, "processing item");
        outcomes.push(download_one(input, options, sink).await);
    }

    let completed = outcomes.iter().filter(|o| o.is_success()).count();
    info!(completed, total, "batch finished");
    drop(guard);
    outcomes
}

/// Processes a single input item.
#[instrument(skip_all, fields(input = %input))]
pub async fn download_one(
    input: DownloadInput,
    options: &BatchOptions,
    sink: &dyn LogSink,
) -> DownloadOutcome {
    let started = Instant::now();

    let request = match resolve_input(input, &options.defaults, sink) {
        Ok(request) => request,
        Err(e) => {
            sink.log(LogLevel::Error, &e.describe());
            return DownloadOutcome::failed(OutcomeContext::default(), &e, None, started.elapsed(), 0);
        }
    };
    let mut context = OutcomeContext {
        file_name: Some(request.file_name.clone()),
        path: None,
        final_url: Some(request.url.to_string()),
    };

    let planned = match plan_destination(&request.directory, &request.file_name, options.dry_run).await
    {
        Ok(planned) => planned,
        Err(e) => {
            sink.log(LogLevel::Error, &e.describe());
            return DownloadOutcome::failed(context, &e, None, started.elapsed(), 0);
        }
    };
    let path = planned.file_path;
    context.path = Some(path.clone());

    let existing = file_len(&path).await;
    let start = match preflight(existing, &request, options) {
        Preflight::Skip(SkipReason::DryRun) => {
            let state = existing.map_or_else(
                || "absent".to_string(),
                |size| format!("exists, {}", format_bytes(size)),
            );
            sink.log(
                LogLevel::Info,
                &format!("dry run: {} -> {} ({state})", request.url, path.display()),
            );
            return DownloadOutcome::skipped(context, existing, started.elapsed());
        }
        Preflight::Skip(SkipReason::Exists) => {
            sink.log(
                LogLevel::Info,
                &format!(
                    "{} already exists; skipping (enable resume or force to replace it)",
                    path.display()
                ),
            );
            return DownloadOutcome::skipped(context, existing, started.elapsed());
        }
        Preflight::Proceed(start) => start,
    };
    if request.resume && existing == Some(0) {
        sink.log(LogLevel::Debug, "existing file is empty; starting fresh");
    }

    let handle = match acquire_transport(&request, sink) {
        Ok(handle) => handle,
        Err(e) => {
            sink.log(LogLevel::Error, &e.describe());
            return DownloadOutcome::failed(context, &e, existing, started.elapsed(), 0);
        }
    };

    let transferred = transfer(&request, &handle, &path, start, sink).await;
    handle.release(sink);

    match transferred {
        Ok(done) => {
            let total_bytes = done.report.offset.saturating_add(done.report.session_bytes);
            context.final_url = Some(done.report.final_url.to_string());
            sink.log(
                LogLevel::Success,
                &format!(
                    "saved {} ({}{})",
                    path.display(),
                    format_bytes(total_bytes),
                    if done.report.resumed { ", resumed" } else { "" }
                ),
            );
            DownloadOutcome::completed(
                context,
                Some(total_bytes),
                done.report.session_bytes,
                done.report.session_elapsed,
                started.elapsed(),
                done.attempts,
                done.report.resumed,
            )
        }
        Err(failed) => {
            if let Some(url) = failed.final_url {
                context.final_url = Some(url.to_string());
            }
            sink.log(LogLevel::Error, &failed.error.describe());
            let on_disk = file_len(&path).await;
            DownloadOutcome::failed(context, &failed.error, on_disk, started.elapsed(), failed.attempts)
        }
    }
}

async fn file_len(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(std::fs::Metadata::is_file)
        .map(|meta| meta.len())
}

struct AttemptReport {
    final_url: Url,
    offset: u64,
    session_bytes: u64,
    session_elapsed: Duration,
    resumed: bool,
}

struct AttemptFailure {
    error: DownloadError,
    final_url: Option<Url>,
}

impl From<DownloadError> for AttemptFailure {
    fn from(error: DownloadError) -> Self {
        Self {
            error,
            final_url: None,
        }
    }
}

struct Transferred {
    report: AttemptReport,
    attempts: u32,
}

struct TransferFailed {
    error: DownloadError,
    attempts: u32,
    final_url: Option<Url>,
}

/// Runs attempts until one succeeds or the retry budget is spent.
async fn transfer(
    request: &DownloadRequest,
    handle: &TransportHandle,
    path: &Path,
    start: StartPosition,
    sink: &dyn LogSink,
) -> Result<Transferred, TransferFailed> {
    let policy = RetryPolicy::new(request.retry_count, request.retry_delay);
    let mut params = AttemptParams::first(request.url.clone(), start);
    let mut last_url: Option<Url> = None;

    loop {
        debug!(
            attempt = params.attempt,
            max_attempts = policy.max_attempts(),
            url = %params.url,
            start = ?params.start,
            "starting attempt"
        );
        let failure = match run_attempt(&params, request, handle, path, sink).await {
            Ok(report) => {
                return Ok(Transferred {
                    report,
                    attempts: params.attempt,
                });
            }
            Err(failure) => failure,
        };
        if failure.final_url.is_some() {
            last_url.clone_from(&failure.final_url);
        }

        let failure_type = classify_error(&failure.error);
        match policy.should_retry(failure_type, params.attempt) {
            RetryDecision::Retry { delay, .. } => {
                sink.log(
                    LogLevel::Warning,
                    &format!(
                        "attempt {}/{} failed: {}; retrying in {:.1}s",
                        params.attempt,
                        policy.max_attempts(),
                        failure.error.describe(),
                        delay.as_secs_f64()
                    ),
                );
                tokio::time::sleep(delay).await;

                let on_disk = file_len(path).await;
                if matches!(params.start, StartPosition::Resume { .. }) && on_disk.is_none() {
                    sink.log(LogLevel::Info, "partial file disappeared; restarting from byte 0");
                }
                params = params.after_failure(last_url.as_ref(), request.resume, on_disk);
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(reason = %reason, "not retrying");
                let error = if failure_type == FailureType::Transient {
                    DownloadError::exhausted(params.url.as_str(), params.attempt, failure.error)
                } else {
                    failure.error
                };
                return Err(TransferFailed {
                    error,
                    attempts: params.attempt,
                    final_url: last_url,
                });
            }
        }
    }
}

/// One request/response/stream cycle. Response, stream and file handle are
/// dropped when this returns.
async fn run_attempt(
    params: &AttemptParams,
    request: &DownloadRequest,
    handle: &TransportHandle,
    path: &Path,
    sink: &dyn LogSink,
) -> Result<AttemptReport, AttemptFailure> {
    let client = handle.transport().client()?;
    let mut start = params.start;
    let (response, final_url, negotiation) = loop {
        let mut builder = client.get(params.url.clone());
        if handle.is_borrowed()
            && let Some(headers) = &request.headers
        {
            builder = builder.headers(header_map(headers)?);
        }
        if let StartPosition::Resume { offset } = start {
            sink.log(LogLevel::Debug, &format!("requesting bytes from offset {offset}"));
            builder = builder.header(RANGE, format!("bytes={offset}-"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DownloadError::network(params.url.as_str(), e))?;

        let final_url = response.url().clone();
        if final_url != params.url {
            sink.log(LogLevel::Debug, &format!("redirected to {final_url}"));
        }
        let negotiation = negotiate(start, response.status(), response.headers(), final_url.as_str())
            .map_err(|error| AttemptFailure {
                error,
                final_url: Some(final_url.clone()),
            })?;

        if let Negotiation::Mismatched {
            requested, served, ..
        } = negotiation
        {
            let notice = DownloadError::resume_mismatch(requested, served);
            if negotiation.needs_full_request() {
                sink.log(LogLevel::Warning, &format!("{notice}; requesting the whole file"));
                start = StartPosition::Fresh;
                continue;
            }
            sink.log(LogLevel::Warning, &format!("{notice}; restarting from byte 0"));
        } else if let Negotiation::Resumed { offset, .. } = negotiation {
            sink.log(LogLevel::Info, &format!("resuming after {}", format_bytes(offset)));
        } else if matches!(start, StartPosition::Resume { .. }) {
            sink.log(
                LogLevel::Info,
                &format!(
                    "server ignored the range request (HTTP {}); restarting from byte 0",
                    response.status().as_u16()
                ),
            );
        }
        break (response, final_url, negotiation);
    };
    let fail = |error: DownloadError| AttemptFailure {
        error,
        final_url: Some(final_url.clone()),
    };

    let offset = negotiation.offset();
    let expected_total = negotiation.expected_total();
    let capacity = buffer_size(expected_total, request.buffer_factor, memory_snapshot());
    sink.log(
        LogLevel::Debug,
        &format!(
            "write buffer {} for {} expected",
            format_bytes(capacity as u64),
            expected_total.map_or_else(|| "unknown size".to_string(), format_bytes)
        ),
    );

    let file = open_destination(path, negotiation.is_resumed())
        .await
        .map_err(&fail)?;
    let mut writer = BufWriter::with_capacity(capacity, file);
    let mut stream = response.bytes_stream();
    let mut throttle = ProgressThrottle::default();
    let session_started = Instant::now();
    let mut session_bytes: u64 = 0;

    let streamed = async {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::network(final_url.as_str(), e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(path, e))?;
            session_bytes += chunk.len() as u64;
            if throttle.ready(Instant::now()) {
                sink.progress(&ProgressEvent::new(
                    offset + session_bytes,
                    expected_total,
                    session_bytes,
                    session_started.elapsed(),
                ));
            }
        }
        Ok::<(), DownloadError>(())
    }
    .await;

    if let Err(error) = streamed {
        if let Err(flush_error) = writer.flush().await {
            warn!(path = %path.display(), error = %flush_error, "flush after stream fault failed");
            sink.log(
                LogLevel::Warning,
                &format!("could not flush partial data to {}: {flush_error}", path.display()),
            );
        }
        return Err(fail(error));
    }
    writer
        .flush()
        .await
        .map_err(|e| fail(DownloadError::io(path, e)))?;

    let session_elapsed = session_started.elapsed();
    sink.progress(&ProgressEvent::new(
        offset + session_bytes,
        expected_total,
        session_bytes,
        session_elapsed,
    ));
    debug!(bytes = session_bytes, offset, "attempt finished streaming");

    Ok(AttemptReport {
        final_url,
        offset,
        session_bytes,
        session_elapsed,
        resumed: negotiation.is_resumed(),
    })
}

async fn open_destination(path: &Path, append: bool) -> Result<File, DownloadError> {
    let opened = if append {
        OpenOptions::new().create(true).append(true).open(path).await
    } else {
        File::create(path).await
    };
    opened.map_err(|e| DownloadError::io(path, e))
}
