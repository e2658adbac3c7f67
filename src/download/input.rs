//! Input normalization.
//!
//! Callers hand the engine a plain URL string, a parsed [`Url`], or a
//! [`DownloadSpec`] record with per-item overrides. [`resolve_input`] turns any
//! of those into one canonical [`DownloadRequest`]; nothing downstream looks at
//! the input shape again.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::buffer::MAX_BUFFER_FACTOR;
use super::error::DownloadError;
use super::filename::{FileNameSource, PLACEHOLDER_EXTENSION, ensure_extension, resolve_file_name};
use super::log::{LogLevel, LogSink};
use super::retry::{DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY};
use super::transport::{DEFAULT_TIMEOUT, HttpTransport, TransportHandle};

/// One item of caller input.
///
/// Deserializes from either a JSON string (a URL) or a JSON object
/// (a [`DownloadSpec`]).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DownloadInput {
    /// A URL string, not yet validated.
    Url(String),
    /// An already parsed URL.
    #[serde(skip)]
    Uri(Url),
    /// A record with optional per-item overrides.
    Record(DownloadSpec),
}

impl From<&str> for DownloadInput {
    fn from(value: &str) -> Self {
        Self::Url(value.to_string())
    }
}

impl From<String> for DownloadInput {
    fn from(value: String) -> Self {
        Self::Url(value)
    }
}

impl From<Url> for DownloadInput {
    fn from(value: Url) -> Self {
        Self::Uri(value)
    }
}

impl From<DownloadSpec> for DownloadInput {
    fn from(value: DownloadSpec) -> Self {
        Self::Record(value)
    }
}

impl fmt::Display for DownloadInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(raw) => write!(f, "{raw}"),
            Self::Uri(url) => write!(f, "{url}"),
            Self::Record(spec) => match &spec.url {
                Some(url) => write!(f, "{url}"),
                None => write!(f, "record without url"),
            },
        }
    }
}

/// Record-shaped input. Every field left as `None` falls back to the batch
/// [`DownloadDefaults`].
///
/// Keys are accepted in `snake_case` or `PascalCase` (`retry_count` or
/// `RetryCount`); `IgnoreSSLErrors` keeps its acronym.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadSpec {
    /// Resource to fetch.
    #[serde(alias = "Url")]
    pub url: Option<String>,
    /// Target file name override.
    #[serde(alias = "FileName")]
    pub file_name: Option<String>,
    /// Target directory override.
    #[serde(alias = "FilePath")]
    pub file_path: Option<PathBuf>,
    /// Custom request headers.
    #[serde(alias = "Headers")]
    pub headers: Option<BTreeMap<String, String>>,
    /// Caller-owned transport to borrow instead of building one.
    #[serde(skip)]
    pub transport: Option<Arc<HttpTransport>>,
    /// Buffer factor: 0 = automatic, 1..=10 = override.
    #[serde(alias = "BufferFactor")]
    pub buffer_factor: Option<u8>,
    /// Per-request timeout in seconds.
    #[serde(alias = "TimeoutSeconds")]
    pub timeout_seconds: Option<u64>,
    /// Continue a partial file with a range request.
    #[serde(alias = "Resume")]
    pub resume: Option<bool>,
    /// Retries after the first attempt.
    #[serde(alias = "RetryCount")]
    pub retry_count: Option<u32>,
    /// Pause between attempts in seconds.
    #[serde(alias = "RetryDelaySeconds")]
    pub retry_delay_seconds: Option<u64>,
    /// Accept invalid certificates.
    #[serde(alias = "IgnoreSSLErrors")]
    pub ignore_ssl_errors: Option<bool>,
    /// Overwrite an existing file without confirmation.
    #[serde(alias = "Force")]
    pub force: Option<bool>,
    /// Close the supplied transport after this item.
    #[serde(alias = "DisposeHandle")]
    pub dispose_handle: Option<bool>,
}

impl DownloadSpec {
    /// Creates a record for `url` with no overrides.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

/// Batch-wide settings applied wherever an item does not override them.
#[derive(Debug, Clone)]
pub struct DownloadDefaults {
    /// Destination directory.
    pub output_dir: PathBuf,
    /// Custom headers for every item.
    pub headers: Option<BTreeMap<String, String>>,
    /// Buffer factor: 0 = automatic.
    pub buffer_factor: u8,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Resume partial files.
    pub resume: bool,
    /// Retries after the first attempt.
    pub retry_count: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Accept invalid certificates.
    pub ignore_ssl_errors: bool,
    /// Overwrite existing files.
    pub force: bool,
}

impl Default for DownloadDefaults {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            headers: None,
            buffer_factor: 0,
            timeout: DEFAULT_TIMEOUT,
            resume: false,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: DEFAULT_RETRY_DELAY,
            ignore_ssl_errors: false,
            force: false,
        }
    }
}

/// A fully resolved download item.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Resource to fetch.
    pub url: Url,
    /// Target file name, always with an extension.
    pub file_name: String,
    /// Target directory as given (resolved to absolute by the path planner).
    pub directory: PathBuf,
    /// Custom request headers.
    pub headers: Option<BTreeMap<String, String>>,
    /// Caller-supplied transport with its ownership tag.
    pub transport: Option<TransportHandle>,
    /// Buffer factor: 0 = automatic, 1..=10 = override.
    pub buffer_factor: u8,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Continue a partial file with a range request.
    pub resume: bool,
    /// Retries after the first attempt.
    pub retry_count: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Accept invalid certificates.
    pub ignore_ssl_errors: bool,
    /// Overwrite an existing file.
    pub force: bool,
}

/// Normalizes one input item into a [`DownloadRequest`].
///
/// # Errors
///
/// Returns [`DownloadError::InputResolution`] when no http(s) URL can be
/// extracted from the input.
pub fn resolve_input(
    input: DownloadInput,
    defaults: &DownloadDefaults,
    sink: &dyn LogSink,
) -> Result<DownloadRequest, DownloadError> {
    let (url, spec) = match input {
        DownloadInput::Url(raw) => (parse_download_url(&raw)?, DownloadSpec::default()),
        DownloadInput::Uri(url) => (check_scheme(url)?, DownloadSpec::default()),
        DownloadInput::Record(mut spec) => {
            let raw = spec
                .url
                .take()
                .ok_or_else(|| DownloadError::input_resolution("record has no url"))?;
            (parse_download_url(&raw)?, spec)
        }
    };

    let (name, source) = resolve_file_name(spec.file_name.as_deref(), &url);
    let (file_name, extended) = ensure_extension(name);
    if extended {
        sink.log(
            LogLevel::Info,
            &format!(
                "name from {source} has no extension; saving as '{file_name}' \
                 (placeholder .{PLACEHOLDER_EXTENSION})"
            ),
        );
    } else if matches!(source, FileNameSource::Host | FileNameSource::Generated) {
        sink.log(
            LogLevel::Info,
            &format!("URL has no file name; saving as '{file_name}' ({source})"),
        );
    } else {
        sink.log(
            LogLevel::Debug,
            &format!("resolved file name '{file_name}' from {source}"),
        );
    }

    let buffer_factor = spec.buffer_factor.unwrap_or(defaults.buffer_factor);
    if buffer_factor > MAX_BUFFER_FACTOR {
        sink.log(
            LogLevel::Warning,
            &format!("buffer factor {buffer_factor} exceeds {MAX_BUFFER_FACTOR}; clamping"),
        );
    }

    let transport = spec.transport.map(|transport| {
        TransportHandle::borrowed(transport, spec.dispose_handle.unwrap_or(false))
    });

    Ok(DownloadRequest {
        url,
        file_name,
        directory: spec
            .file_path
            .unwrap_or_else(|| defaults.output_dir.clone()),
        headers: spec.headers.or_else(|| defaults.headers.clone()),
        transport,
        buffer_factor: buffer_factor.min(MAX_BUFFER_FACTOR),
        timeout: spec
            .timeout_seconds
            .map_or(defaults.timeout, Duration::from_secs),
        resume: spec.resume.unwrap_or(defaults.resume),
        retry_count: spec.retry_count.unwrap_or(defaults.retry_count),
        retry_delay: spec
            .retry_delay_seconds
            .map_or(defaults.retry_delay, Duration::from_secs),
        ignore_ssl_errors: spec.ignore_ssl_errors.unwrap_or(defaults.ignore_ssl_errors),
        force: spec.force.unwrap_or(defaults.force),
    })
}

fn parse_download_url(raw: &str) -> Result<Url, DownloadError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DownloadError::input_resolution("empty url"));
    }
    let url = Url::parse(trimmed).map_err(|_| DownloadError::input_resolution(trimmed))?;
    check_scheme(url)
}

fn check_scheme(url: Url) -> Result<Url, DownloadError> {
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(DownloadError::input_resolution(url.as_str())),
    }
}
