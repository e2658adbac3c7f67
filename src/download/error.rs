//! Error types for the download module.
//!
//! Every failure an item can hit on its way through the pipeline is a
//! [`DownloadError`] variant. Transfer faults (network, timeout, unexpected
//! status, local write) are retryable; resolution and setup failures are
//! terminal for the item.

use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving, planning, or transferring a download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// No usable http(s) URL could be extracted from the input item.
    #[error("could not resolve a download URL from input: {input}")]
    InputResolution {
        /// Description of the rejected input.
        input: String,
    },

    /// The destination directory or file path is unusable.
    #[error("unusable destination {path}: {reason}")]
    PathResolution {
        /// The offending path.
        path: PathBuf,
        /// Why the path was rejected.
        reason: String,
        /// The underlying IO error, when one occurred.
        #[source]
        source: Option<std::io::Error>,
    },

    /// The HTTP transport could not be constructed or is no longer usable.
    #[error("HTTP transport unavailable: {reason}")]
    TransportSetup {
        /// Why the transport is unavailable.
        reason: String,
        /// The underlying client builder error, when one occurred.
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, broken stream).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The server answered with a status the engine cannot use.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while writing the destination.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A `206` response did not start at the requested offset.
    ///
    /// Never terminal: the attempt is downgraded to a fresh download.
    #[error("server answered range request for offset {requested} with a range starting at {served}")]
    ResumeMismatch {
        /// Offset sent in the `Range` header.
        requested: u64,
        /// First byte reported by `Content-Range`, or "unknown".
        served: String,
    },

    /// Every attempt allowed by the retry budget failed.
    #[error("gave up on {url} after {attempts} attempts")]
    ExhaustedRetries {
        /// The URL of the last attempt.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// The fault that ended the final attempt.
        #[source]
        last: Box<DownloadError>,
    },
}

impl DownloadError {
    /// Creates an input resolution error.
    pub fn input_resolution(input: impl Into<String>) -> Self {
        Self::InputResolution {
            input: input.into(),
        }
    }

    /// Creates a path resolution error without an IO cause.
    pub fn path_resolution(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::PathResolution {
            path: path.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Creates a path resolution error caused by an IO failure.
    pub fn path_io(
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::PathResolution {
            path: path.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Creates a transport setup error.
    pub fn transport_setup(reason: impl Into<String>, source: Option<reqwest::Error>) -> Self {
        Self::TransportSetup {
            reason: reason.into(),
            source,
        }
    }

    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a resume mismatch notice.
    pub fn resume_mismatch(requested: u64, served: Option<u64>) -> Self {
        Self::ResumeMismatch {
            requested,
            served: served.map_or_else(|| "unknown".to_string(), |start| start.to_string()),
        }
    }

    /// Wraps the final attempt's fault once the retry budget is spent.
    pub fn exhausted(url: impl Into<String>, attempts: u32, last: DownloadError) -> Self {
        Self::ExhaustedRetries {
            url: url.into(),
            attempts,
            last: Box::new(last),
        }
    }

    /// Returns true for faults that happen during an attempt and may succeed on retry.
    #[must_use]
    pub fn is_transfer_fault(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } | Self::Io { .. }
        )
    }

    /// Renders the error followed by every underlying cause.
    ///
    /// Causes already quoted by an outer message are not repeated.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = self.to_string();
        let mut cause = self.source();
        while let Some(err) = cause {
            let rendered = err.to_string();
            if !text.contains(&rendered) {
                text.push_str(": ");
                text.push_str(&rendered);
            }
            cause = err.source();
        }
        text
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path context the source error does not carry.
