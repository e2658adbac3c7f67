//! Fixed-delay retry policy for transient download failures.
//!
//! A failed attempt is classified into a [`FailureType`]; the
//! [`RetryPolicy`] then decides whether another attempt fits in the budget.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use streamfetch_core::download::{
//!     DownloadError, FailureType, RetryDecision, RetryPolicy, classify_error,
//! };
//!
//! let policy = RetryPolicy::new(2, Duration::from_secs(1));
//! let error = DownloadError::http_status("https://example.com/file.iso", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use super::DownloadError;

/// Default number of retries after the initial attempt.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Classification of download failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Fault during an attempt (network, timeout, status, disk write).
    Transient,

    /// Failure that another attempt cannot fix (bad input, unusable path, closed transport).
    Terminal,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry budget with a fixed delay between attempts.
///
/// `retry_count` retries follow the initial attempt, so at most
/// `retry_count + 1` attempts are made.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    retry_count: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy allowing `retry_count` retries spaced by `delay`.
    #[must_use]
    pub fn new(retry_count: u32, delay: Duration) -> Self {
        Self { retry_count, delay }
    }

    /// Returns the maximum number of attempts, including the initial one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Returns the configured delay between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(level = "debug", skip(self), fields(max_attempts = self.max_attempts()))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Terminal {
            return RetryDecision::DoNotRetry {
                reason: "terminal failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts() {
            debug!(attempt, max = self.max_attempts(), "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts()),
            };
        }

        RetryDecision::Retry {
            delay: self.delay,
            attempt: attempt + 1,
        }
    }
}

/// Classifies a download error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Network, Timeout, HttpStatus, Io | Transient |
/// | InputResolution, PathResolution, TransportSetup | Terminal |
/// | ResumeMismatch, ExhaustedRetries | Terminal |
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    if error.is_transfer_fault() {
        FailureType::Transient
    } else {
        FailureType::Terminal
    }
}
