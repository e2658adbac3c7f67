//! Per-item result records.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Serialize, Serializer};

use super::error::DownloadError;

/// Final state of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// The body was fully written.
    Completed,
    /// Resolution, setup, or every attempt failed.
    Failed,
    /// Nothing was transferred (existing file or dry run).
    Skipped,
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// The result of processing one input item.
///
/// Built only through [`completed`](Self::completed), [`failed`](Self::failed)
/// and [`skipped`](Self::skipped) so a `Failed` outcome always carries an
/// error and the other two never do.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    /// Final status.
    pub status: DownloadStatus,
    /// Target file name, when resolution got that far.
    pub file_name: Option<String>,
    /// Absolute destination path, when planning got that far.
    pub path: Option<PathBuf>,
    /// Bytes on disk at the end; `None` when undeterminable.
    pub total_bytes: Option<u64>,
    /// Wall time spent on the item.
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Session bytes per second; `None` unless a transfer happened.
    pub average_speed: Option<f64>,
    /// URL after redirects.
    pub final_url: Option<String>,
    /// Attempts made.
    pub attempts: u32,
    /// Whether the server honored a range request in the final attempt.
    pub resume_used: bool,
    /// Error with its causes, for failed items.
    pub error: Option<String>,
}

/// Fields shared by every outcome of an item that reached the destination stage.
#[derive(Debug, Clone, Default)]
pub struct OutcomeContext {
    /// Target file name.
    pub file_name: Option<String>,
    /// Absolute destination path.
    pub path: Option<PathBuf>,
    /// URL after redirects, or the requested URL.
    pub final_url: Option<String>,
}

impl DownloadOutcome {
    /// A finished transfer.
    ///
    /// `session_bytes` counts only what this run wrote; the average speed is
    /// derived from it and `session_elapsed`.
    #[must_use]
    pub fn completed(
        context: OutcomeContext,
        total_bytes: Option<u64>,
        session_bytes: u64,
        session_elapsed: Duration,
        elapsed: Duration,
        attempts: u32,
        resume_used: bool,
    ) -> Self {
        Self {
            status: DownloadStatus::Completed,
            file_name: context.file_name,
            path: context.path,
            total_bytes,
            elapsed,
            average_speed: Some(average_speed(session_bytes, session_elapsed)),
            final_url: context.final_url,
            attempts,
            resume_used,
            error: None,
        }
    }

    /// A failed item. `total_bytes` reports whatever is on disk.
    #[must_use]
    pub fn failed(
        context: OutcomeContext,
        error: &DownloadError,
        total_bytes: Option<u64>,
        elapsed: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            status: DownloadStatus::Failed,
            file_name: context.file_name,
            path: context.path,
            total_bytes,
            elapsed,
            average_speed: None,
            final_url: context.final_url,
            attempts,
            resume_used: false,
            error: Some(error.describe()),
        }
    }

    /// A skipped item reporting the existing file size, if any.
    #[must_use]
    pub fn skipped(context: OutcomeContext, existing_bytes: Option<u64>, elapsed: Duration) -> Self {
        Self {
            status: DownloadStatus::Skipped,
            file_name: context.file_name,
            path: context.path,
            total_bytes: existing_bytes,
            elapsed,
            average_speed: None,
            final_url: context.final_url,
            attempts: 0,
            resume_used: false,
            error: None,
        }
    }

    /// Returns true for completed items.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == DownloadStatus::Completed
    }
}

/// Bytes per second. A zero-length session reports the byte count itself.
#[allow(clippy::cast_precision_loss)]
fn average_speed(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { bytes as f64 / secs } else { bytes as f64 }
}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}
