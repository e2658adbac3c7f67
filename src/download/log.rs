//! Leveled reporting seam between the engine and its host.
//!
//! The engine reports every user-relevant decision (phase failures, retries,
//! resume negotiation, buffer sizing, final outcome) through a [`LogSink`].
//! [`TracingSink`] forwards to `tracing`; [`RecordingSink`] keeps everything
//! in memory for embedding applications and tests.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, error, info, trace, warn};

use super::progress::ProgressEvent;

/// Severity of a reported message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    /// An item or phase failed.
    Error,
    /// Something went wrong but processing continues.
    Warning,
    /// Normal progress information.
    Info,
    /// An item finished successfully.
    Success,
    /// Decisions useful when diagnosing behavior.
    Debug,
    /// High-volume detail such as progress lines.
    Verbose,
}

impl LogLevel {
    /// Returns the stable upper-case label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
            Self::Debug => "DEBUG",
            Self::Verbose => "VERBOSE",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver for engine messages and progress events.
pub trait LogSink: Send + Sync {
    /// Records one message.
    fn log(&self, level: LogLevel, message: &str);

    /// Receives a throttled progress event. Defaults to a verbose log line.
    fn progress(&self, event: &ProgressEvent) {
        self.log(LogLevel::Verbose, &event.to_string());
    }
}

/// Forwards engine messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => error!("{message}"),
            LogLevel::Warning => warn!("{message}"),
            LogLevel::Info => info!("{message}"),
            LogLevel::Success => info!(outcome = "success", "{message}"),
            LogLevel::Debug => debug!("{message}"),
            LogLevel::Verbose => trace!("{message}"),
        }
    }
}

/// Keeps every message and progress event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<(LogLevel, String)>>,
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded messages in arrival order.
    #[must_use]
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the recorded messages at `level`.
    #[must_use]
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(entry_level, _)| *entry_level == level)
            .map(|(_, message)| message)
            .collect()
    }

    /// Returns true if any message contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|(_, message)| message.contains(needle))
    }

    /// Returns a copy of all recorded progress events.
    #[must_use]
    pub fn progress_events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogSink for RecordingSink {
    fn log(&self, level: LogLevel, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }

    fn progress(&self, event: &ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
