//! Transfer progress events and their human-readable rendering.

use std::fmt;
use std::time::{Duration, Instant};

/// Minimum spacing between two progress emissions within one attempt.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Snapshot of an attempt's transfer progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Bytes on disk so far (resumed prefix plus this session).
    pub bytes: u64,
    /// Expected final size, when the server announced one.
    pub total: Option<u64>,
    /// Completion percentage, when the total is known.
    pub percent: Option<f64>,
    /// Session throughput in bytes per second.
    pub bytes_per_sec: f64,
    /// Time spent streaming in this attempt.
    pub elapsed: Duration,
}

impl ProgressEvent {
    /// Builds an event from running counters.
    ///
    /// Throughput only counts bytes fetched in this session, never the
    /// resumed prefix.
    #[must_use]
    pub fn new(bytes: u64, total: Option<u64>, session_bytes: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let bytes_per_sec = if secs > 0.0 {
            session_bytes as f64 / secs
        } else {
            0.0
        };
        Self {
            bytes,
            total,
            percent: percent(bytes, total),
            bytes_per_sec,
            elapsed,
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}/s",
            format_progress(self.bytes, self.total, self.elapsed.as_secs_f64()),
            format_bytes(self.bytes_per_sec as u64)
        )
    }
}

fn percent(bytes: u64, total: Option<u64>) -> Option<f64> {
    match total {
        Some(0) => Some(100.0),
        Some(total) => Some((bytes as f64 / total as f64 * 100.0).min(100.0)),
        None => None,
    }
}

/// Renders `bytes` of `total` after `elapsed_secs` seconds.
///
/// ```
/// use streamfetch_core::download::format_progress;
///
/// assert_eq!(format_progress(512, Some(1024), 1.5), "512 B / 1.0 KiB (50.0%) in 1.5s");
/// assert_eq!(format_progress(2048, None, 0.0), "2.0 KiB in 0.0s");
/// ```
#[must_use]
pub fn format_progress(bytes: u64, total: Option<u64>, elapsed_secs: f64) -> String {
    match (total, percent(bytes, total)) {
        (Some(total), Some(pct)) => format!(
            "{} / {} ({pct:.1}%) in {elapsed_secs:.1}s",
            format_bytes(bytes),
            format_bytes(total)
        ),
        _ => format!("{} in {elapsed_secs:.1}s", format_bytes(bytes)),
    }
}

/// Formats a byte count with binary units.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.1} {unit}")
}

/// Rate gate for progress emissions.
///
/// The first call is always allowed; afterwards at most one call per
/// interval returns `true`.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    /// Creates a throttle with the given interval.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns true and records `now` when an emission is due.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(PROGRESS_INTERVAL)
    }
}
