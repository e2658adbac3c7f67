//! Terminal sink: tracing output plus an indicatif bar for the active item.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use streamfetch_core::download::{LogLevel, LogSink, ProgressEvent, TracingSink};

const BAR_TEMPLATE: &str =
    "{spinner} [{elapsed_precise}] [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner} [{elapsed_precise}] {bytes} ({bytes_per_sec})";

/// Forwards engine messages to tracing and draws progress bars when enabled.
///
/// With bars disabled, progress events become trace-level log lines.
pub(crate) struct ConsoleSink {
    show_bars: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    pub(crate) fn new(show_bars: bool) -> Self {
        Self {
            show_bars,
            bar: Mutex::new(None),
        }
    }

    fn with_bar<R>(&self, f: impl FnOnce(&mut Option<ProgressBar>) -> R) -> R {
        let mut guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

fn new_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template(SPINNER_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        }
    }
}

impl LogSink for ConsoleSink {
    fn log(&self, level: LogLevel, message: &str) {
        self.with_bar(|slot| {
            let item_finished = matches!(level, LogLevel::Success | LogLevel::Error);
            if item_finished && let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
            match slot.as_ref() {
                Some(bar) => bar.suspend(|| TracingSink.log(level, message)),
                None => TracingSink.log(level, message),
            }
        });
    }

    fn progress(&self, event: &ProgressEvent) {
        if !self.show_bars {
            TracingSink.progress(event);
            return;
        }
        self.with_bar(|slot| {
            let bar = slot.get_or_insert_with(|| new_bar(event.total));
            if let Some(total) = event.total {
                bar.set_length(total);
            }
            bar.set_position(event.bytes);
        });
    }
}

impl Drop for ConsoleSink {
    fn drop(&mut self) {
        self.with_bar(|slot| {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        });
    }
}
