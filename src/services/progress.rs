//! Progress reporting service
//!
//! The fetcher only promises to call [`ProgressSink::notify_completed`] once
//! per task; how that is rendered is up to the sink.

use crate::types::{JobResult, TaskOutcome, TaskReport};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Observer notified as tasks finish
///
/// Implementations are shared across workers and must tolerate concurrent
/// calls.
pub trait ProgressSink: Send + Sync {
    /// Called once before any task runs
    fn on_start(&self, total: usize) {
        let _ = total;
    }

    /// Called exactly once per task, whatever its outcome
    fn notify_completed(&self, report: &TaskReport);

    /// Called once after every task has been reported
    fn on_finish(&self, result: &JobResult) {
        let _ = result;
    }
}

/// Progress sink that discards all notifications
#[derive(Debug, Default)]
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn notify_completed(&self, _report: &TaskReport) {
        // Intentionally empty
    }
}

/// Progress sink that keeps per-outcome counters
#[derive(Debug, Default)]
pub struct CountingProgressSink {
    completed: AtomicUsize,
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
}

impl CountingProgressSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl ProgressSink for CountingProgressSink {
    fn notify_completed(&self, report: &TaskReport) {
        let counter = match report.outcome {
            TaskOutcome::Downloaded { .. } => &self.downloaded,
            TaskOutcome::Skipped => &self.skipped,
            TaskOutcome::Failed { .. } => &self.failed,
            TaskOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Progress sink that emits one tracing event per task
#[derive(Debug, Default)]
pub struct LogProgressSink {
    total: AtomicUsize,
    completed: AtomicUsize,
}

impl LogProgressSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for LogProgressSink {
    fn on_start(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        tracing::info!(total, "Fetching images");
    }

    fn notify_completed(&self, report: &TaskReport) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total.load(Ordering::SeqCst);

        match &report.outcome {
            TaskOutcome::Failed { error, attempts } => tracing::warn!(
                completed,
                total,
                name = %report.task.name,
                url = %report.task.url,
                attempts,
                error = %error,
                "Fetch failed"
            ),
            outcome => tracing::info!(
                completed,
                total,
                name = %report.task.name,
                outcome = outcome.label(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Task finished"
            ),
        }
    }

    fn on_finish(&self, result: &JobResult) {
        tracing::info!(
            total = result.total,
            downloaded = result.downloaded,
            skipped = result.skipped,
            failed = result.failed,
            cancelled = result.cancelled,
            "Fetch job finished"
        );
    }
}

/// Terminal progress bar backed by `indicatif`
#[cfg(feature = "cli")]
pub struct BarProgressSink {
    bar: indicatif::ProgressBar,
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

#[cfg(feature = "cli")]
impl BarProgressSink {
    /// Create a bar; its length is set in `on_start`
    #[must_use]
    pub fn new() -> Self {
        let bar = indicatif::ProgressBar::new(0);
        bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        Self {
            bar,
            downloaded: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    fn message(&self) -> String {
        format!(
            "{} new, {} present, {} failed",
            self.downloaded.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed)
        )
    }
}

#[cfg(feature = "cli")]
impl Default for BarProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "cli")]
impl ProgressSink for BarProgressSink {
    fn on_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn notify_completed(&self, report: &TaskReport) {
        match &report.outcome {
            TaskOutcome::Downloaded { .. } => {
                self.downloaded.fetch_add(1, Ordering::Relaxed);
            },
            TaskOutcome::Skipped => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            },
            TaskOutcome::Failed { error, .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.bar
                    .println(format!("❌ {}: {}", report.task.name, error));
            },
            TaskOutcome::Cancelled => {},
        }
        self.bar.set_message(self.message());
        self.bar.inc(1);
    }

    fn on_finish(&self, result: &JobResult) {
        let status = if result.is_success() { "✅" } else { "⚠️" };
        self.bar.finish_with_message(format!("{} {}", status, self.message()));
    }
}
