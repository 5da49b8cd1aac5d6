//! Core types shared by the fetcher, progress sinks and the CLI

use crate::error::FetchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A single unit of work: fetch `url` into `<outdir>/<name>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Destination file name inside the output directory
    pub name: String,
    /// Source URL
    pub url: String,
}

impl DownloadTask {
    pub fn new<N: Into<String>, U: Into<String>>(name: N, url: U) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

impl<N: Into<String>, U: Into<String>> From<(N, U)> for DownloadTask {
    fn from((name, url): (N, U)) -> Self {
        Self::new(name, url)
    }
}

/// How a task ended
#[derive(Debug)]
pub enum TaskOutcome {
    /// The body was fetched and published under the destination path
    Downloaded { bytes: u64, attempts: u32 },
    /// The destination already existed; no request was made
    Skipped,
    /// Every allowed attempt failed
    Failed { error: FetchError, attempts: u32 },
    /// The job was aborted before this task could finish
    Cancelled,
}

impl TaskOutcome {
    /// Short label used in logs and summaries
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Downloaded { .. } => "downloaded",
            Self::Skipped => "skipped",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// A finished task, as delivered to progress sinks and the aggregator
#[derive(Debug)]
pub struct TaskReport {
    pub task: DownloadTask,
    /// Destination path of the task
    pub path: PathBuf,
    pub outcome: TaskOutcome,
    /// Time spent on the task, including retries
    pub elapsed: Duration,
}

/// A task that could not be completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTask {
    pub name: String,
    pub url: String,
    pub error: String,
    pub attempts: u32,
}

/// Aggregate outcome of a bulk fetch
///
/// `downloaded + skipped + failed + cancelled == total` once the job returns.
#[derive(Debug, Clone, Default)]
pub struct JobResult {
    pub total: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub bytes_downloaded: u64,
    pub failures: Vec<FailedTask>,
    pub elapsed: Duration,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobResult {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Fold one finished task into the totals
    pub(crate) fn record(&mut self, report: &TaskReport) {
        match &report.outcome {
            TaskOutcome::Downloaded { bytes, .. } => {
                self.downloaded += 1;
                self.bytes_downloaded += bytes;
            },
            TaskOutcome::Skipped => self.skipped += 1,
            TaskOutcome::Failed { error, attempts } => {
                self.failed += 1;
                self.failures.push(FailedTask {
                    name: report.task.name.clone(),
                    url: report.task.url.clone(),
                    error: error.to_string(),
                    attempts: *attempts,
                });
            },
            TaskOutcome::Cancelled => self.cancelled += 1,
        }
    }

    pub(crate) fn finish(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
        self.finished_at = Some(Utc::now());
    }

    /// Number of tasks that have reached any outcome
    #[must_use]
    pub fn completed(&self) -> usize {
        self.downloaded + self.skipped + self.failed + self.cancelled
    }

    /// True when every task ended up on disk, either fetched now or already present
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }

    /// Serializable view of the result
    #[must_use]
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            total: self.total,
            downloaded: self.downloaded,
            skipped: self.skipped,
            failed: self.failed,
            cancelled: self.cancelled,
            bytes_downloaded: self.bytes_downloaded,
            elapsed_ms: self.elapsed.as_millis() as u64,
            started_at: self.started_at,
            finished_at: self.finished_at,
            failures: self.failures.clone(),
        }
    }
}

/// JSON-friendly job summary written by `--summary`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub total: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub bytes_downloaded: u64,
    pub elapsed_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failures: Vec<FailedTask>,
}
