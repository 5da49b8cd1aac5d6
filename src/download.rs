//! Bulk image fetching
//!
//! This module fans a list of [`DownloadTask`]s out over a bounded pool of
//! tokio tasks. Each task skips its destination if it already exists,
//! otherwise streams the body into a private partial file and renames it into
//! place once complete, so an interrupted run never leaves a truncated file
//! under the final name.

use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::services::io::{
    destination_exists, discard_partial, ensure_output_dir, partial_path, persist_partial,
    remove_stale_partials, validate_task_name,
};
use crate::services::progress::{NoOpProgressSink, ProgressSink};
use crate::tracing_config::{events, spans};
use crate::transport::{HttpTransport, Transport};
use crate::types::{DownloadTask, JobResult, TaskOutcome, TaskReport};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Size of the buffer used to copy a body to disk
const COPY_BUFFER_SIZE: usize = 8192;

/// Bounded, resumable bulk downloader
pub struct BulkFetcher {
    config: FetchConfig,
    transport: Arc<dyn Transport>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for BulkFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkFetcher")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// State shared by every worker of one job
struct WorkerContext {
    config: FetchConfig,
    transport: Arc<dyn Transport>,
    outdir: PathBuf,
    cancel: CancellationToken,
}

impl BulkFetcher {
    /// Create a fetcher using the `reqwest` transport
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Failed to create HTTP client
    pub fn new(config: FetchConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a fetcher with a custom transport
    #[must_use]
    pub fn with_transport(config: FetchConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            progress: Arc::new(NoOpProgressSink),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a progress sink
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Abort the job when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Ensure every task's file is present in `outdir`
    ///
    /// Tasks run with at most `config.concurrency` in flight, in no
    /// particular order. Each one reaches exactly one outcome and is reported
    /// to the progress sink exactly once; the call returns after all of them
    /// have. Individual failures are recorded in the result rather than
    /// returned.
    ///
    /// # Errors
    /// - Invalid configuration
    /// - The output directory could not be created or listed
    pub async fn fetch_all<I>(&self, tasks: I, outdir: &Path) -> Result<JobResult>
    where
        I: IntoIterator<Item = DownloadTask>,
    {
        self.config.validate()?;
        let tasks: Vec<DownloadTask> = tasks.into_iter().collect();
        let total = tasks.len();
        let concurrency = self.config.concurrency;

        let job_span = spans::job(total, outdir, concurrency);
        async move {
            ensure_output_dir(outdir).await?;
            if self.config.clean_stale_partials {
                remove_stale_partials(outdir).await?;
            }

            let ctx = Arc::new(WorkerContext {
                config: self.config.clone(),
                transport: Arc::clone(&self.transport),
                outdir: outdir.to_path_buf(),
                cancel: self.cancel.clone(),
            });

            let start = Instant::now();
            let mut result = JobResult::new(total);
            self.progress.on_start(total);

            // The closure runs only when buffer_unordered has a free slot, so
            // at most `concurrency` workers are spawned at any time.
            let mut reports = stream::iter(tasks.into_iter().enumerate())
                .map(|(index, task)| {
                    let ctx = Arc::clone(&ctx);
                    let span = spans::task(&task.name, &task.url);
                    let fallback_path = ctx.outdir.join(&task.name);
                    let fallback = task.clone();
                    let handle = tokio::spawn(
                        async move { ctx.run(index, task).await }.instrument(span),
                    );
                    async move {
                        match handle.await {
                            Ok(report) => report,
                            Err(e) => TaskReport {
                                path: fallback_path,
                                task: fallback,
                                outcome: TaskOutcome::Failed {
                                    error: FetchError::internal(format!(
                                        "worker terminated abnormally: {}",
                                        e
                                    )),
                                    attempts: 0,
                                },
                                elapsed: std::time::Duration::ZERO,
                            },
                        }
                    }
                })
                .buffer_unordered(concurrency);

            while let Some(report) = reports.next().await {
                result.record(&report);
                self.progress.notify_completed(&report);
            }

            result.finish(start.elapsed());
            self.progress.on_finish(&result);

            tracing::info!(
                total = result.total,
                downloaded = result.downloaded,
                skipped = result.skipped,
                failed = result.failed,
                cancelled = result.cancelled,
                elapsed_ms = result.elapsed.as_millis() as u64,
                "Fetch job complete"
            );
            Ok(result)
        }
        .instrument(job_span)
        .await
    }
}

impl WorkerContext {
    async fn run(&self, index: usize, task: DownloadTask) -> TaskReport {
        let started = Instant::now();
        let path = self.outdir.join(&task.name);

        let outcome = if self.cancel.is_cancelled() {
            TaskOutcome::Cancelled
        } else {
            self.execute(index, &task, &path).await
        };

        TaskReport {
            task,
            path,
            outcome,
            elapsed: started.elapsed(),
        }
    }

    async fn execute(&self, index: usize, task: &DownloadTask, path: &Path) -> TaskOutcome {
        if let Err(error) = validate_task_name(&task.name) {
            return TaskOutcome::Failed { error, attempts: 0 };
        }

        match destination_exists(path).await {
            Ok(true) => {
                tracing::debug!("Already present, skipping");
                return TaskOutcome::Skipped;
            },
            Ok(false) => {},
            Err(error) => return TaskOutcome::Failed { error, attempts: 0 },
        }

        let partial = partial_path(&self.outdir, &task.name, index);
        let max_attempts = self.config.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    return cancelled_outcome(path, &partial, attempt).await;
                },
                result = self.download_once(&task.url, &partial, path) => result,
            };

            match result {
                Ok(bytes) => {
                    tracing::debug!(bytes, attempt, "Downloaded");
                    return TaskOutcome::Downloaded {
                        bytes,
                        attempts: attempt,
                    };
                },
                Err(error) => {
                    discard_partial(&partial).await;

                    if !error.is_transient() || attempt >= max_attempts {
                        return TaskOutcome::Failed {
                            error,
                            attempts: attempt,
                        };
                    }

                    let delay = self.config.retry_backoff * attempt;
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return TaskOutcome::Cancelled,
                        () = tokio::time::sleep(delay) => {},
                    }
                },
            }
        }
    }

    /// One attempt: GET, stream into `partial`, rename onto `destination`
    ///
    /// The rename is the last await, so once it has happened the attempt is
    /// reported as a success.
    async fn download_once(&self, url: &str, partial: &Path, destination: &Path) -> Result<u64> {
        let response = self.transport.get(url).await?;
        if !response.is_success() {
            return Err(FetchError::http_status(response.status, url));
        }
        let expected = response.content_length;
        let mut body = response.body;

        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|e| FetchError::file_io_error("create file", partial, &e))?;

        let mut downloaded = 0u64;
        let mut buffer = vec![0; COPY_BUFFER_SIZE];

        loop {
            let bytes_read = body
                .read(&mut buffer)
                .await
                .map_err(|e| FetchError::network_error("Failed to read download stream", e))?;

            if bytes_read == 0 {
                break; // EOF
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await
                .map_err(|e| FetchError::file_io_error("write to file", partial, &e))?;

            downloaded += bytes_read as u64;
        }

        file.flush()
            .await
            .map_err(|e| FetchError::file_io_error("flush file", partial, &e))?;
        file.sync_all()
            .await
            .map_err(|e| FetchError::file_io_error("sync file", partial, &e))?;
        drop(file);
        events::download_progress(downloaded, expected);

        if let Some(expected) = expected {
            if downloaded != expected {
                return Err(FetchError::network_error(
                    format!("Truncated body from {}", url),
                    std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("expected {} bytes, received {}", expected, downloaded),
                    ),
                ));
            }
        }

        persist_partial(partial, destination).await?;
        Ok(downloaded)
    }
}

/// Outcome of an attempt abandoned on cancellation
///
/// The destination did not exist when the task started, so a file there now
/// means the rename completed on the blocking pool after the token fired.
async fn cancelled_outcome(path: &Path, partial: &Path, attempts: u32) -> TaskOutcome {
    discard_partial(partial).await;
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => TaskOutcome::Downloaded {
            bytes: meta.len(),
            attempts,
        },
        _ => TaskOutcome::Cancelled,
    }
}

/// Fetch `tasks` into `outdir` with the default HTTP transport and no progress sink
///
/// `concurrency` is clamped to at least 1.
///
/// # Errors
/// - Failed to create HTTP client
/// - The output directory could not be created
pub async fn fetch_all<I>(tasks: I, outdir: &Path, concurrency: usize) -> Result<JobResult>
where
    I: IntoIterator<Item = DownloadTask>,
{
    let config = FetchConfig::builder().concurrency(concurrency).build()?;
    BulkFetcher::new(config)?.fetch_all(tasks, outdir).await
}
