#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # cocofetch
//!
//! Resumable bulk image fetcher for COCO-style annotation manifests.
//!
//! Given `(name, url)` pairs, the fetcher makes sure every file is present in
//! an output directory. Files that already exist are skipped without a
//! request, missing ones are streamed to disk by a bounded pool of async
//! workers, and a failure of one task never stops the others.
//!
//! ## Features
//!
//! - **Resumable**: re-running a job only fetches what is missing
//! - **Atomic writes**: bodies land in a partial file and are renamed into place
//! - **Bounded concurrency**: defaults to twice the available parallelism
//! - **Retries**: optional, for network errors and 5xx/429 responses
//! - **Progress**: pluggable [`ProgressSink`], with a terminal bar under the `cli` feature
//! - **Cancellation**: a [`CancellationToken`] aborts in-flight and pending tasks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cocofetch::{BulkFetcher, CocoManifest, FetchConfig};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let manifest = CocoManifest::from_path("dataset.json")?;
//! let config = FetchConfig::builder().concurrency(16).max_retries(2).build()?;
//!
//! let fetcher = BulkFetcher::new(config)?;
//! let result = fetcher.fetch_all(manifest.tasks().tasks, Path::new("images")).await?;
//! println!("{} downloaded, {} already present", result.downloaded, result.skipped);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface, progress bar and subscriber setup
//! - `tracing-json`: JSON log output for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! cocofetch = { version = "0.1", default-features = false }
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod manifest;
pub mod services;
pub mod tracing_config;
pub mod transport;
pub mod types;

// Public API exports
pub use config::{default_concurrency, FetchConfig, FetchConfigBuilder, MAX_RETRIES_LIMIT};
pub use download::{fetch_all, BulkFetcher};
pub use error::{FetchError, Result};
pub use manifest::{CocoImage, CocoManifest, ManifestTasks};
#[cfg(feature = "cli")]
pub use services::BarProgressSink;
pub use services::{
    format_size, CountingProgressSink, LogProgressSink, NoOpProgressSink, ProgressSink,
};
pub use tokio_util::sync::CancellationToken;
pub use tracing_config::{events, spans, TracingConfig, TracingFormat};
#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
pub use transport::{BodyReader, HttpTransport, Transport, TransportResponse};
pub use types::{DownloadTask, FailedTask, JobResult, JobSummary, TaskOutcome, TaskReport};
