//! Bulk image fetcher CLI
//!
//! Reads a COCO annotation file and makes sure every listed image is present
//! in the output directory.

use super::config::CliConfigBuilder;
use crate::{
    download::BulkFetcher,
    manifest::CocoManifest,
    services::{format_size, BarProgressSink, LogProgressSink, ProgressSink},
    tracing_config::{events, init_cli_tracing},
    types::JobResult,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Failures listed individually before the rest are summarised
const MAX_LISTED_FAILURES: usize = 20;

/// Download images from a COCO annotation file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "cocofetch")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Path to JSON COCO annotation file
    #[arg(value_name = "DATASET")]
    pub dataset: PathBuf,

    /// Path to desired output folder
    #[arg(long, value_name = "DIR", default_value = "images")]
    pub outpath: PathBuf,

    /// Maximum simultaneous downloads [default: 2 x available CPUs]
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub connect_timeout: u64,

    /// Retries per image after network errors or 5xx/429 responses
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub retries: u32,

    /// Base delay between retries in milliseconds (grows linearly per attempt)
    #[arg(long, value_name = "MS", default_value_t = 500)]
    pub retry_backoff_ms: u64,

    /// Log one line per image instead of drawing a progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Write a JSON summary of the run to this file
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,

    /// Leave partial files from earlier interrupted runs in place
    #[arg(long)]
    pub keep_partials: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose, CliConfigBuilder::tracing_format(cli.log_format))
        .context("Failed to initialize tracing")?;

    run(&cli).await
}

/// Run a fetch job for parsed arguments
///
/// Returns an error when the job could not start, or when it finished with
/// failed or cancelled images.
pub async fn run(cli: &Cli) -> Result<()> {
    CliConfigBuilder::validate_cli(cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(cli).context("Failed to build configuration")?;

    info!("Opening {}", cli.dataset.display());
    let manifest = CocoManifest::from_path(&cli.dataset)
        .with_context(|| format!("Failed to load manifest {}", cli.dataset.display()))?;
    let manifest_tasks = manifest.tasks();
    if manifest_tasks.missing_url > 0 {
        warn!(
            "{} images have no URL and will not be fetched",
            manifest_tasks.missing_url
        );
    }
    info!("Retrieving {} images", manifest_tasks.tasks.len());
    debug!(config = ?config, "Fetch configuration");

    let progress: Arc<dyn ProgressSink> = if cli.no_progress {
        Arc::new(LogProgressSink::new())
    } else {
        Arc::new(BarProgressSink::new())
    };

    let cancel = CancellationToken::new();
    let signal_handle = spawn_interrupt_handler(cancel.clone());

    let fetcher = BulkFetcher::new(config)
        .context("Failed to create fetcher")?
        .with_progress(progress)
        .with_cancellation(cancel);

    let result = fetcher
        .fetch_all(manifest_tasks.tasks, &cli.outpath)
        .await
        .map_err(|e| {
            events::error_with_context(&e, "fetch job");
            e
        })
        .with_context(|| format!("Failed to fetch into {}", cli.outpath.display()))?;
    signal_handle.abort();

    print_summary(&result, &cli.outpath);

    if let Some(summary_path) = &cli.summary {
        write_summary(summary_path, &result)?;
        info!("Summary written to {}", summary_path.display());
    }

    if result.cancelled > 0 {
        anyhow::bail!(
            "Interrupted: {} of {} images were not processed",
            result.cancelled,
            result.total
        );
    }
    if result.failed > 0 {
        anyhow::bail!("{} of {} images failed to download", result.failed, result.total);
    }

    Ok(())
}

/// Cancel `token` on the first Ctrl-C
fn spawn_interrupt_handler(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing up");
            token.cancel();
        }
    })
}

fn print_summary(result: &JobResult, outdir: &Path) {
    println!("{}", summary_line(result, outdir));

    for failure in result.failures.iter().take(MAX_LISTED_FAILURES) {
        eprintln!("❌ {} ({}): {}", failure.name, failure.url, failure.error);
    }
    if result.failures.len() > MAX_LISTED_FAILURES {
        eprintln!(
            "   ... and {} more failures",
            result.failures.len() - MAX_LISTED_FAILURES
        );
    }
}

fn summary_line(result: &JobResult, outdir: &Path) -> String {
    let status = if result.is_success() { "✅" } else { "⚠️" };
    format!(
        "{} {} downloaded ({}), {} already present, {} failed{} in {:.2}s -> {}",
        status,
        result.downloaded,
        format_size(result.bytes_downloaded),
        result.skipped,
        result.failed,
        if result.cancelled > 0 {
            format!(", {} cancelled", result.cancelled)
        } else {
            String::new()
        },
        result.elapsed.as_secs_f64(),
        outdir.display()
    )
}

fn write_summary(path: &Path, result: &JobResult) -> Result<()> {
    let json = serde_json::to_vec_pretty(&result.summary()).context("Failed to encode summary")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write summary to {}", path.display()))
}
