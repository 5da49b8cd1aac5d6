//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{Cli, CliLogFormat};
use crate::{
    config::{FetchConfig, MAX_RETRIES_LIMIT},
    tracing_config::TracingFormat,
};
use anyhow::{Context, Result};
use std::time::Duration;

/// Convert CLI arguments to a `FetchConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build FetchConfig from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<FetchConfig> {
        let mut builder = FetchConfig::builder()
            .request_timeout(Duration::from_secs(cli.timeout))
            .connect_timeout(Duration::from_secs(cli.connect_timeout))
            .max_retries(cli.retries)
            .retry_backoff(Duration::from_millis(cli.retry_backoff_ms))
            .clean_stale_partials(!cli.keep_partials);

        if let Some(jobs) = cli.jobs {
            builder = builder.concurrency(jobs);
        }

        builder.build().context("Invalid configuration")
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.jobs == Some(0) {
            anyhow::bail!("--jobs must be at least 1");
        }
        if cli.timeout == 0 {
            anyhow::bail!("--timeout must be at least 1 second");
        }
        if cli.connect_timeout == 0 {
            anyhow::bail!("--connect-timeout must be at least 1 second");
        }
        if cli.retries > MAX_RETRIES_LIMIT {
            anyhow::bail!("--retries must be at most {}", MAX_RETRIES_LIMIT);
        }
        if cli.dataset.is_dir() {
            anyhow::bail!(
                "Dataset {} is a directory, expected a JSON file",
                cli.dataset.display()
            );
        }
        Ok(())
    }

    pub(crate) fn tracing_format(format: CliLogFormat) -> TracingFormat {
        match format {
            CliLogFormat::Console => TracingFormat::Console,
            CliLogFormat::Compact => TracingFormat::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => TracingFormat::Json,
        }
    }
}
