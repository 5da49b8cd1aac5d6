//! Configuration types for fetch jobs

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on retries per task
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay unit between retries (multiplied by the attempt number)
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Number of in-flight fetches used when none is configured
///
/// Twice the available parallelism of the host, never less than 1.
#[must_use]
pub fn default_concurrency() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    (cpus * 2).max(1)
}

/// Configuration for a bulk fetch job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum number of simultaneously in-flight tasks (always >= 1)
    pub concurrency: usize,

    /// Timeout for a whole request, headers and body included
    pub request_timeout: Duration,

    /// Timeout for establishing the connection
    pub connect_timeout: Duration,

    /// Additional attempts after a transient failure (0 = at most one attempt)
    pub max_retries: u32,

    /// Base delay between attempts; attempt `n` waits `n * retry_backoff`
    pub retry_backoff: Duration,

    /// User agent sent with every request
    pub user_agent: String,

    /// Remove leftover partial files from interrupted runs at job start
    pub clean_stale_partials: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_retries: 0,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            user_agent: format!("cocofetch/{}", env!("CARGO_PKG_VERSION")),
            clean_stale_partials: true,
        }
    }
}

impl FetchConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use cocofetch::FetchConfig;
    /// use std::time::Duration;
    ///
    /// let config = FetchConfig::builder()
    ///     .concurrency(8)
    ///     .request_timeout(Duration::from_secs(30))
    ///     .max_retries(2)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.concurrency, 8);
    /// ```
    #[must_use]
    pub fn builder() -> FetchConfigBuilder {
        FetchConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Validation Rules
    ///
    /// - Concurrency: at least 1
    /// - Request and connect timeouts: non-zero
    /// - Max retries: 0-10
    ///
    /// # Errors
    /// - Any of the rules above is violated
    ///
    /// # Examples
    /// ```rust
    /// use cocofetch::FetchConfig;
    ///
    /// let mut config = FetchConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.max_retries = 50;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> crate::Result<()> {
        if self.concurrency == 0 {
            return Err(FetchError::config_value_error(
                "concurrency",
                self.concurrency,
                ">= 1",
                Some(default_concurrency()),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(FetchError::invalid_config(
                "Request timeout must be greater than zero",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(FetchError::invalid_config(
                "Connect timeout must be greater than zero",
            ));
        }

        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(FetchError::config_value_error(
                "max retries",
                self.max_retries,
                "0-10",
                Some(3),
            ));
        }

        Ok(())
    }

    /// Total number of attempts a task may make
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Builder for `FetchConfig`
#[derive(Debug, Default)]
pub struct FetchConfigBuilder {
    config: FetchConfig,
}

impl FetchConfigBuilder {
    /// Set the number of in-flight tasks (clamped to at least 1)
    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency.max(1);
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the connection timeout
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the number of retries after transient failures
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the base delay between attempts
    #[must_use]
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Enable or disable removal of stale partial files at job start
    #[must_use]
    pub fn clean_stale_partials(mut self, clean: bool) -> Self {
        self.config.clean_stale_partials = clean;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Zero timeouts
    /// - Retry count above the allowed maximum
    pub fn build(self) -> crate::Result<FetchConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert!(config.concurrency >= 2);
        assert_eq!(config.concurrency % 2, 0);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.max_attempts(), 1);
        assert!(config.clean_stale_partials);
        assert!(config.user_agent.starts_with("cocofetch/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = FetchConfig::builder()
            .concurrency(4)
            .request_timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(1))
            .max_retries(3)
            .retry_backoff(Duration::from_millis(10))
            .user_agent("tests")
            .clean_stale_partials(false)
            .build()
            .unwrap();

        assert_eq!(config.concurrency, 4);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_attempts(), 4);
        assert_eq!(config.retry_backoff, Duration::from_millis(10));
        assert_eq!(config.user_agent, "tests");
        assert!(!config.clean_stale_partials);
    }

    #[test]
    fn test_concurrency_clamped_to_one() {
        let config = FetchConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_config_validation() {
        let mut config = FetchConfig::default();
        assert!(config.validate().is_ok());

        config.concurrency = 0;
        assert!(config.validate().is_err());
        config.concurrency = 1;

        config.request_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.request_timeout = DEFAULT_REQUEST_TIMEOUT;

        config.connect_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.connect_timeout = DEFAULT_CONNECT_TIMEOUT;

        config.max_retries = MAX_RETRIES_LIMIT;
        assert!(config.validate().is_ok());
        config.max_retries = MAX_RETRIES_LIMIT + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max retries"));
        assert!(err.to_string().contains("0-10"));
    }

    #[test]
    fn test_builder_rejects_invalid_retries() {
        let result = FetchConfig::builder().max_retries(11).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_default_concurrency_is_twice_cpus() {
        let cpus = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        assert_eq!(default_concurrency(), cpus * 2);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = FetchConfig::builder().concurrency(3).build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: FetchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
