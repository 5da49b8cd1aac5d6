//! Error types for fetch operations

use thiserror::Error;

/// Result type alias for fetch operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Error types produced while loading manifests and fetching images
#[derive(Error, Debug)]
pub enum FetchError {
    /// Filesystem errors (directory creation, file writes, renames)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level failure: connection refused, reset, timeout
    #[error("Network error: {message}: {source}")]
    Network {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Server answered with a non-success status
    #[error("HTTP error {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Task name is not a single, safe path segment
    #[error("Invalid task name '{name}': {reason}")]
    InvalidTaskName { name: String, reason: String },

    /// Manifest could not be interpreted
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Manifest JSON could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The job was aborted before the task could finish
    #[error("Cancelled")]
    Cancelled,

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FetchError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new invalid manifest error
    pub fn invalid_manifest<S: Into<String>>(msg: S) -> Self {
        Self::InvalidManifest(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a network error wrapping the underlying transport error
    pub fn network_error<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Create an HTTP status error
    pub fn http_status<S: Into<String>>(status: u16, url: S) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    /// Create an invalid task name error
    pub fn invalid_task_name<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Self::InvalidTaskName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Whether another attempt at the same request could succeed
    ///
    /// Transport failures, 5xx responses and 429 are transient. Client errors,
    /// filesystem errors and bad input are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
