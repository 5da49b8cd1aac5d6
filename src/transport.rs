//! HTTP transport abstraction
//!
//! The fetcher talks to the network only through [`Transport`], which keeps
//! the worker pool testable against an in-memory transport.

use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use reqwest::Client;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

/// Streamed response body
pub type BodyReader = Pin<Box<dyn AsyncRead + Send>>;

/// Response head plus a streamed body
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Declared body length, if the server sent one
    pub content_length: Option<u64>,
    /// Body, read incrementally
    pub body: BodyReader,
}

impl TransportResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Source of response bodies for a URL
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET for `url`
    ///
    /// Non-success statuses are returned as responses, not errors; the caller
    /// decides what they mean.
    ///
    /// # Errors
    /// - Connection, TLS or timeout failures
    async fn get(&self, url: &str) -> Result<TransportResponse>;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport with the timeouts and user agent from `config`
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(config.concurrency)
            .build()
            .map_err(|e| FetchError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse> {
        let response =
            self.client.get(url).send().await.map_err(|e| {
                FetchError::network_error(format!("Failed to download {}", url), e)
            })?;

        let status = response.status().as_u16();
        let content_length = response.content_length();

        let body = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        Ok(TransportResponse {
            status,
            content_length,
            body: Box::pin(body),
        })
    }
}
