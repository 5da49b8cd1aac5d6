//! Shared test utilities: an in-memory transport with call accounting

#![allow(dead_code)]

use async_trait::async_trait;
use cocofetch::{DownloadTask, FetchError, Result, Transport, TransportResponse};
use std::collections::HashMap;
use std::io;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::Sleep;

/// What the mock serves for a URL
#[derive(Debug, Clone)]
pub enum Route {
    /// 200 with this body
    Body(Vec<u8>),
    /// Bare status with an empty body
    Status(u16),
    /// Connection-level failure
    Refused,
    /// Never answers
    Hang,
    /// Sends these bytes, then stalls forever
    Stall(Vec<u8>),
}

/// Scripted transport; unknown URLs answer 404
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: HashMap<String, Route>,
    latency: Duration,
    calls: AtomicUsize,
    per_url: Mutex<HashMap<String, usize>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
}

/// Counts one request as in flight until dropped
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<U: Into<String>>(mut self, url: U, route: Route) -> Self {
        self.routes.insert(url.into(), route);
        self
    }

    pub fn body<U: Into<String>>(self, url: U, body: &[u8]) -> Self {
        self.route(url, Route::Body(body.to_vec()))
    }

    /// Delay both the response head and the first body read, so overlapping
    /// transfers can be observed
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Total `get` calls
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.per_url.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Requests whose body has not been dropped yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of requests open at once, from `get` until the body is
    /// dropped
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .per_url
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let route = self.routes.get(url).cloned().unwrap_or(Route::Status(404));
        let mut response = match route {
            Route::Body(body) => response(200, body),
            Route::Status(status) => response(status, Vec::new()),
            Route::Refused => {
                return Err(FetchError::network_error(
                    format!("Failed to download {}", url),
                    io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
                ))
            },
            Route::Hang => std::future::pending::<TransportResponse>().await,
            Route::Stall(prefix) => TransportResponse {
                status: 200,
                content_length: None,
                body: Box::pin(StallingBody {
                    data: Some(prefix),
                }),
            },
        };

        let delay = (!self.latency.is_zero()).then(|| Box::pin(tokio::time::sleep(self.latency)));
        response.body = Box::pin(TrackedBody {
            inner: response.body,
            delay,
            _guard: guard,
        });
        Ok(response)
    }
}

/// Body that holds its request's in-flight slot until dropped
struct TrackedBody {
    inner: Pin<Box<dyn AsyncRead + Send>>,
    delay: Option<Pin<Box<Sleep>>>,
    _guard: InFlightGuard,
}

impl AsyncRead for TrackedBody {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(delay) = self.delay.as_mut() {
            ready!(delay.as_mut().poll(cx));
            self.delay = None;
        }
        self.inner.as_mut().poll_read(cx, buf)
    }
}

fn response(status: u16, body: Vec<u8>) -> TransportResponse {
    TransportResponse {
        status,
        content_length: Some(body.len() as u64),
        body: Box::pin(io::Cursor::new(body)),
    }
}

/// Yields its data once, then never completes
struct StallingBody {
    data: Option<Vec<u8>>,
}

impl AsyncRead for StallingBody {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.data.take() {
            Some(data) => {
                buf.put_slice(&data);
                Poll::Ready(Ok(()))
            },
            None => Poll::Pending,
        }
    }
}

/// `count` tasks named `img_<i>.jpg` served from `http://mock/img_<i>.jpg`
pub fn numbered_tasks(count: usize) -> (Vec<DownloadTask>, MockTransport) {
    let mut transport = MockTransport::new();
    let mut tasks = Vec::with_capacity(count);
    for i in 0..count {
        let task = DownloadTask::new(format!("img_{i}.jpg"), format!("http://mock/img_{i}.jpg"));
        transport = transport.body(task.url.clone(), format!("body {i}").as_bytes());
        tasks.push(task);
    }
    (tasks, transport)
}

/// Names of leftover partial files in `dir`
pub fn partial_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(cocofetch::services::PARTIAL_SUFFIX))
        .collect()
}
