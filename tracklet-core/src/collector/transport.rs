//! HTTP transport for the collector endpoint
//!
//! Each delivery attempt opens a fresh [`TransportSession`], sends one gzip
//! body and yields exactly one [`AttemptOutcome`]. Sessions are never reused;
//! [`SessionGuard`] releases them on every exit path, including early returns
//! and unwinding.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio::task::AbortHandle;

use crate::error::{Error, Result};

/// One POST to the collector
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// `{api_link}?{query_param}`
    pub url: String,
    /// Gzip body
    pub body: Bytes,
}

/// Terminal result of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// HTTP 200
    Success,
    /// Any other HTTP status
    HttpError { status: u16 },
    /// Connection failure or a failure while building/sending the request
    NetworkError(String),
    /// Transport timeout elapsed
    Timeout,
}

impl AttemptOutcome {
    /// The error a failed attempt represents, `None` for success
    pub fn to_error(&self) -> Option<Error> {
        match self {
            AttemptOutcome::Success => None,
            AttemptOutcome::HttpError { status } => Some(Error::HttpStatus(*status)),
            AttemptOutcome::NetworkError(msg) => Some(Error::Network(msg.clone())),
            AttemptOutcome::Timeout => Some(Error::Timeout),
        }
    }
}

/// Factory for per-attempt sessions
pub trait Transport: Send + Sync {
    /// Create a new session. An error here counts as a network failure for
    /// the attempt.
    fn open(&self) -> Result<Box<dyn TransportSession>>;
}

/// One request lifecycle
#[async_trait]
pub trait TransportSession: Send {
    /// Send the request and wait for its single terminal outcome
    async fn send(&mut self, request: OutboundRequest) -> AttemptOutcome;

    /// Drop any pending completion and abort the connection.
    ///
    /// Must be idempotent and must not panic.
    fn release(&mut self);
}

/// Owns a session and releases it exactly once
pub struct SessionGuard {
    session: Option<Box<dyn TransportSession>>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn TransportSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub async fn send(&mut self, request: OutboundRequest) -> AttemptOutcome {
        match self.session.as_mut() {
            Some(session) => session.send(request).await,
            None => AttemptOutcome::NetworkError("transport session already released".to_string()),
        }
    }

    pub fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release();
        }
    }

    pub fn is_released(&self) -> bool {
        self.session.is_none()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// reqwest-backed transport
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }
}

impl Transport for HttpTransport {
    fn open(&self) -> Result<Box<dyn TransportSession>> {
        Ok(Box::new(HttpSession {
            http_client: self.http_client.clone(),
            in_flight: None,
            released: false,
        }))
    }
}

/// A single in-flight POST
///
/// The request runs on its own task; releasing the session aborts that task,
/// which drops the connection.
struct HttpSession {
    http_client: reqwest::Client,
    in_flight: Option<AbortHandle>,
    released: bool,
}

#[async_trait]
impl TransportSession for HttpSession {
    async fn send(&mut self, request: OutboundRequest) -> AttemptOutcome {
        if self.released {
            return AttemptOutcome::NetworkError("transport session already released".to_string());
        }

        let pending = self
            .http_client
            .post(&request.url)
            .body(request.body)
            .send();

        let task = tokio::spawn(async move { pending.await.map(|response| response.status()) });
        self.in_flight = Some(task.abort_handle());

        match task.await {
            Ok(Ok(status)) if status == StatusCode::OK => AttemptOutcome::Success,
            Ok(Ok(status)) => AttemptOutcome::HttpError {
                status: status.as_u16(),
            },
            Ok(Err(e)) if e.is_timeout() => AttemptOutcome::Timeout,
            Ok(Err(e)) => AttemptOutcome::NetworkError(e.to_string()),
            Err(e) => AttemptOutcome::NetworkError(format!("request task failed: {}", e)),
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}
