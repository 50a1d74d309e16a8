//! HTTP transport seam beneath the page fetcher.
//!
//! The fetcher only needs "GET this URL, give me the status and body". Keeping
//! that behind a trait lets the retry/backoff logic run against a scripted
//! transport in tests while production uses `reqwest`.

use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracked_core::ApiConfig;

/// Raw response of one GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl TransportResponse {
    /// Create a response from a status and body.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failure to obtain any response at all.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying client gave up waiting
    #[error("request timed out")]
    Timeout,

    /// Connection, DNS or TLS failure
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other client-side failure
    #[error("request failed: {0}")]
    Other(String),
}

/// Issues GET requests against the listing API.
///
/// Implementations must be thread-safe (Send + Sync) for use in async contexts.
#[async_trait]
pub trait ListingTransport: Send + Sync {
    /// Perform a GET request and return the status and body.
    ///
    /// Non-2xx statuses are a successful transport round-trip and must be
    /// returned as a [`TransportResponse`], not an error.
    async fn get(&self, url: &str) -> std::result::Result<TransportResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport with the API's headers and user agent.
    ///
    /// Per-request deadlines are enforced by the fetcher; `connect_timeout`
    /// only bounds connection setup.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(api: &ApiConfig, connect_timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .user_agent(api.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ListingTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> std::result::Result<TransportResponse, TransportError> {
        let response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;
        Ok(TransportResponse { status, body })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
