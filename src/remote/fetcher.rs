//! HTTP fetcher implementation
//!
//! This module handles the raw HTTP side of the harvester:
//! - Building the shared, connection-pooled HTTP client
//! - Classifying transport and status failures
//! - Fetching page artifacts as raw bytes

use crate::config::RemoteConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Failure of a single HTTP request
///
/// All variants are transient from the harvester's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected content type: {0}")]
    ContentType(String),
}

impl FetchError {
    /// Returns true if the remote host reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status(404))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Builds the HTTP client shared by all workers of one pass
///
/// The idle pool per host is sized to `pool_size` so that connection reuse
/// never limits a pool of that many workers.
///
/// # Example
///
/// ```no_run
/// use flipharvest::config::RemoteConfig;
/// use flipharvest::remote::build_http_client;
///
/// let client = build_http_client(&RemoteConfig::default(), 8).unwrap();
/// ```
pub fn build_http_client(config: &RemoteConfig, pool_size: usize) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(config.request_timeout_secs);

    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(timeout)
        .connect_timeout(timeout)
        .pool_max_idle_per_host(pool_size)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches the raw content of one address
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Plain HTTP GET page fetcher
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;
        if let Some(err) = check_status(response.status()) {
            return Err(err);
        }
        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}

/// Returns the Content-Type header value, or an empty string
pub(crate) fn content_type(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Maps a status code onto a fetch error, `None` for success
pub(crate) fn check_status(status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        None
    } else {
        Some(FetchError::Status(status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&RemoteConfig::default(), 8);
        assert!(client.is_ok());
    }

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(FetchError::Status(503).to_string(), "HTTP 503");
        assert_eq!(FetchError::Timeout.to_string(), "Request timeout");
    }

    #[test]
    fn test_not_found() {
        assert!(FetchError::Status(404).is_not_found());
        assert!(!FetchError::Status(410).is_not_found());
        assert!(!FetchError::Timeout.is_not_found());
    }

    #[test]
    fn test_check_status() {
        assert_eq!(check_status(StatusCode::OK), None);
        assert_eq!(
            check_status(StatusCode::NOT_FOUND),
            Some(FetchError::Status(404))
        );
    }
}
