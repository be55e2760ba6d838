//! Raw HTTP exchange
//!
//! This module handles the single request/response round trip, including:
//! - Building the reqwest client with the configured user agent
//! - Reading the full body for every status (error bodies feed diagnostics)
//! - Classifying network failures

use crate::config::TransportConfig;
use crate::transport::{Request, Response, TransportError, TransportResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// The network surface consumed by [`crate::transport::ResilientTransport`]
///
/// Implementations perform exactly one round trip and never retry.
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn send(&self, request: &Request) -> TransportResult<Response>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use humidor::config::TransportConfig;
/// use humidor::transport::build_http_client;
///
/// let client = build_http_client(&TransportConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &TransportConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Exchange`] backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpExchange {
    client: Client,
}

impl HttpExchange {
    pub fn new(config: &TransportConfig) -> TransportResult<Self> {
        let client = build_http_client(config).map_err(TransportError::Client)?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Exchange for HttpExchange {
    async fn send(&self, request: &Request) -> TransportResult<Response> {
        tracing::debug!("{} {}", request.method, request.url);

        let response = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| classify_error(&request.url, &e))?;

        let status = response.status().as_u16();
        let url = response.url().to_string();

        let body = response
            .text()
            .await
            .map_err(|e| classify_error(&request.url, &e))?;

        Ok(Response { url, status, body })
    }
}

/// Maps a reqwest failure to a transport error with a readable message
fn classify_error(url: &str, error: &reqwest::Error) -> TransportError {
    let message = if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        "Connection refused".to_string()
    } else {
        error.to_string()
    };

    TransportError::Network {
        url: url.to_string(),
        message,
    }
}
