//! Transport module for outbound HTTP requests
//!
//! This module contains everything connectors use to talk to the network:
//! - The raw [`Exchange`] surface and its reqwest implementation
//! - Retry policy and the shared retry state
//! - [`ResilientTransport`], which backs off on HTTP 429 and surfaces every
//!   other failure immediately

mod client;
mod exchange;
mod retry;

pub use client::ResilientTransport;
pub use exchange::{build_http_client, Exchange, HttpExchange};
pub use retry::{RetryPolicy, RetryState};

use reqwest::header::HeaderMap;
use reqwest::Method;
use thiserror::Error;

/// Maximum number of body characters kept for error diagnostics
pub const SNIPPET_LEN: usize = 256;

/// Errors surfaced by the transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} from {url}, body: {snippet}")]
    Status {
        url: String,
        status: u16,
        snippet: String,
    },

    #[error("Rate limited by {url}, gave up after {attempts} attempts")]
    RetryExhausted { url: String, attempts: u32 },

    #[error("Request to {url} cancelled")]
    Cancelled { url: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl TransportError {
    /// Returns true if the error was caused by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// A request descriptor: method, target and headers
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Adds headers, replacing existing values with the same name
    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        self.headers.extend(headers.clone());
        self
    }
}

/// A fully read response
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// How the transport reacts to a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// HTTP 429, the only status that is retried
    RateLimited,
    Failure,
}

impl StatusClass {
    pub fn of(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            200..=299 => Self::Success,
            _ => Self::Failure,
        }
    }
}

/// Returns the first [`SNIPPET_LEN`] characters of a body, trimmed
pub fn snippet(body: &str) -> String {
    body.trim().chars().take(SNIPPET_LEN).collect()
}
