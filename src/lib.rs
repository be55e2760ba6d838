//! Humidor: a resilient product-record harvester
//!
//! This crate harvests cigar product records from HTML sources and persists
//! them as content-addressed JSON documents. The source-agnostic core is made
//! of four pieces:
//!
//! - [`dom`]: typed selectors and the two-phase "repeated siblings" query
//! - [`transport`]: HTTP calls with shared rate-limit backoff
//! - [`harvest`]: the connector contract, bounded fan-out and the page loop
//! - [`store`]: idempotent, paginated record persistence

pub mod config;
pub mod dom;
pub mod harvest;
pub mod record;
pub mod store;
pub mod transport;

use thiserror::Error;

/// Main error type for a harvest run
///
/// Every variant stops the run; per-item failures never surface here.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Storage error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Failed to read page {page}: {source}")]
    FatalPage {
        page: u32,
        source: harvest::ConnectorError,
    },

    #[error("Connector returned cursor {next} after page {page}, expected {expected} or 0")]
    CursorDefect { page: u32, next: u32, expected: u32 },

    #[error("Harvest cancelled")]
    Cancelled,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}': {source}")]
    InvalidSelector {
        selector: String,
        source: SelectorError,
    },
}

/// Selector construction errors
///
/// A constructed [`dom::Selector`] never fails at match time; every problem is
/// reported here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unknown element tag '{0}'")]
    UnknownTag(String),

    #[error("malformed selector '{0}'")]
    Malformed(String),

    #[error("selector '{0}' has more than one id")]
    DuplicateId(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for selector construction
pub type SelectorResult<T> = std::result::Result<T, SelectorError>;

// Re-export commonly used types
pub use config::Config;
pub use dom::{find, DomQuery, Selector, SelectorPath};
pub use harvest::{Connector, FanOut, Orchestrator, Page};
pub use record::{IdentityKey, Record};
pub use store::{FsStore, RecordStore};
pub use transport::{ResilientTransport, RetryPolicy};
