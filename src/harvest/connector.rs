//! The connector contract
//!
//! A connector turns one source into records. The orchestrator only ever
//! talks to this trait and never sees markup or URLs.

use crate::record::Record;
use crate::transport::TransportError;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Errors returned by connectors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Record not found: {0}")]
    NotFound(String),

    /// The listing or its pagination metadata could not be read
    #[error("Unreadable page: {0}")]
    FatalPage(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Fetch cancelled")]
    Cancelled,
}

impl ConnectorError {
    /// Returns true if the error was caused by cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Transport(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

/// One page of bulk results
#[derive(Debug, Default)]
pub struct Page {
    pub records: Vec<Record>,

    /// `page + 1` while more data exists, 0 once the source is exhausted
    pub next_page: u32,

    /// Detail fetches that failed; the page is still usable
    pub failures: Option<AggregateError>,
}

/// A source of records
///
/// # Example
///
/// ```no_run
/// use humidor::harvest::{Connector, ConnectorError, Page};
///
/// async fn first_page(connector: &dyn Connector) -> Result<Page, ConnectorError> {
///     connector.read_bulk(50, 1).await
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync {
    /// Source name used in logs
    fn name(&self) -> &str;

    /// Reads a single record by its source id
    async fn read(&self, id: &str) -> Result<Record, ConnectorError>;

    /// Reads up to `limit` records of `page`
    ///
    /// The returned cursor must be `page + 1` or 0; anything else aborts the
    /// harvest.
    async fn read_bulk(&self, limit: u32, page: u32) -> Result<Page, ConnectorError>;
}

/// One failed fetch task
#[derive(Debug)]
pub struct TaskFailure {
    /// What the task was fetching, usually a URL
    pub target: String,
    pub error: ConnectorError,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.error)
    }
}

/// Every task failure of one fan-out, reported as a single error
#[derive(Debug, Error)]
pub struct AggregateError {
    failures: Vec<TaskFailure>,
}

impl AggregateError {
    /// Wraps failures, returning `None` when there are none
    pub fn from_failures(failures: Vec<TaskFailure>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self { failures })
        }
    }

    pub fn failures(&self) -> &[TaskFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} task(s) failed: ", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}
