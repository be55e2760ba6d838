//! Store traits and error types
//!
//! This module defines the trait interface for record stores and associated
//! error types.

use crate::record::Record;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid record id '{0}'")]
    InvalidId(String),

    #[error("Record has an empty {key} and cannot be addressed")]
    MissingIdentity { key: String },

    #[error("Bulk write stopped after {} records: {source}", .written.len())]
    BulkWrite {
        /// Ids of the records persisted before the failure
        written: Vec<String>,
        source: Box<StoreError>,
    },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// One page of stored records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorePage {
    pub records: Vec<Record>,

    /// Page to request next, 0 when this was the last page
    pub next_page: u32,
}

/// Trait for record store implementations
///
/// A record is addressed by a digest of its identity field, so writing the
/// same record twice leaves the store unchanged. Implementations must be safe
/// to share between tasks.
pub trait RecordStore: Send + Sync {
    /// Persists one record, replacing any record with the same id
    ///
    /// # Returns
    ///
    /// The id the record is stored under
    fn write(&self, record: &Record) -> StoreResult<String>;

    /// Persists records in order, stopping at the first failure
    ///
    /// Records written before the failure stay written; their ids are
    /// reported in [`StoreError::BulkWrite`].
    fn write_bulk(&self, records: &[Record]) -> StoreResult<Vec<String>> {
        let mut written = Vec::with_capacity(records.len());

        for record in records {
            match self.write(record) {
                Ok(id) => written.push(id),
                Err(e) => {
                    return Err(StoreError::BulkWrite {
                        written,
                        source: Box::new(e),
                    })
                }
            }
        }

        Ok(written)
    }

    /// Reads a record by id
    fn read(&self, id: &str) -> StoreResult<Record>;

    /// Reads one page of records in a stable order
    ///
    /// # Arguments
    ///
    /// * `limit` - Records per page, 0 selects the default page size
    /// * `page` - Zero-based page number
    fn read_bulk(&self, limit: u32, page: u32) -> StoreResult<StorePage>;

    /// Finds a record by its display name
    fn seek(&self, name: &str) -> StoreResult<Record>;
}
