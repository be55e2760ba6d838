//! Store module for persisting harvested records
//!
//! This module handles record persistence, including:
//! - Content addressing by a digest of the configured identity field
//! - Idempotent single and batch writes
//! - Stable, page-based enumeration of stored records

mod fs;
mod traits;

pub use fs::{FsStore, DEFAULT_PAGE_SIZE};
pub use traits::{RecordStore, StoreError, StorePage, StoreResult};

use crate::config::StoreConfig;

/// Opens the filesystem store described by the configuration
pub fn open_store(config: &StoreConfig) -> StoreResult<FsStore> {
    FsStore::new(&config.path, config.identity_key)
}
