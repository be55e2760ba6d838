//! Filesystem record store
//!
//! Every record is one pretty-printed JSON document named after the SHA-256
//! digest of its identity field:
//!
//! ```text
//! <dir>/3f0a...9c.json
//! ```

use crate::record::{IdentityKey, Record};
use crate::store::traits::{RecordStore, StoreError, StorePage, StoreResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Page size used when `read_bulk` is called with a zero limit
pub const DEFAULT_PAGE_SIZE: u32 = 100;

const EXTENSION: &str = "json";

/// Record store keeping one JSON document per record in a directory
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
    identity_key: IdentityKey,
}

impl FsStore {
    /// Opens a store rooted at `dir`, creating the directory if needed
    ///
    /// # Example
    ///
    /// ```no_run
    /// use humidor::{FsStore, IdentityKey};
    ///
    /// let store = FsStore::new("/tmp/humidor", IdentityKey::Url).unwrap();
    /// ```
    pub fn new(dir: impl Into<PathBuf>, identity_key: IdentityKey) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, identity_key })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn identity_key(&self) -> IdentityKey {
        self.identity_key
    }

    /// Computes the id a record is stored under
    pub fn identifier(&self, record: &Record) -> StoreResult<String> {
        let identity = self.identity_key.of(record);
        if identity.trim().is_empty() {
            return Err(StoreError::MissingIdentity {
                key: self.identity_key.to_string(),
            });
        }
        Ok(digest(identity))
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, EXTENSION))
    }

    /// Lists stored document paths sorted by file name
    fn entries(&self) -> StoreResult<Vec<PathBuf>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == EXTENSION) {
                entries.push(path);
            }
        }

        entries.sort();
        Ok(entries)
    }

    fn load(path: &Path) -> StoreResult<Record> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl RecordStore for FsStore {
    fn write(&self, record: &Record) -> StoreResult<String> {
        let id = self.identifier(record)?;

        let mut bytes = serde_json::to_vec_pretty(record)?;
        bytes.push(b'\n');

        // Write next to the target, then rename over it so readers never see
        // a truncated document
        let target = self.path_for(&id);
        let staging = self.dir.join(format!(".{}.tmp", id));
        fs::write(&staging, &bytes)?;
        fs::rename(&staging, &target)?;

        tracing::debug!("Stored {} as {}", self.identity_key.of(record), id);
        Ok(id)
    }

    fn read(&self, id: &str) -> StoreResult<Record> {
        if !is_valid_id(id) {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Self::load(&path)
    }

    fn read_bulk(&self, limit: u32, page: u32) -> StoreResult<StorePage> {
        let limit = match limit {
            0 => DEFAULT_PAGE_SIZE as usize,
            n => n as usize,
        };
        let entries = self.entries()?;

        let skip = limit.saturating_mul(page as usize);
        let records = entries
            .iter()
            .skip(skip)
            .take(limit)
            .map(|path| Self::load(path))
            .collect::<StoreResult<Vec<_>>>()?;

        let next_page = if skip.saturating_add(limit) < entries.len() {
            page + 1
        } else {
            0
        };

        Ok(StorePage { records, next_page })
    }

    fn seek(&self, name: &str) -> StoreResult<Record> {
        if self.identity_key == IdentityKey::Name {
            return self.read(&digest(name)).map_err(|e| match e {
                StoreError::NotFound(_) => StoreError::NotFound(name.to_string()),
                other => other,
            });
        }

        for path in self.entries()? {
            let record = Self::load(&path)?;
            if record.name == name {
                return Ok(record);
            }
        }

        Err(StoreError::NotFound(name.to_string()))
    }
}

/// Hex encoded SHA-256 of an identity value
fn digest(identity: &str) -> String {
    hex::encode(Sha256::digest(identity.as_bytes()))
}

/// Ids are lowercase hex SHA-256 digests; anything else never names a
/// document in the store
fn is_valid_id(id: &str) -> bool {
    id.len() == 2 * <Sha256 as Digest>::output_size()
        && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
