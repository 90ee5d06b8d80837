//! # sled Record Backend
//!
//! Records on disk in sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree       | Key              | Value                        |
//! |------------|------------------|------------------------------|
//! | `records`  | record id (UTF-8)| `bincode(ProtectedRecord)`   |
//! | `metadata` | key (UTF-8)      | value (bytes)                |
//!
//! A record is one value under one key, so each save is a single atomic
//! insert: shards and key-shares of a record can never be torn apart on
//! disk. Every save is flushed before it returns.

use sled::{Db, Tree};
use std::path::Path;

use super::{BackendError, BackendResult, RecordBackend};
use crate::store::ProtectedRecord;

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Key in the `metadata` tree holding the record encoding version.
const META_FORMAT_VERSION: &[u8] = b"record_format_version";

/// Version of the bincode record layout this build reads and writes.
pub const RECORD_FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// SledBackend
// ---------------------------------------------------------------------------

/// Persistent record backend.
///
/// sled trees support concurrent reads and serialized writes, so the
/// backend is shared across threads behind an `Arc` without extra locking.
#[derive(Debug, Clone)]
pub struct SledBackend {
    db: Db,
    records: Tree,
    metadata: Tree,
}

impl SledBackend {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> BackendResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> BackendResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> BackendResult<Self> {
        let records = db.open_tree("records")?;
        let metadata = db.open_tree("metadata")?;

        match metadata.get(META_FORMAT_VERSION)? {
            Some(bytes) => {
                let raw = <[u8; 4]>::try_from(&bytes[..]).map_err(|_| {
                    BackendError::Serialization("malformed format version".into())
                })?;
                let found = u32::from_be_bytes(raw);
                if found != RECORD_FORMAT_VERSION {
                    return Err(BackendError::FormatVersion {
                        found,
                        expected: RECORD_FORMAT_VERSION,
                    });
                }
            }
            None => {
                metadata.insert(META_FORMAT_VERSION, &RECORD_FORMAT_VERSION.to_be_bytes()[..])?;
            }
        }

        Ok(Self {
            db,
            records,
            metadata,
        })
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Force all pending writes to disk.
    pub fn flush(&self) -> BackendResult<()> {
        self.db.flush()?;
        Ok(())
    }

    /// The on-disk format version.
    pub fn format_version(&self) -> BackendResult<Option<u32>> {
        Ok(self
            .metadata
            .get(META_FORMAT_VERSION)?
            .and_then(|bytes| <[u8; 4]>::try_from(&bytes[..]).ok().map(u32::from_be_bytes)))
    }
}

impl RecordBackend for SledBackend {
    fn name(&self) -> &'static str {
        "sled"
    }

    fn save(&self, record: &ProtectedRecord) -> BackendResult<()> {
        let bytes =
            bincode::serialize(record).map_err(|e| BackendError::Serialization(e.to_string()))?;
        self.records.insert(record.id.as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    fn load(&self, id: &str) -> BackendResult<Option<ProtectedRecord>> {
        match self.records.get(id.as_bytes())? {
            Some(bytes) => {
                let record: ProtectedRecord = bincode::deserialize(&bytes)
                    .map_err(|e| BackendError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn ids(&self) -> BackendResult<Vec<String>> {
        self.records
            .iter()
            .keys()
            .map(|key| {
                let key = key?;
                String::from_utf8(key.to_vec())
                    .map_err(|e| BackendError::Serialization(e.to_string()))
            })
            .collect()
    }
}
