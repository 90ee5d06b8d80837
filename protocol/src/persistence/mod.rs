//! # Record Persistence
//!
//! The store writes every protected record through a [`RecordBackend`]:
//! shards and key-shares of one record are always saved together as a single
//! value, so a reader never sees the shards of one generation beside the
//! key-shares of another.
//!
//! ```text
//! memory.rs        process-local map, used by tests and the default config
//! sled_backend.rs  sled tree on disk, bincode-encoded records
//! ```
//!
//! The backend is picked from [`BackendConfig`] by [`open_backend`]; the
//! store only ever sees the trait object.

pub mod memory;
pub mod sled_backend;

pub use memory::MemoryBackend;
pub use sled_backend::SledBackend;

use std::sync::Arc;

use crate::config::{BackendConfig, BackendKind};
use crate::store::ProtectedRecord;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur while saving or loading records.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backend refuses writes (taken offline, read-only media).
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The on-disk format was written by an incompatible version.
    #[error("unsupported record format version {found}, expected {expected}")]
    FormatVersion {
        /// Version found in the metadata tree.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },

    #[error("backend misconfigured: {0}")]
    Config(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

// ---------------------------------------------------------------------------
// RecordBackend
// ---------------------------------------------------------------------------

/// Durable home of protected records.
///
/// Implementations must make `save` atomic per record: after a failed save
/// the previously stored value (if any) is still what `load` returns.
pub trait RecordBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Insert or replace the record under `record.id`.
    fn save(&self, record: &ProtectedRecord) -> BackendResult<()>;

    /// Fetch a record, `None` if the id was never saved.
    fn load(&self, id: &str) -> BackendResult<Option<ProtectedRecord>>;

    /// All stored ids, sorted.
    fn ids(&self) -> BackendResult<Vec<String>>;
}

/// Open the backend described by `config`.
pub fn open_backend(config: &BackendConfig) -> BackendResult<Arc<dyn RecordBackend>> {
    match config.kind {
        BackendKind::Memory => Ok(Arc::new(MemoryBackend::new())),
        BackendKind::Sled => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| BackendError::Config("sled backend requires a path".into()))?;
            Ok(Arc::new(SledBackend::open(path)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn opens_configured_backend() {
        let memory = open_backend(&BackendConfig::default()).unwrap();
        assert_eq!(memory.name(), "memory");

        let dir = tempfile::tempdir().unwrap();
        let sled = open_backend(&BackendConfig {
            kind: BackendKind::Sled,
            path: Some(dir.path().join("db")),
        })
        .unwrap();
        assert_eq!(sled.name(), "sled");
        assert!(sled.ids().unwrap().is_empty());
    }

    #[test]
    fn sled_without_path_is_a_config_error() {
        let result = open_backend(&BackendConfig {
            kind: BackendKind::Sled,
            path: None::<PathBuf>,
        });
        assert!(matches!(result, Err(BackendError::Config(_))));
    }
}
