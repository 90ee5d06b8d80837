//! In-memory record backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use super::{BackendError, BackendResult, RecordBackend};
use crate::store::ProtectedRecord;

/// Records held in a map for the lifetime of the process.
///
/// The backend can be switched offline to exercise the store's handling of
/// persistence failures; while offline every `save` fails and leaves the
/// stored value untouched. Reads keep working.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<BTreeMap<String, ProtectedRecord>>,
    offline: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse (`true`) or accept (`false`) subsequent writes.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl RecordBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn save(&self, record: &ProtectedRecord) -> BackendResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("memory backend is offline".into()));
        }
        self.records.write().insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> BackendResult<Option<ProtectedRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    fn ids(&self) -> BackendResult<Vec<String>> {
        Ok(self.records.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::record::tests::sample_record;

    #[test]
    fn save_load_and_list() {
        let backend = MemoryBackend::new();
        assert!(backend.is_empty());
        backend.save(&sample_record("b")).unwrap();
        backend.save(&sample_record("a")).unwrap();
        assert_eq!(backend.len(), 2);
        assert_eq!(backend.ids().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(backend.load("a").unwrap().unwrap().id, "a");
        assert!(backend.load("missing").unwrap().is_none());
    }

    #[test]
    fn offline_backend_keeps_previous_value() {
        let backend = MemoryBackend::new();
        let first = sample_record("p1");
        backend.save(&first).unwrap();

        backend.set_offline(true);
        let mut second = sample_record("p1");
        second.generation = 2;
        assert!(matches!(backend.save(&second), Err(BackendError::Unavailable(_))));
        assert_eq!(backend.load("p1").unwrap().unwrap().generation, first.generation);

        backend.set_offline(false);
        backend.save(&second).unwrap();
        assert_eq!(backend.load("p1").unwrap().unwrap().generation, 2);
    }
}
