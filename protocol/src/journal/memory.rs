//! In-process journal sinks.

use parking_lot::Mutex;

use super::{AuditEntry, AuditSink, ChangeEntry, ChangeSink, JournalResult};

/// Keeps every entry in memory. Used by tests and the interactive session.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    audit: Mutex<Vec<AuditEntry>>,
    changes: Mutex<Vec<ChangeEntry>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the audit trail, oldest first.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().clone()
    }

    /// Snapshot of the change trail, oldest first.
    pub fn change_entries(&self) -> Vec<ChangeEntry> {
        self.changes.lock().clone()
    }
}

impl AuditSink for MemoryJournal {
    fn record(&self, entry: &AuditEntry) -> JournalResult<()> {
        self.audit.lock().push(entry.clone());
        Ok(())
    }
}

impl ChangeSink for MemoryJournal {
    fn record(&self, entry: &ChangeEntry) -> JournalResult<()> {
        self.changes.lock().push(entry.clone());
        Ok(())
    }
}

/// Discards every entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullJournal;

impl AuditSink for NullJournal {
    fn record(&self, _entry: &AuditEntry) -> JournalResult<()> {
        Ok(())
    }
}

impl ChangeSink for NullJournal {
    fn record(&self, _entry: &ChangeEntry) -> JournalResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::Action;

    #[test]
    fn memory_journal_keeps_order() {
        let journal = MemoryJournal::new();
        for action in [Action::Store, Action::Retrieve, Action::Repair] {
            AuditSink::record(&journal, &AuditEntry::new("u", action, "p", "", true)).unwrap();
        }
        let actions: Vec<Action> = journal.audit_entries().iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![Action::Store, Action::Retrieve, Action::Repair]);
        assert!(journal.change_entries().is_empty());
    }
}
