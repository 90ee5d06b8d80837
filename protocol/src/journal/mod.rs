//! # Audit & Change Journals
//!
//! Two append-only trails sit beside the record store:
//!
//! - the **audit journal** records every operation attempted against the
//!   store (who, what, which record, whether it succeeded);
//! - the **change journal** records every successful write with the payload
//!   before and after.
//!
//! Both are narrow sink traits. A failing sink never fails the operation
//! that produced the entry; the store logs the failure and carries on.
//!
//! ```text
//! file.rs    JSON-lines files, one entry per line, opened in append mode
//! memory.rs  in-process buffers and a sink that discards everything
//! ```

pub mod file;
pub mod memory;

pub use file::FileJournal;
pub use memory::{MemoryJournal, NullJournal};

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JournalConfig;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by journal sinks.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal encoding error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type JournalResult<T> = Result<T, JournalError>;

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Operations that appear in the journals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Store,
    Retrieve,
    Corrupt,
    Tamper,
    Repair,
    SetState,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Store => "STORE",
            Action::Retrieve => "RETRIEVE",
            Action::Corrupt => "CORRUPT",
            Action::Tamper => "TAMPER",
            Action::Repair => "REPAIR",
            Action::SetState => "SET_STATE",
        };
        f.write_str(name)
    }
}

/// One attempted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry id.
    pub entry_id: Uuid,
    /// Wall-clock time the entry was created.
    pub at: DateTime<Utc>,
    /// Acting user as given by the caller.
    pub user: String,
    pub action: Action,
    /// Record the operation targeted; the system user for state changes.
    pub record_id: String,
    /// Free-form outcome detail.
    pub details: String,
    pub success: bool,
}

impl AuditEntry {
    pub fn new(
        user: &str,
        action: Action,
        record_id: &str,
        details: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            at: Utc::now(),
            user: user.to_string(),
            action,
            record_id: record_id.to_string(),
            details: details.into(),
            success,
        }
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] [{}] [{}] {} - {}",
            self.at.to_rfc3339(),
            self.user,
            self.action,
            if self.success { "SUCCESS" } else { "FAILED" },
            self.record_id,
            self.details
        )
    }
}

/// One committed write, with the payload before and after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub entry_id: Uuid,
    pub at: DateTime<Utc>,
    pub user: String,
    pub record_id: String,
    pub action: Action,
    /// Payload before the write; `None` for a new record or when the old
    /// payload could no longer be reconstructed.
    pub old: Option<String>,
    /// Payload after the write.
    pub new: Option<String>,
}

impl ChangeEntry {
    pub fn new(
        user: &str,
        record_id: &str,
        action: Action,
        old: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            at: Utc::now(),
            user: user.to_string(),
            record_id: record_id.to_string(),
            action,
            old: old.map(render_payload),
            new: new.map(render_payload),
        }
    }
}

impl fmt::Display for ChangeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] [{}] [{}] {} -> {}",
            self.at.to_rfc3339(),
            self.user,
            self.record_id,
            self.action,
            self.old.as_deref().unwrap_or("NULL"),
            self.new.as_deref().unwrap_or("NULL")
        )
    }
}

/// Text form of a payload for the change journal: UTF-8 as-is, anything
/// else hex-encoded with a `hex:` prefix.
pub fn render_payload(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("hex:{}", hex::encode(payload)),
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Append-only destination for audit entries.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry) -> JournalResult<()>;
}

/// Append-only destination for change entries.
pub trait ChangeSink: Send + Sync {
    fn record(&self, entry: &ChangeEntry) -> JournalResult<()>;
}

/// Open the sinks described by `config`. A missing path yields a
/// [`NullJournal`] for that trail.
pub fn open_journals(
    config: &JournalConfig,
) -> JournalResult<(Arc<dyn AuditSink>, Arc<dyn ChangeSink>)> {
    let audit: Arc<dyn AuditSink> = match &config.audit_path {
        Some(path) => Arc::new(FileJournal::open(path)?),
        None => Arc::new(NullJournal),
    };
    let changes: Arc<dyn ChangeSink> = match &config.changes_path {
        Some(path) => Arc::new(FileJournal::open(path)?),
        None => Arc::new(NullJournal),
    };
    Ok((audit, changes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_line_format() {
        let entry = AuditEntry::new("doctor", Action::Store, "p1", "created 6 shards", true);
        let line = entry.to_string();
        assert!(line.ends_with("[doctor] [STORE] [SUCCESS] p1 - created 6 shards"));
        let failed = AuditEntry::new("attacker", Action::Corrupt, "p1", "2 shards", false);
        assert!(failed.to_string().contains("[CORRUPT] [FAILED]"));
    }

    #[test]
    fn change_line_uses_null_for_absent_payloads() {
        let entry = ChangeEntry::new("doctor", "p1", Action::Store, None, Some(b"flu".as_slice()));
        assert!(entry.to_string().ends_with("[doctor] [p1] [STORE] NULL -> flu"));
    }

    #[test]
    fn binary_payloads_are_hex_encoded() {
        assert_eq!(render_payload(b"plain"), "plain");
        assert_eq!(render_payload(&[0xFF, 0x00]), "hex:ff00");
    }

    #[test]
    fn action_serializes_in_upper_case() {
        let json = serde_json::to_string(&Action::SetState).unwrap();
        assert_eq!(json, "\"SET_STATE\"");
        assert_eq!(Action::SetState.to_string(), "SET_STATE");
    }

    #[test]
    fn entry_ids_are_unique() {
        let a = AuditEntry::new("u", Action::Retrieve, "x", "", true);
        let b = AuditEntry::new("u", Action::Retrieve, "x", "", true);
        assert_ne!(a.entry_id, b.entry_id);
    }

    #[test]
    fn unconfigured_journals_discard() {
        let (audit, changes) = open_journals(&JournalConfig::default()).unwrap();
        audit
            .record(&AuditEntry::new("u", Action::Store, "x", "", true))
            .unwrap();
        changes
            .record(&ChangeEntry::new("u", "x", Action::Store, None, None))
            .unwrap();
    }
}
