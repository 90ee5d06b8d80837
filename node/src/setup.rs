//! Store construction for the node binary.
//!
//! Resolves the effective [`StoreConfig`] from the config file, the data
//! directory and `--ephemeral`, then opens the store together with a view
//! over its journals so commands can print them back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rase_protocol::config::{BackendConfig, BackendKind, JournalConfig, StoreConfig};
use rase_protocol::journal::file::read_entries;
use rase_protocol::journal::{AuditEntry, ChangeEntry, MemoryJournal};
use rase_protocol::persistence::open_backend;
use rase_protocol::RecordStore;

/// Sled tree directory inside the data directory.
const RECORDS_DIR: &str = "records";
const AUDIT_FILE: &str = "audit.jsonl";
const CHANGES_FILE: &str = "changes.jsonl";

/// Build the effective configuration.
///
/// Starts from `config_path` (or the defaults). Unless `ephemeral` is set,
/// a memory backend is promoted to sled under `data_dir` and missing
/// journal paths are placed there too. `ephemeral` forces memory for both.
pub fn resolve_config(
    config_path: Option<&Path>,
    data_dir: &Path,
    ephemeral: bool,
) -> Result<StoreConfig> {
    let mut config = match config_path {
        Some(path) => StoreConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => StoreConfig::default(),
    };

    if ephemeral {
        config.backend = BackendConfig::default();
        config.journal = JournalConfig::default();
        return Ok(config);
    }

    if config.backend.kind == BackendKind::Memory {
        config.backend = BackendConfig {
            kind: BackendKind::Sled,
            path: Some(data_dir.join(RECORDS_DIR)),
        };
    } else if config.backend.path.is_none() {
        config.backend.path = Some(data_dir.join(RECORDS_DIR));
    }
    if config.journal.audit_path.is_none() {
        config.journal.audit_path = Some(data_dir.join(AUDIT_FILE));
    }
    if config.journal.changes_path.is_none() {
        config.journal.changes_path = Some(data_dir.join(CHANGES_FILE));
    }

    config.validate().context("invalid store configuration")?;
    Ok(config)
}

/// Where the store's journals can be read back from.
pub enum JournalView {
    /// In-process journal of an ephemeral store.
    Memory(Arc<MemoryJournal>),
    /// JSON-lines files; `None` means the trail is not kept.
    Files {
        audit: Option<PathBuf>,
        changes: Option<PathBuf>,
    },
}

impl JournalView {
    /// Audit trail as display lines, oldest first.
    pub fn audit_lines(&self) -> Result<Vec<String>> {
        match self {
            JournalView::Memory(journal) => Ok(lines(&journal.audit_entries())),
            JournalView::Files { audit: Some(path), .. } => {
                let entries: Vec<AuditEntry> = read_entries(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Ok(lines(&entries))
            }
            JournalView::Files { audit: None, .. } => Ok(Vec::new()),
        }
    }

    /// Change trail as display lines, oldest first.
    pub fn change_lines(&self) -> Result<Vec<String>> {
        match self {
            JournalView::Memory(journal) => Ok(lines(&journal.change_entries())),
            JournalView::Files {
                changes: Some(path),
                ..
            } => {
                let entries: Vec<ChangeEntry> = read_entries(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Ok(lines(&entries))
            }
            JournalView::Files { changes: None, .. } => Ok(Vec::new()),
        }
    }
}

fn lines<T: ToString>(entries: &[T]) -> Vec<String> {
    entries.iter().map(ToString::to_string).collect()
}

/// Open the store described by `config`.
///
/// A store with no journal files gets an in-memory journal so the session
/// can still show its trail.
pub fn open_store(config: &StoreConfig) -> Result<(RecordStore, JournalView)> {
    let journal = &config.journal;
    if journal.audit_path.is_none() && journal.changes_path.is_none() {
        let memory = Arc::new(MemoryJournal::new());
        let backend = open_backend(&config.backend).context("failed to open record backend")?;
        let store = RecordStore::with_collaborators(config, backend, memory.clone(), memory.clone())
            .context("failed to open record store")?;
        return Ok((store, JournalView::Memory(memory)));
    }

    let store = RecordStore::from_config(config).context("failed to open record store")?;
    let view = JournalView::Files {
        audit: journal.audit_path.clone(),
        changes: journal.changes_path.clone(),
    };
    Ok((store, view))
}
