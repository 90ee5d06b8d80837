//! JSON-lines journal files.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{AuditEntry, AuditSink, ChangeEntry, ChangeSink, JournalResult};

/// An append-only file with one JSON document per line.
///
/// The file is opened in append mode and never truncated or rewritten.
/// Each entry is written with a single `write_all` under the handle's lock,
/// so concurrent writers never interleave within a line.
#[derive(Debug)]
pub struct FileJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileJournal {
    /// Open `path` for appending, creating it and its parent directory if
    /// needed.
    pub fn open<P: AsRef<Path>>(path: P) -> JournalResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append<T: Serialize>(&self, entry: &T) -> JournalResult<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}

impl AuditSink for FileJournal {
    fn record(&self, entry: &AuditEntry) -> JournalResult<()> {
        self.append(entry)
    }
}

impl ChangeSink for FileJournal {
    fn record(&self, entry: &ChangeEntry) -> JournalResult<()> {
        self.append(entry)
    }
}

/// Read every entry back from a journal file. A missing file is an empty
/// journal; blank lines are skipped.
pub fn read_entries<T: DeserializeOwned>(path: &Path) -> JournalResult<Vec<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::Action;

    #[test]
    fn entries_are_appended_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("audit.jsonl");
        let journal = FileJournal::open(&path).unwrap();
        let first = AuditEntry::new("doctor", Action::Store, "p1", "ok", true);
        let second = AuditEntry::new("admin", Action::Retrieve, "p1", "ok", true);
        AuditSink::record(&journal, &first).unwrap();
        AuditSink::record(&journal, &second).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        let back: Vec<AuditEntry> = read_entries(&path).unwrap();
        assert_eq!(back, vec![first, second]);
    }

    #[test]
    fn reopening_never_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.jsonl");
        {
            let journal = FileJournal::open(&path).unwrap();
            ChangeSink::record(
                &journal,
                &ChangeEntry::new("doctor", "p1", Action::Store, None, Some(b"v1".as_slice())),
            )
            .unwrap();
        }
        let journal = FileJournal::open(&path).unwrap();
        ChangeSink::record(
            &journal,
            &ChangeEntry::new("doctor", "p1", Action::Store, Some(b"v1".as_slice()), Some(b"v2".as_slice())),
        )
        .unwrap();

        let back: Vec<ChangeEntry> = read_entries(journal.path()).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1].old.as_deref(), Some("v1"));
        assert_eq!(back[1].new.as_deref(), Some("v2"));
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let back: Vec<AuditEntry> = read_entries(&dir.path().join("nope.jsonl")).unwrap();
        assert!(back.is_empty());
    }
}
