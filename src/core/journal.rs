//! Install journals.
//!
//! The journal is the authoritative record of what an install created: an
//! ordered ledger of files and directories, relative to the package root,
//! persisted as `journal.json` inside the package itself. Uninstallation
//! replays it instead of trusting the filesystem, so user files dropped into
//! a module directory survive.
//!
//! A well-formed journal is sealed: its last entry is the `RegularFile`
//! entry for `journal.json` itself, so the replay removes the ledger too.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Journal file name inside an installed package directory.
pub const FILE_NAME: &str = "journal.json";

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    RegularFile,
    Directory,
}

/// One filesystem effect of an install. `path` is forward-slash, relative to
/// the package root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a regular file. Entries are appended in effect order.
    pub fn push_file(&mut self, path: &str) {
        self.entries.push(JournalEntry {
            kind: EntryKind::RegularFile,
            path: path.to_string(),
        });
    }

    /// Record a directory, once: recording the same directory twice within
    /// one install is a no-op.
    pub fn push_dir(&mut self, path: &str) {
        let seen = self
            .entries
            .iter()
            .any(|e| e.kind == EntryKind::Directory && e.path == path);
        if !seen {
            self.entries.push(JournalEntry {
                kind: EntryKind::Directory,
                path: path.to_string(),
            });
        }
    }

    /// Whether the journal ends with its own file entry.
    pub fn is_sealed(&self) -> bool {
        self.entries
            .last()
            .is_some_and(|e| e.kind == EntryKind::RegularFile && e.path == FILE_NAME)
    }

    /// Append the journal's own file entry. Must be the final append before
    /// [`Journal::save`].
    pub fn seal(&mut self) {
        if !self.is_sealed() {
            self.push_file(FILE_NAME);
        }
    }

    /// Persist to `<dir>/journal.json`, flushed to stable storage before
    /// returning.
    pub fn save(&self, dir: &Path) -> Result<(), JournalError> {
        let content = serde_json::to_vec_pretty(self)?;
        let mut file = File::create(dir.join(FILE_NAME))?;
        file.write_all(&content)?;
        file.sync_all()?;
        Ok(())
    }

    /// Load from `<dir>/journal.json`.
    pub fn load(dir: &Path) -> Result<Self, JournalError> {
        let bytes = std::fs::read(dir.join(FILE_NAME))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_roundtrip() {
        let dir = tempdir().unwrap();

        let mut journal = Journal::new();
        journal.push_dir("source");
        journal.push_file("source/lib.c");
        journal.push_file("package.json");
        journal.seal();
        journal.save(dir.path()).unwrap();

        let loaded = Journal::load(dir.path()).unwrap();
        assert_eq!(loaded, journal);
    }

    #[test]
    fn test_seal_appends_own_entry_last() {
        let mut journal = Journal::new();
        journal.push_file("package.json");
        assert!(!journal.is_sealed());

        journal.seal();
        assert!(journal.is_sealed());
        assert_eq!(journal.entries().last().unwrap().path, FILE_NAME);

        // Sealing twice does not duplicate the entry.
        journal.seal();
        let count = journal
            .entries()
            .iter()
            .filter(|e| e.path == FILE_NAME)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_push_dir_is_idempotent() {
        let mut journal = Journal::new();
        journal.push_dir("source");
        journal.push_dir("source");
        journal.push_dir("source/sub");
        assert_eq!(journal.entries().len(), 2);
    }

    #[test]
    fn test_entry_wire_format() {
        let mut journal = Journal::new();
        journal.push_dir("views");
        journal.push_file("views/index.tpl");

        let json = serde_json::to_string(&journal).unwrap();
        assert!(json.contains(r#""type":"Directory""#));
        assert!(json.contains(r#""type":"RegularFile""#));
        assert!(json.contains(r#""path":"views/index.tpl""#));
    }

    #[test]
    fn test_load_missing_is_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(Journal::load(dir.path()), Err(JournalError::Io(_))));
    }
}
