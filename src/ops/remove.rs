//! Package uninstallation.
//!
//! Uninstall replays the install journal, not the directory tree: files
//! the journal names are deleted outright, directories are removed only
//! when empty. Anything the journal does not know about was put there by
//! someone else and is left alone, failing the uninstall at the top level
//! so the user decides.

use std::fs;
use std::path::Path;

use crate::core::journal::{self, EntryKind, Journal};
use crate::ops::OpError;
use crate::types::PackageName;

/// Erase `<root>/modules/<name>` according to its journal.
pub fn uninstall(root: &Path, name: &PackageName) -> Result<(), OpError> {
    let dir = crate::module_dir(root, name);
    if !dir.join(journal::FILE_NAME).is_file() {
        return Err(OpError::NoJournal(name.clone()));
    }
    let journal = Journal::load(&dir)?;

    for entry in journal.entries() {
        if entry.kind != EntryKind::RegularFile {
            continue;
        }
        let path = dir.join(&entry.path);
        if path.is_file() {
            fs::remove_file(&path)?;
        } else {
            tracing::warn!("journaled file {} is already gone", path.display());
        }
    }

    // Deepest first, so children go before their parents.
    let mut dirs: Vec<&str> = journal
        .entries()
        .iter()
        .filter(|e| e.kind == EntryKind::Directory)
        .map(|e| e.path.as_str())
        .collect();
    dirs.sort_by_key(|p| std::cmp::Reverse(p.len()));

    for rel in dirs {
        let path = dir.join(rel);
        if !path.is_dir() {
            tracing::debug!("journaled directory {} is already gone", path.display());
            continue;
        }
        if dir_is_empty(&path)? {
            fs::remove_dir(&path)?;
        } else {
            tracing::warn!(
                "leaving {}: it contains files this install did not create",
                path.display()
            );
        }
    }

    if dir_is_empty(&dir)? {
        fs::remove_dir(&dir)?;
        Ok(())
    } else {
        Err(OpError::AlienContents(dir))
    }
}

fn dir_is_empty(path: &Path) -> Result<bool, std::io::Error> {
    Ok(fs::read_dir(path)?.next().is_none())
}
