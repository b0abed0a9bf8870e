//! Local-filesystem supplier.
//!
//! Serves packages from a directory tree laid out as
//! `<root>/<name>/<version>/package.json` plus
//! `<root>/<name>/<version>/package.archive`. Useful for vendored package
//! sets and offline work; best-version selection happens here since there
//! is no registry to do it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::manifest::Manifest;
use crate::core::version::{Constraint, Version};
use crate::supplier::{Supplier, SupplierError};
use crate::types::PackageName;

/// Archive file name inside each version directory.
pub const ARCHIVE_FILE: &str = "package.archive";

pub struct DirSupplier {
    root: PathBuf,
}

impl DirSupplier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Pick the highest version directory satisfying `constraint`.
    /// `head` sorts above every release, so a trunk snapshot wins whenever
    /// the constraint admits it.
    fn best_version(
        &self,
        name: &PackageName,
        constraint: &Constraint,
    ) -> Result<PathBuf, SupplierError> {
        let not_found = || SupplierError::NotFound {
            name: name.clone(),
            constraint: constraint.clone(),
        };

        let package_dir = self.root.join(name.as_str());
        if !package_dir.is_dir() {
            return Err(not_found());
        }

        let mut best: Option<(Version, PathBuf)> = None;
        for entry in fs::read_dir(&package_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Ok(version) = entry.file_name().to_string_lossy().parse::<Version>() else {
                tracing::debug!(
                    "ignoring non-version directory {}",
                    entry.path().display()
                );
                continue;
            };
            if !constraint.matches(&version) {
                continue;
            }
            match &best {
                Some((current, _)) if *current >= version => {}
                _ => best = Some((version, entry.path())),
            }
        }

        best.map(|(_, path)| path).ok_or_else(not_found)
    }
}

impl Supplier for DirSupplier {
    fn manifest(
        &self,
        name: &PackageName,
        constraint: &Constraint,
    ) -> Result<Manifest, SupplierError> {
        let dir = self.best_version(name, constraint)?;
        Ok(Manifest::load(&dir)?)
    }

    fn store(
        &self,
        dest: &Path,
        name: &PackageName,
        constraint: &Constraint,
    ) -> Result<(), SupplierError> {
        let dir = self.best_version(name, constraint)?;
        let archive = dir.join(ARCHIVE_FILE);
        if !archive.is_file() {
            return Err(SupplierError::NotFound {
                name: name.clone(),
                constraint: constraint.clone(),
            });
        }
        let part = dest.with_extension("part");
        fs::copy(&archive, &part)?;
        fs::rename(&part, dest)?;
        Ok(())
    }
}
