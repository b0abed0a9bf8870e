//! The application view.
//!
//! An `App` is a snapshot of one application directory: the root manifest
//! and the manifests of everything installed under `modules/`. It is
//! deliberately forgetful; `reinit` drops the snapshot and re-scans disk,
//! so the view never drifts from the filesystem between operations.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::journal;
use crate::core::manifest::{self, Manifest};
use crate::types::PackageName;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("missing or invalid application manifest at {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("two installed modules share the name '{0}'")]
    DuplicateInstalled(PackageName),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
pub struct App {
    root: PathBuf,
    /// The application's own manifest, when `<root>/package.json` exists.
    pub main: Option<Manifest>,
    /// Installed modules, keyed by manifest name. Exactly one per name.
    pub installed: BTreeMap<PackageName, Manifest>,
}

impl App {
    /// Open an application directory and scan it.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let mut app = Self {
            root: root.into(),
            main: None,
            installed: BTreeMap::new(),
        };
        app.reinit()?;
        Ok(app)
    }

    /// An in-memory view bound to no directory.
    #[cfg(test)]
    pub fn detached() -> Self {
        Self {
            root: PathBuf::new(),
            main: None,
            installed: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Drop all in-memory state and re-scan the application directory.
    ///
    /// A missing root manifest leaves `main` unset; a present but
    /// unparseable one is a configuration error. Module manifests that
    /// fail to load are logged and skipped.
    pub fn reinit(&mut self) -> Result<(), AppError> {
        self.main = None;
        self.installed.clear();

        let manifest_path = self.root.join(manifest::FILE_NAME);
        if manifest_path.exists() {
            match Manifest::load(&self.root) {
                Ok(m) => self.main = Some(m),
                Err(err) => {
                    return Err(AppError::Config {
                        path: manifest_path,
                        reason: err.to_string(),
                    });
                }
            }
        }

        let modules = crate::modules_dir(&self.root);
        if modules.is_dir() {
            for entry in fs::read_dir(&modules)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let dir = entry.path();
                let m = match Manifest::load(&dir) {
                    Ok(m) => m,
                    Err(err) => {
                        tracing::warn!("skipping module at {}: {err}", dir.display());
                        continue;
                    }
                };
                if !dir.join(journal::FILE_NAME).exists() {
                    tracing::warn!(
                        "module '{}' has no journal; a previous install may have been interrupted",
                        m.name
                    );
                }
                if self.installed.contains_key(&m.name) {
                    return Err(AppError::DuplicateInstalled(m.name));
                }
                self.installed.insert(m.name.clone(), m);
            }
        }

        Ok(())
    }

    /// Include paths for compiled sources: each installed module's
    /// `source/` directory when present, the application's own last.
    pub fn source_paths(&self) -> Vec<PathBuf> {
        self.include_paths(crate::SOURCE_DIR)
    }

    /// Include paths for view templates, same shape as [`App::source_paths`].
    pub fn view_paths(&self) -> Vec<PathBuf> {
        self.include_paths(crate::VIEWS_DIR)
    }

    fn include_paths(&self, leaf: &str) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for (name, m) in &self.installed {
            let dir = m
                .root
                .clone()
                .unwrap_or_else(|| crate::module_dir(&self.root, name));
            let candidate = dir.join(leaf);
            if candidate.is_dir() {
                paths.push(candidate);
            }
        }
        let own = self.root.join(leaf);
        if own.is_dir() {
            paths.push(own);
        }
        paths
    }

    /// Write `<root>/deps.txt`: one line of `-I` source include flags, one
    /// line of `-J` view include flags, each `;`-joined.
    pub fn write_deps_file(&self) -> std::io::Result<PathBuf> {
        fn flag_line(flag: &str, paths: &[PathBuf]) -> String {
            paths
                .iter()
                .map(|p| format!("-{flag}{}", p.display()))
                .collect::<Vec<_>>()
                .join(";")
        }

        let content = format!(
            "{}\n{}\n",
            flag_line("I", &self.source_paths()),
            flag_line("J", &self.view_paths()),
        );
        let path = self.root.join(crate::DEPS_FILE);
        fs::write(&path, content)?;
        Ok(path)
    }
}
