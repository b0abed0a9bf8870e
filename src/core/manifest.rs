//! Package manifests.
//!
//! Every package, the application included, carries a `package.json` at its
//! root naming the package, its version, and its dependency constraints.
//! Unknown keys are ignored so manifests can carry framework-specific
//! metadata this tool does not interpret.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::version::{Constraint, Version};
use crate::types::PackageName;

/// Manifest file name, at the root of the application and of every package.
pub const FILE_NAME: &str = "package.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The in-memory form of a `package.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: PackageName,
    pub version: Version,

    /// Declared dependencies: package name to version constraint.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<PackageName, Constraint>,

    /// Directory this manifest was loaded from, when it came from disk.
    #[serde(skip)]
    pub root: Option<PathBuf>,
}

impl Manifest {
    pub fn new(name: PackageName, version: Version) -> Self {
        Self {
            name,
            version,
            dependencies: BTreeMap::new(),
            root: None,
        }
    }

    pub fn with_dependency(mut self, name: PackageName, constraint: Constraint) -> Self {
        self.dependencies.insert(name, constraint);
        self
    }

    /// Parse a manifest from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ManifestError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Load `<dir>/package.json`, remembering `dir` as the source root.
    pub fn load(dir: &Path) -> Result<Self, ManifestError> {
        let bytes = fs::read(dir.join(FILE_NAME))?;
        let mut manifest = Self::from_slice(&bytes)?;
        manifest.root = Some(dir.to_path_buf());
        Ok(manifest)
    }

    /// Write `<dir>/package.json`.
    pub fn save(&self, dir: &Path) -> Result<(), ManifestError> {
        let content = serde_json::to_vec_pretty(self)?;
        fs::write(dir.join(FILE_NAME), content)?;
        Ok(())
    }
}
