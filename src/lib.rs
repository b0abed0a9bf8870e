//! kiln - source-package manager for kiln application projects.
//!
//! An application directory declares its dependencies in `package.json`;
//! kiln resolves them against a package supplier, plans the installs and
//! uninstalls needed to make `modules/` agree with the declaration, and
//! executes the plan with journaled, reversible installs.

pub mod core;
pub mod io;
pub mod ops;
pub mod supplier;
pub mod types;

use std::path::{Path, PathBuf};

use types::PackageName;

/// User agent for registry requests.
pub const USER_AGENT: &str = concat!("kiln/", env!("CARGO_PKG_VERSION"));

/// Application source directory name.
pub const SOURCE_DIR: &str = "source";

/// Application view-template directory name.
pub const VIEWS_DIR: &str = "views";

/// Emitted include-path file name.
pub const DEPS_FILE: &str = "deps.txt";

/// Installed modules directory: `<root>/modules`.
pub fn modules_dir(root: &Path) -> PathBuf {
    root.join("modules")
}

/// One installed module's directory: `<root>/modules/<name>`.
pub fn module_dir(root: &Path, name: &PackageName) -> PathBuf {
    modules_dir(root).join(name.as_str())
}

/// Transient download area: `<root>/temp/downloads`.
pub fn temp_downloads_dir(root: &Path) -> PathBuf {
    root.join("temp").join("downloads")
}
