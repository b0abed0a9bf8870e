//! Package suppliers.
//!
//! A supplier answers two questions for a `(name, constraint)` query: what
//! is the best manifest satisfying the constraint, and where are that
//! version's archive bytes. The core only ever sees this blocking
//! interface; transport details stay behind it.

pub mod dir;
pub mod http;

use std::path::Path;

use thiserror::Error;

use crate::core::manifest::{Manifest, ManifestError};
use crate::core::version::Constraint;
use crate::types::PackageName;

pub use dir::DirSupplier;
pub use http::RegistrySupplier;

#[derive(Error, Debug)]
pub enum SupplierError {
    #[error("no package satisfies {name} {constraint}")]
    NotFound {
        name: PackageName,
        constraint: Constraint,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed manifest from supplier: {0}")]
    Manifest(#[from] ManifestError),

    #[error("archive digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },
}

/// A source of package manifests and archives.
pub trait Supplier {
    /// Return the best manifest satisfying `constraint`.
    fn manifest(
        &self,
        name: &PackageName,
        constraint: &Constraint,
    ) -> Result<Manifest, SupplierError>;

    /// Write the archive bytes for the selected version to `dest`
    /// atomically: `dest` either ends up complete or absent.
    fn store(
        &self,
        dest: &Path,
        name: &PackageName,
        constraint: &Constraint,
    ) -> Result<(), SupplierError>;
}
