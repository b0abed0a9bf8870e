//! Domain-specific errors for package operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::app::AppError;
use crate::core::journal::JournalError;
use crate::io::archive::ArchiveError;
use crate::supplier::SupplierError;
use crate::types::PackageName;

#[derive(Error, Debug)]
pub enum OpError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error("supplier error: {0}")]
    Supplier(#[from] SupplierError),

    #[error("invalid archive for '{name}': {source}")]
    ArchiveInvalid {
        name: PackageName,
        source: ArchiveError,
    },

    #[error("'{0}' is already installed")]
    AlreadyInstalled(PackageName),

    #[error("temp path {0} is already occupied")]
    TempOccupied(PathBuf),

    #[error("'{0}' has no journal; remove its module directory manually")]
    NoJournal(PackageName),

    #[error("{0} still contains foreign files; remove them manually")]
    AlienContents(PathBuf),

    #[error("install of '{name}' was interrupted: {reason}")]
    InstallInterrupted { name: PackageName, reason: String },

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
