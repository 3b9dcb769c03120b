//! State archive engine and filesystem helpers for fixstate.
//!
//! `StateArchive` is a zip container with three partitions (`dump`, `var`,
//! `media`) stamped with an identity tag and saved atomically. The `fso`
//! module holds the copy/move/delete primitives the bootstrapper and the
//! state orchestrator build on.

pub mod archive;
pub mod fso;

pub use archive::{EntryKind, Partition, StateArchive, IDENTITY_TAG};

use fixstate_schema::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fsync a directory so that a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid path '{}': {reason}", path.display())]
    InvalidInput { path: PathBuf, reason: String },
    #[error("'{}' is not a valid state archive: {reason}", path.display())]
    InvalidFormat { path: PathBuf, reason: String },
    #[error("failed to save state archive: {0}")]
    SaveFailed(String),
    #[error("unknown partition type '{0}'")]
    UnknownPartition(String),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl StoreError {
    pub(crate) fn invalid_input(path: &Path, reason: impl Into<String>) -> Self {
        StoreError::InvalidInput {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_format(path: &Path, reason: impl Into<String>) -> Self {
        StoreError::InvalidFormat {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Io(_) => ErrorKind::Io,
            StoreError::InvalidInput { .. } => ErrorKind::InvalidInput,
            StoreError::InvalidFormat { .. } | StoreError::Zip(_) => ErrorKind::InvalidFormat,
            StoreError::SaveFailed(_) | StoreError::UnknownPartition(_) => ErrorKind::RuntimeError,
        }
    }
}
