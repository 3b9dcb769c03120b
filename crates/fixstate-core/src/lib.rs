//! Core orchestration for fixstate fixture environments.
//!
//! This crate ties the run-params schema, the state archive store and the
//! database backends together: the `Installer` bootstraps a fixture
//! environment out of an application source tree (with rollback on
//! failure), and the `Initializer` snapshots and restores an installed
//! environment's database, `var` and `media` state.

pub mod entrypoint;
pub mod initializer;
pub mod installer;
pub mod layout;
pub mod lifecycle;

pub use entrypoint::rewrite_entrypoint;
pub use initializer::Initializer;
pub use installer::{ApplicationInstaller, InstallRequest, Installer};
pub use layout::AppLayout;
pub use lifecycle::{validate_transition, InstallStage};

use fixstate_schema::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Schema(#[from] fixstate_schema::SchemaError),
    #[error("{0}")]
    Store(#[from] fixstate_store::StoreError),
    #[error("{0}")]
    Db(#[from] fixstate_db::DbError),
    #[error("'{}' {reason}", path.display())]
    InvalidInput { path: PathBuf, reason: String },
    #[error("application is already installed at '{}'", .0.display())]
    AlreadyInstalled(PathBuf),
    #[error("invalid install stage transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("application install failed: {0}")]
    InstallFailed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CoreError::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Schema(e) => e.kind(),
            CoreError::Store(e) => e.kind(),
            CoreError::Db(e) => e.kind(),
            CoreError::InvalidInput { .. } => ErrorKind::InvalidInput,
            CoreError::AlreadyInstalled(_) => ErrorKind::AlreadyInstalled,
            CoreError::InvalidTransition { .. } | CoreError::InstallFailed(_) => {
                ErrorKind::RuntimeError
            }
            CoreError::Io(_) => ErrorKind::Io,
        }
    }
}
