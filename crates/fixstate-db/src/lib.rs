//! Database dump backends for fixstate.
//!
//! A `DumpBackend` writes the environment's database into a dump file and
//! replays a dump file into it. `BackendRegistry` maps the connection type
//! of an environment's local config to a backend constructor; the defaults
//! are the process-based `MysqlBackend` (`pdo_mysql`) and the in-process
//! `MockBackend` (`mock`).

pub mod backend;
pub mod mock;
pub mod mysql;
pub mod prereq;

pub use backend::{BackendRegistry, DumpBackend};
pub use mock::MockBackend;
pub use mysql::MysqlBackend;
pub use prereq::{check_tools, format_missing, prereqs_for, MissingPrereq};

use fixstate_schema::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Longest excerpt of a tool's diagnostic output kept in an error.
pub const MAX_TOOL_OUTPUT: usize = 150;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database connection type '{0}' is not supported")]
    UnsupportedBackend(String),
    #[error("'{tool}' is not available: {reason}")]
    ToolUnavailable { tool: String, reason: String },
    #[error("invalid dump path '{}': {reason}", path.display())]
    InvalidInput { path: PathBuf, reason: String },
    #[error("'{tool}' failed: {output}")]
    ToolFailed { tool: String, output: String },
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Io(_) => ErrorKind::Io,
            DbError::UnsupportedBackend(_) => ErrorKind::UnsupportedBackend,
            DbError::ToolUnavailable { .. } => ErrorKind::ToolUnavailable,
            DbError::InvalidInput { .. } => ErrorKind::InvalidInput,
            DbError::ToolFailed { .. } => ErrorKind::RuntimeError,
        }
    }
}

/// Lossy, trimmed excerpt of process output capped at [`MAX_TOOL_OUTPUT`] chars.
pub(crate) fn excerpt(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim()
        .chars()
        .take(MAX_TOOL_OUTPUT)
        .collect()
}
