//! Persistent records and config files for fixstate environments.
//!
//! This crate defines the run-params record (`RunParams`) written into every
//! bootstrapped environment, the project profile config (`ProjectConfig`),
//! the per-environment database connection config (`LocalConfig`), and the
//! `ErrorKind` taxonomy the other crates classify their errors with.

pub mod config;
pub mod params;
pub mod types;

pub use config::{
    ConnectionConfig, LocalConfig, Profile, ProjectConfig, DEFAULT_CONFIG_FILE,
    DEFAULT_MYSQL_PORT, DEFAULT_PROFILE, LOCAL_CONFIG_FILENAME,
};
pub use params::{RunOptions, RunParams, DEFAULT_SCOPE, PARAMS_FILENAME};
pub use types::ErrorKind;

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fsync a directory so that a preceding `persist()` rename is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("environment is not initialized: '{}' does not exist", .0.display())]
    NotInstalled(PathBuf),
    #[error("inconsistent params file '{}': {reason}", path.display())]
    Inconsistent { path: PathBuf, reason: String },
    #[error("failed to parse '{}': {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
    #[error("cannot open config file '{}'", .0.display())]
    ConfigNotFound(PathBuf),
    #[error("profile '{profile}' is undefined in '{}'", path.display())]
    ProfileNotFound { profile: String, path: PathBuf },
    #[error("target is not defined in profile '{0}'")]
    TargetNotDefined(String),
    #[error("environment is inconsistent; unable to read connection config in '{}'", .0.display())]
    LocalConfigMissing(PathBuf),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),
}

impl SchemaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchemaError::Io(_) | SchemaError::Read { .. } => ErrorKind::Io,
            SchemaError::NotInstalled(_)
            | SchemaError::Inconsistent { .. }
            | SchemaError::Parse { .. }
            | SchemaError::ConfigNotFound(_)
            | SchemaError::ProfileNotFound { .. }
            | SchemaError::TargetNotDefined(_) => ErrorKind::InvalidInput,
            SchemaError::LocalConfigMissing(_)
            | SchemaError::Serialization(_)
            | SchemaError::TomlSerialization(_) => ErrorKind::RuntimeError,
        }
    }
}
