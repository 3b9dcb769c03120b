use crate::{fsync_dir, SchemaError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Well-known name of the run-params file inside an environment root.
pub const PARAMS_FILENAME: &str = "params.json";
/// Scope written by the bootstrapper and used when none is given.
pub const DEFAULT_SCOPE: &str = "store";

/// Runtime directories of a bootstrapped environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RunOptions {
    pub etc_dir: PathBuf,
    pub var_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub log_dir: PathBuf,
    pub session_dir: PathBuf,
    pub media_dir: PathBuf,
    pub public_dir: PathBuf,
    pub skin_dir: PathBuf,
    pub upload_dir: PathBuf,
}

impl RunOptions {
    /// The directory layout the bootstrapper creates under `root`.
    pub fn for_root(root: &Path) -> Self {
        let var = root.join("var");
        let media = root.join("media");
        Self {
            etc_dir: root.join("etc"),
            tmp_dir: var.join("tmp"),
            cache_dir: var.join("cache"),
            log_dir: var.join("log"),
            session_dir: var.join("session"),
            var_dir: var,
            upload_dir: media.join("upload"),
            media_dir: media,
            public_dir: root.to_path_buf(),
            skin_dir: root.join("skin"),
        }
    }
}

/// The persisted run-params record of an environment.
///
/// `code` and `scope` identify the logical instance (store or website code
/// and its type); `options` locates its runtime directories. The record is
/// always rewritten as a whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RunParams {
    pub code: String,
    #[serde(rename = "type")]
    pub scope: String,
    pub options: RunOptions,
}

impl RunParams {
    /// Fresh record for an environment rooted at `root`.
    pub fn for_root(root: &Path) -> Self {
        Self {
            code: String::new(),
            scope: DEFAULT_SCOPE.to_owned(),
            options: RunOptions::for_root(root),
        }
    }

    #[inline]
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(PARAMS_FILENAME)
    }

    pub fn read_from_file(path: &Path) -> Result<Self, SchemaError> {
        if !path.exists() {
            return Err(SchemaError::NotInstalled(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| SchemaError::Inconsistent {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Atomically replace the file at `path` with this record.
    pub fn write_to_file(&self, path: &Path) -> Result<(), SchemaError> {
        let content = serde_json::to_string_pretty(self)?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| SchemaError::Io(e.error))?;
        fsync_dir(dir)?;
        Ok(())
    }
}
