use crate::{fsync_dir, SchemaError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default name of the profile config looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fixstate.toml";
pub const DEFAULT_PROFILE: &str = "default";
/// Name of the connection config written into an environment's `etc` dir.
pub const LOCAL_CONFIG_FILENAME: &str = "fixstate.toml";
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// One named profile of the project config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    /// Root of the installed fixture environment.
    #[serde(default)]
    pub target: Option<PathBuf>,
}

/// Project-level config: a table of profiles keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    #[serde(skip)]
    source: PathBuf,
    #[serde(flatten)]
    pub profiles: BTreeMap<String, Profile>,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        if !path.is_file() {
            return Err(SchemaError::ConfigNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ProjectConfig =
            toml::from_str(&content).map_err(|e| SchemaError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.source = path.to_path_buf();
        Ok(config)
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, SchemaError> {
        self.profiles
            .get(name)
            .ok_or_else(|| SchemaError::ProfileNotFound {
                profile: name.to_owned(),
                path: self.source.clone(),
            })
    }

    /// Environment root declared by the given profile.
    pub fn target(&self, profile: &str) -> Result<PathBuf, SchemaError> {
        self.profile(profile)?
            .target
            .clone()
            .ok_or_else(|| SchemaError::TargetNotDefined(profile.to_owned()))
    }
}

fn default_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

/// Database connection of an installed environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Backend tag, e.g. `pdo_mysql`.
    #[serde(rename = "type")]
    pub connection_type: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub dbname: String,
}

impl ConnectionConfig {
    pub fn new(
        connection_type: &str,
        host: &str,
        username: &str,
        password: &str,
        dbname: &str,
    ) -> Self {
        Self {
            connection_type: connection_type.to_owned(),
            host: host.to_owned(),
            port: DEFAULT_MYSQL_PORT,
            username: username.to_owned(),
            password: password.to_owned(),
            dbname: dbname.to_owned(),
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Contents of `<etc_dir>/fixstate.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LocalConfig {
    pub connection: ConnectionConfig,
}

impl LocalConfig {
    #[inline]
    pub fn path_in(etc_dir: &Path) -> PathBuf {
        etc_dir.join(LOCAL_CONFIG_FILENAME)
    }

    pub fn load(etc_dir: &Path) -> Result<Self, SchemaError> {
        let path = Self::path_in(etc_dir);
        if !path.is_file() {
            return Err(SchemaError::LocalConfigMissing(etc_dir.to_path_buf()));
        }
        let content = fs::read_to_string(&path).map_err(|source| SchemaError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| SchemaError::Parse {
            path,
            reason: e.to_string(),
        })
    }

    pub fn write_to_dir(&self, etc_dir: &Path) -> Result<(), SchemaError> {
        let content = toml::to_string_pretty(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(etc_dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(Self::path_in(etc_dir))
            .map_err(|e| SchemaError::Io(e.error))?;
        fsync_dir(etc_dir)?;
        Ok(())
    }
}
