use crate::DbError;
use fixstate_schema::ConnectionConfig;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

pub trait DumpBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the external tools this backend drives can be run.
    fn available(&self) -> bool;

    /// Write a full dump of the database into `dest`, replacing it.
    fn create_dump(&self, dest: &Path) -> Result<(), DbError>;

    /// Replay the dump at `source` into the database.
    fn restore_dump(&self, source: &Path) -> Result<(), DbError>;
}

type Constructor =
    Box<dyn Fn(&ConnectionConfig) -> Result<Box<dyn DumpBackend>, DbError> + Send + Sync>;

/// Maps a connection type tag to the constructor of its backend.
pub struct BackendRegistry {
    constructors: HashMap<String, Constructor>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("types", &self.types())
            .finish()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BackendRegistry {
    /// A registry with no backends.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// `pdo_mysql` and `mock`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry
            .register("pdo_mysql", |conn| {
                Ok(Box::new(crate::mysql::MysqlBackend::from_connection(conn)))
            })
            .register("mock", |conn| {
                Ok(Box::new(crate::mock::MockBackend::new(&conn.dbname)))
            });
        registry
    }

    /// Add a backend, or replace the one registered under `connection_type`.
    pub fn register<F>(&mut self, connection_type: &str, constructor: F) -> &mut Self
    where
        F: Fn(&ConnectionConfig) -> Result<Box<dyn DumpBackend>, DbError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(connection_type.to_owned(), Box::new(constructor));
        self
    }

    pub fn create(&self, conn: &ConnectionConfig) -> Result<Box<dyn DumpBackend>, DbError> {
        let constructor = self
            .constructors
            .get(&conn.connection_type)
            .ok_or_else(|| DbError::UnsupportedBackend(conn.connection_type.clone()))?;
        constructor(conn)
    }

    /// Registered connection types, sorted.
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
