use crate::{DbError, DumpBackend};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// In-process backend for tests and dry runs.
///
/// Dumps are a fixed placeholder naming the database. Restores read the
/// dump and record its bytes; clones share the record.
#[derive(Debug, Clone)]
pub struct MockBackend {
    dbname: String,
    restored: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockBackend {
    pub fn new(dbname: &str) -> Self {
        Self {
            dbname: dbname.to_owned(),
            restored: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Placeholder content written by [`create_dump`](DumpBackend::create_dump).
    pub fn placeholder(&self) -> String {
        format!("-- fixstate mock dump of {}\n", self.dbname)
    }

    /// Every dump replayed so far, oldest first.
    pub fn restored(&self) -> Vec<Vec<u8>> {
        self.restored
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl DumpBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn create_dump(&self, dest: &Path) -> Result<(), DbError> {
        fs::write(dest, self.placeholder()).map_err(|e| DbError::InvalidInput {
            path: dest.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn restore_dump(&self, source: &Path) -> Result<(), DbError> {
        let bytes = fs::read(source).map_err(|e| DbError::InvalidInput {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut restored = self.restored.lock().map_err(|e| DbError::ToolFailed {
            tool: "mock".to_owned(),
            output: format!("mutex poisoned: {e}"),
        })?;
        restored.push(bytes);
        Ok(())
    }
}
