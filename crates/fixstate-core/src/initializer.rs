//! State orchestration for an installed environment.

use crate::CoreError;
use fixstate_db::{BackendRegistry, DumpBackend};
use fixstate_schema::{ConnectionConfig, LocalConfig, RunParams, DEFAULT_SCOPE};
use fixstate_store::{fso, Partition, StateArchive, StoreError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

const TEMP_PREFIX: &str = "fixstate-";

/// Saves and restores the database, `var` and `media` state of the
/// environment rooted at `root`, and selects which store it runs.
pub struct Initializer {
    root: PathBuf,
    store_code: String,
    scope_code: String,
    registry: BackendRegistry,
    backends: Mutex<HashMap<String, Arc<dyn DumpBackend>>>,
}

impl std::fmt::Debug for Initializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Initializer")
            .field("root", &self.root)
            .field("store_code", &self.store_code)
            .field("scope_code", &self.scope_code)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Initializer {
    pub fn new(root: impl Into<PathBuf>, store_code: &str, scope_code: &str) -> Self {
        Self {
            root: root.into(),
            store_code: store_code.to_owned(),
            scope_code: scope_code.to_owned(),
            registry: BackendRegistry::with_defaults(),
            backends: Mutex::new(HashMap::new()),
        }
    }

    /// Default store code (empty) in the `store` scope.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self::new(root, "", DEFAULT_SCOPE)
    }

    #[must_use]
    pub fn with_registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = registry;
        self.backends = Mutex::new(HashMap::new());
        self
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Point the run params at the configured store and scope.
    pub fn initialize(&self) -> Result<RunParams, CoreError> {
        let path = RunParams::path_in(&self.root);
        if !path.is_file() {
            return Err(CoreError::invalid_input(
                &self.root,
                "is not a valid environment root (no run params)",
            ));
        }
        let mut params = RunParams::read_from_file(&path)?;
        params.code.clone_from(&self.store_code);
        params.scope.clone_from(&self.scope_code);
        params.write_to_file(&path)?;
        info!(
            "environment {} runs {} '{}'",
            self.root.display(),
            params.scope,
            params.code
        );
        Ok(params)
    }

    pub fn params(&self) -> Result<RunParams, CoreError> {
        Ok(RunParams::read_from_file(&RunParams::path_in(&self.root))?)
    }

    /// Database connection of the environment.
    pub fn connection(&self) -> Result<ConnectionConfig, CoreError> {
        let params = self.params()?;
        Ok(LocalConfig::load(&params.options.etc_dir)?.connection)
    }

    /// Whether the environment's database backend can run right now.
    pub fn backend_available(&self) -> Result<bool, CoreError> {
        let params = self.params()?;
        Ok(self.backend(&params)?.available())
    }

    fn backend(&self, params: &RunParams) -> Result<Arc<dyn DumpBackend>, CoreError> {
        let conn = LocalConfig::load(&params.options.etc_dir)?.connection;
        let mut cache = self.backends.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(backend) = cache.get(&conn.connection_type) {
            return Ok(Arc::clone(backend));
        }
        let backend: Arc<dyn DumpBackend> = Arc::from(self.registry.create(&conn)?);
        debug!(
            "using {} backend for connection type '{}'",
            backend.name(),
            conn.connection_type
        );
        cache.insert(conn.connection_type.clone(), Arc::clone(&backend));
        Ok(backend)
    }

    /// Snapshot the environment into the archive at `path`.
    pub fn save_state(&self, path: &Path) -> Result<StateArchive, CoreError> {
        let params = self.params()?;
        let backend = self.backend(&params)?;
        info!("saving state of {} to {}", self.root.display(), path.display());

        let mut archive = StateArchive::open(path)?;
        let dump = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile()?;
        debug!("dumping database into {}", dump.path().display());
        backend.create_dump(dump.path())?;
        archive.set_dump(dump.path())?;

        let options = &params.options;
        if options.var_dir.is_dir() {
            archive.set_var(&options.var_dir)?;
        } else {
            debug!("{} does not exist, var not saved", options.var_dir.display());
        }
        if options.media_dir.is_dir() {
            archive.set_media(&options.media_dir)?;
        } else {
            debug!("{} does not exist, media not saved", options.media_dir.display());
        }
        archive.save()?;

        if let Err(e) = dump.close() {
            warn!("failed to remove temporary dump: {e}");
        }
        Ok(archive)
    }

    /// Replace the environment's database, `var` and `media` with the
    /// snapshot at `path`.
    ///
    /// An archive without a database dump is rejected before anything is
    /// touched. The live `var` and `media` trees are deleted before the
    /// snapshot's trees are moved in; a failure after that point leaves them
    /// missing.
    pub fn restore_state(&self, path: &Path) -> Result<(), CoreError> {
        let params = self.params()?;
        if !path.is_file() {
            return Err(CoreError::invalid_input(path, "is not an existing state archive"));
        }
        let backend = self.backend(&params)?;
        info!("restoring state of {} from {}", self.root.display(), path.display());

        let mut archive = StateArchive::open(path)?;
        if !archive.contains(Partition::Dump) {
            return Err(StoreError::InvalidFormat {
                path: path.to_path_buf(),
                reason: "state archive has no database dump".to_owned(),
            }
            .into());
        }
        let staging = tempfile::Builder::new().prefix(TEMP_PREFIX).tempdir()?;
        debug!("staging restore in {}", staging.path().display());

        archive.extract_dump(staging.path())?;
        backend.restore_dump(&staging.path().join(Partition::Dump.as_str()))?;

        let options = &params.options;
        let live = [
            (Partition::Var, &options.var_dir),
            (Partition::Media, &options.media_dir),
        ];
        for (_, dir) in live {
            if fs::symlink_metadata(dir).is_ok() {
                fso::delete(dir)?;
            }
        }

        archive.extract_var(staging.path())?;
        archive.extract_media(staging.path())?;
        for (partition, dir) in live {
            let staged = staging.path().join(partition.as_str());
            if !staged.exists() {
                debug!("{} has no {partition}, {} left absent", path.display(), dir.display());
                continue;
            }
            debug!("moving {} to {}", staged.display(), dir.display());
            fso::move_path(&staged, dir)?;
        }

        if let Err(e) = staging.close() {
            warn!("failed to remove staging directory: {e}");
        }
        info!("state restored from {}", path.display());
        Ok(())
    }
}
