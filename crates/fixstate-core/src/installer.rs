//! Fixture environment bootstrapper.
//!
//! An environment is a directory holding its own `etc`, `var` and `media`
//! trees, a rewritten front controller and the run-params record, while code
//! and static assets stay in the application source tree and are linked in.
//! Any failure during [`Installer::install`] clears the target directory
//! before the error is returned.

use crate::entrypoint::rewrite_entrypoint;
use crate::layout::AppLayout;
use crate::lifecycle::{validate_transition, InstallStage};
use crate::CoreError;
use fixstate_schema::{ConnectionConfig, LocalConfig, RunOptions, RunParams};
use fixstate_store::fso;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const ADMIN_USER_NAME: &str = "admin";
pub const ADMIN_USER_PASSWORD: &str = "123123qa";

/// Placeholders of the local config template filled in by the bootstrapper.
const TEMPLATE_KEYS: [&str; 11] = [
    "db_host",
    "db_user",
    "db_pass",
    "db_name",
    "db_prefix",
    "db_pdo_type",
    "db_init_statemants",
    "db_model",
    "db_type",
    "session_save",
    "admin_frontname",
];

/// Everything the application's own install routine gets to see.
#[derive(Debug)]
pub struct InstallRequest<'a> {
    pub code: &'a str,
    pub scope: &'a str,
    pub options: &'a RunOptions,
    pub source_root: &'a Path,
    /// Installer arguments: database settings, locale, URLs, admin account.
    pub config: &'a BTreeMap<String, Value>,
}

/// The application's own install routine, run as the last install step.
pub trait ApplicationInstaller: Send + Sync {
    fn install(&self, request: &InstallRequest<'_>) -> Result<(), CoreError>;
}

pub struct Installer {
    target: PathBuf,
    source: PathBuf,
    connection: ConnectionConfig,
    base_url: String,
    app: Box<dyn ApplicationInstaller>,
    layout: AppLayout,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("target", &self.target)
            .field("source", &self.source)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn resolve_dir(path: &Path, what: &str) -> Result<PathBuf, CoreError> {
    let resolved = path
        .canonicalize()
        .map_err(|e| CoreError::invalid_input(path, format!("{what} cannot be resolved: {e}")))?;
    if !resolved.is_dir() {
        return Err(CoreError::invalid_input(path, format!("{what} is not a directory")));
    }
    Ok(resolved)
}

impl Installer {
    pub fn new(
        target: &Path,
        source: &Path,
        connection: ConnectionConfig,
        base_url: &str,
        app: Box<dyn ApplicationInstaller>,
    ) -> Result<Self, CoreError> {
        Self::with_layout(target, source, connection, base_url, app, AppLayout::default())
    }

    pub fn with_layout(
        target: &Path,
        source: &Path,
        connection: ConnectionConfig,
        base_url: &str,
        app: Box<dyn ApplicationInstaller>,
        layout: AppLayout,
    ) -> Result<Self, CoreError> {
        let source_dir = resolve_dir(source, "application source")?;
        fs::read_dir(&source_dir)
            .map_err(|e| CoreError::invalid_input(source, format!("is not readable: {e}")))?;
        if !source_dir.join(&layout.marker).is_file() {
            return Err(CoreError::invalid_input(
                source,
                format!(
                    "is not an application source root (no {})",
                    layout.marker.display()
                ),
            ));
        }

        let target_dir = resolve_dir(target, "target")?;
        tempfile::NamedTempFile::new_in(&target_dir)
            .map_err(|e| CoreError::invalid_input(target, format!("is not writable: {e}")))?;

        Ok(Self {
            target: target_dir,
            source: source_dir,
            connection,
            base_url: base_url.to_owned(),
            app,
            layout,
        })
    }

    #[inline]
    pub fn target(&self) -> &Path {
        &self.target
    }

    #[inline]
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn is_installed(&self) -> bool {
        RunParams::path_in(&self.target).exists()
    }

    /// Arguments for the application's install routine.
    pub fn config_data(&self) -> BTreeMap<String, Value> {
        let conn = &self.connection;
        let entries = [
            ("db_host", json!(conn.host)),
            ("db_user", json!(conn.username)),
            ("db_pass", json!(conn.password)),
            ("db_name", json!(conn.dbname)),
            ("db_prefix", json!("")),
            ("db_pdo_type", json!("")),
            ("db_init_statemants", json!("SET NAMES utf8")),
            ("db_model", json!("mysql4")),
            ("db_type", json!(conn.connection_type)),
            ("session_save", json!("files")),
            ("admin_frontname", json!("admin")),
            ("license_agreement_accepted", json!("yes")),
            ("locale", json!("en_US")),
            ("timezone", json!("America/Los_Angeles")),
            ("default_currency", json!("USD")),
            ("url", json!(self.base_url)),
            ("secure_base_url", json!(self.base_url)),
            ("use_secure", json!(false)),
            ("use_secure_admin", json!(false)),
            ("use_rewrites", json!(false)),
            ("admin_lastname", json!("Doe")),
            ("admin_firstname", json!("John")),
            ("admin_email", json!("john@example.com")),
            ("admin_username", json!(ADMIN_USER_NAME)),
            ("admin_password", json!(ADMIN_USER_PASSWORD)),
        ];
        entries
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect()
    }

    /// Bootstrap the environment and run the application install.
    pub fn install(&self) -> Result<RunParams, CoreError> {
        if self.is_installed() {
            return Err(CoreError::AlreadyInstalled(self.target.clone()));
        }
        info!(
            "installing {} into {}",
            self.source.display(),
            self.target.display()
        );

        let mut stage = InstallStage::Start;
        match self.run_stages(&mut stage) {
            Ok(params) => {
                info!("environment ready at {}", self.target.display());
                Ok(params)
            }
            Err(e) => {
                warn!("install failed after stage {stage}: {e}");
                if advance(&mut stage, InstallStage::Rollback).is_ok() {
                    if let Err(cleanup) = fso::clear_dir(&self.target) {
                        warn!(
                            "rollback left {} partially cleared: {cleanup}",
                            self.target.display()
                        );
                    }
                }
                Err(e)
            }
        }
    }

    fn run_stages(&self, stage: &mut InstallStage) -> Result<RunParams, CoreError> {
        self.create_directory_structure()?;
        advance(stage, InstallStage::DirectoryStructureCreated)?;

        self.write_entrypoint()?;
        advance(stage, InstallStage::IndexEntrypointWritten)?;

        let params = RunParams::for_root(&self.target);
        params.write_to_file(&RunParams::path_in(&self.target))?;
        advance(stage, InstallStage::RunParamsWritten)?;

        self.write_local_config(&params.options.etc_dir)?;
        advance(stage, InstallStage::LocalConfigWritten)?;

        let config = self.config_data();
        self.app.install(&InstallRequest {
            code: &params.code,
            scope: &params.scope,
            options: &params.options,
            source_root: &self.source,
            config: &config,
        })?;
        advance(stage, InstallStage::ApplicationInstalled)?;

        advance(stage, InstallStage::Done)?;
        Ok(params)
    }

    fn create_directory_structure(&self) -> Result<(), CoreError> {
        let options = RunOptions::for_root(&self.target);
        for dir in [
            &options.etc_dir,
            &options.var_dir,
            &options.media_dir,
            &options.upload_dir,
        ] {
            fs::create_dir_all(dir)?;
        }

        let source_etc = self.source.join(&self.layout.etc_dir);
        for entry in fs::read_dir(&source_etc)? {
            let entry = entry?;
            let name = entry.file_name();
            let excluded = self
                .layout
                .etc_excluded
                .iter()
                .any(|x| name.to_str() == Some(x.as_str()));
            if excluded || !entry.path().is_file() {
                continue;
            }
            fso::copy(&entry.path(), &options.etc_dir.join(&name), false)?;
        }

        for (from, to) in &self.layout.shared {
            let from = self.source.join(from);
            if fs::symlink_metadata(&from).is_err() {
                debug!("{} not present in source, skipping", from.display());
                continue;
            }
            fso::copy(&from, &self.target.join(to), false)?;
        }
        Ok(())
    }

    fn write_entrypoint(&self) -> Result<(), CoreError> {
        let template_path = self.source.join(&self.layout.entrypoint_template);
        let template = fs::read_to_string(&template_path).map_err(|e| {
            CoreError::invalid_input(&template_path, format!("cannot be read: {e}"))
        })?;
        let index = rewrite_entrypoint(&template, &self.source, &self.layout)?;
        fs::write(self.target.join("index.php"), index)?;
        Ok(())
    }

    fn write_local_config(&self, etc_dir: &Path) -> Result<(), CoreError> {
        LocalConfig {
            connection: self.connection.clone(),
        }
        .write_to_dir(etc_dir)?;

        let template_path = self.source.join(&self.layout.local_config_template);
        if !template_path.is_file() {
            debug!(
                "no {} in source, not rendering {}",
                template_path.display(),
                self.layout.local_config
            );
            return Ok(());
        }
        let template = fs::read_to_string(&template_path)?;
        let rendered = render_template(&template, &self.config_data());
        fs::write(etc_dir.join(&self.layout.local_config), rendered)?;
        Ok(())
    }
}

fn advance(stage: &mut InstallStage, next: InstallStage) -> Result<(), CoreError> {
    validate_transition(*stage, next)?;
    debug!("install stage: {stage} -> {next}");
    *stage = next;
    Ok(())
}

/// Replace the `{{key}}` placeholders of the local config template.
fn render_template(template: &str, config: &BTreeMap<String, Value>) -> String {
    let mut out = template.to_owned();
    for key in TEMPLATE_KEYS {
        let value = match config.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        out = out.replace(&format!("{{{{{key}}}}}"), &value);
    }
    out
}
