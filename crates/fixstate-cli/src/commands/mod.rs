pub mod init;
pub mod restore_state;
pub mod save_state;

use fixstate_core::{CoreError, Initializer};
use fixstate_schema::{ErrorKind, ProjectConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_STATE_ERROR: u8 = 3;

pub const CONFIG_ERROR_PREFIX: &str = "config error:";
pub const STATE_ERROR_PREFIX: &str = "state error:";

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn style_path(path: &Path) -> String {
    console::Style::new()
        .bold()
        .apply_to(path.display())
        .to_string()
}

/// Environment root declared by `profile` in the config at `config`.
///
/// A relative target is taken relative to the directory holding the config.
pub fn resolve_target(config: &Path, profile: &str) -> Result<PathBuf, String> {
    let project =
        ProjectConfig::load(config).map_err(|e| format!("{CONFIG_ERROR_PREFIX} {e}"))?;
    let target = project
        .target(profile)
        .map_err(|e| format!("{CONFIG_ERROR_PREFIX} {e}"))?;
    let target = if target.is_absolute() {
        target
    } else {
        config.parent().unwrap_or_else(|| Path::new("")).join(target)
    };
    debug!("profile '{profile}' targets {}", target.display());
    Ok(target)
}

/// Fail early when the environment's database backend cannot run, listing
/// the missing tools. `FIXSTATE_SKIP_PREREQS=1` disables the check.
pub fn check_prereqs(initializer: &Initializer) -> Result<(), String> {
    if std::env::var("FIXSTATE_SKIP_PREREQS").as_deref() == Ok("1") {
        return Ok(());
    }
    if initializer.backend_available().map_err(|e| core_error(&e))? {
        return Ok(());
    }
    let conn = initializer.connection().map_err(|e| core_error(&e))?;
    let missing = fixstate_db::check_tools(fixstate_db::prereqs_for(&conn.connection_type));
    if missing.is_empty() {
        Err(format!(
            "database backend for connection type '{}' is not available",
            conn.connection_type
        ))
    } else {
        Err(fixstate_db::format_missing(&missing))
    }
}

/// Render a core error, tagging the ones `main` maps to dedicated exit codes.
pub fn core_error(err: &CoreError) -> String {
    match err {
        CoreError::Schema(_) => format!("{CONFIG_ERROR_PREFIX} {err}"),
        CoreError::Store(_) => format!("{STATE_ERROR_PREFIX} {err}"),
        _ if err.kind() == ErrorKind::InvalidFormat => format!("{STATE_ERROR_PREFIX} {err}"),
        _ => err.to_string(),
    }
}

pub fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with(CONFIG_ERROR_PREFIX) {
        EXIT_CONFIG_ERROR
    } else if msg.starts_with(STATE_ERROR_PREFIX) {
        EXIT_STATE_ERROR
    } else {
        EXIT_FAILURE
    }
}
