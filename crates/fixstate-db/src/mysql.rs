//! Process-based MySQL backend driving `mysqldump` and `mysql`.
//!
//! Connection settings are passed as discrete argv items, never through a
//! shell. The dump streams into the destination file through the child's
//! stdout; a restore feeds the dump file to the client's stdin.

use crate::prereq::tool_runs;
use crate::{excerpt, DbError, DumpBackend};
use fixstate_schema::ConnectionConfig;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, info};

pub struct MysqlBackend {
    host: String,
    port: u16,
    username: String,
    password: String,
    dbname: String,
    dump_bin: PathBuf,
    client_bin: PathBuf,
}

impl MysqlBackend {
    pub fn from_connection(conn: &ConnectionConfig) -> Self {
        Self {
            host: conn.host.clone(),
            port: conn.port,
            username: conn.username.clone(),
            password: conn.password.clone(),
            dbname: conn.dbname.clone(),
            dump_bin: PathBuf::from("mysqldump"),
            client_bin: PathBuf::from("mysql"),
        }
    }

    /// Use other executables than `mysqldump` and `mysql` from `PATH`.
    #[must_use]
    pub fn with_tools(
        mut self,
        dump_bin: impl Into<PathBuf>,
        client_bin: impl Into<PathBuf>,
    ) -> Self {
        self.dump_bin = dump_bin.into();
        self.client_bin = client_bin.into();
        self
    }

    fn dump_args(&self) -> Vec<String> {
        vec![
            self.dbname.clone(),
            format!("--host={}", self.host),
            format!("--port={}", self.port),
            format!("--user={}", self.username),
            format!("--password={}", self.password),
        ]
    }

    fn client_args(&self) -> Vec<String> {
        vec![
            format!("--host={}", self.host),
            format!("--port={}", self.port),
            format!("--database={}", self.dbname),
            format!("--user={}", self.username),
            format!("--password={}", self.password),
        ]
    }
}

fn require_tool(bin: &Path) -> Result<(), DbError> {
    if tool_runs(bin) {
        Ok(())
    } else {
        Err(DbError::ToolUnavailable {
            tool: bin.display().to_string(),
            reason: "`--version` did not run successfully".to_owned(),
        })
    }
}

fn check_status(bin: &Path, output: &Output) -> Result<(), DbError> {
    if output.status.success() {
        return Ok(());
    }
    let mut detail = excerpt(&output.stderr);
    if detail.is_empty() {
        detail = excerpt(&output.stdout);
    }
    if detail.is_empty() {
        detail = output.status.to_string();
    }
    Err(DbError::ToolFailed {
        tool: bin.display().to_string(),
        output: detail,
    })
}

impl DumpBackend for MysqlBackend {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn available(&self) -> bool {
        tool_runs(&self.dump_bin) && tool_runs(&self.client_bin)
    }

    fn create_dump(&self, dest: &Path) -> Result<(), DbError> {
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        tempfile::NamedTempFile::new_in(dir).map_err(|e| DbError::InvalidInput {
            path: dest.to_path_buf(),
            reason: format!("directory is not writable: {e}"),
        })?;
        require_tool(&self.dump_bin)?;

        info!("dumping database '{}' to {}", self.dbname, dest.display());
        let out = File::create(dest)?;
        let output = Command::new(&self.dump_bin)
            .args(self.dump_args())
            .stdin(Stdio::null())
            .stdout(out)
            .stderr(Stdio::piped())
            .output()?;
        check_status(&self.dump_bin, &output)?;
        debug!(
            "dump of '{}' is {} bytes",
            self.dbname,
            fs::metadata(dest).map(|m| m.len()).unwrap_or(0)
        );
        Ok(())
    }

    fn restore_dump(&self, source: &Path) -> Result<(), DbError> {
        if !source.is_file() {
            return Err(DbError::InvalidInput {
                path: source.to_path_buf(),
                reason: "not an existing file".to_owned(),
            });
        }
        let input = File::open(source).map_err(|e| DbError::InvalidInput {
            path: source.to_path_buf(),
            reason: format!("unreadable: {e}"),
        })?;
        require_tool(&self.client_bin)?;

        info!("restoring database '{}' from {}", self.dbname, source.display());
        let output = Command::new(&self.client_bin)
            .args(self.client_args())
            .stdin(input)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;
        check_status(&self.client_bin, &output)
    }
}
