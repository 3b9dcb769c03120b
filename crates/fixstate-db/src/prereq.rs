use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

/// Whether `<bin> --version` runs and exits successfully.
pub(crate) fn tool_runs(bin: &Path) -> bool {
    Command::new(bin)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// External tools the backend for `connection_type` needs.
pub fn prereqs_for(connection_type: &str) -> &'static [&'static str] {
    match connection_type {
        "pdo_mysql" => &["mysqldump", "mysql"],
        _ => &[],
    }
}

fn describe(tool: &str) -> (&'static str, &'static str) {
    match tool {
        "mysqldump" => (
            "dumping the fixture database",
            "apt install mariadb-client | dnf install mariadb | zypper install mariadb-client",
        ),
        "mysql" => (
            "restoring the fixture database",
            "apt install mariadb-client | dnf install mariadb | zypper install mariadb-client",
        ),
        _ => ("database state handling", "see your distribution's packages"),
    }
}

/// Check that every tool in `tools` can be run.
/// Returns the missing ones; an empty list means all are present.
pub fn check_tools(tools: &[&str]) -> Vec<MissingPrereq> {
    tools
        .iter()
        .filter(|tool| !tool_runs(Path::new(tool)))
        .map(|tool| {
            let (purpose, install_hint) = describe(tool);
            MissingPrereq {
                name: (*tool).to_owned(),
                purpose,
                install_hint,
            }
        })
        .collect()
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nfixstate needs these tools to save and restore database state.");
    msg
}
