//! MySQL backend against fake `mysqldump`/`mysql` scripts.
//!
//! The scenarios run sequentially from one test: writing an executable while
//! another test thread forks can make `exec` fail with ETXTBSY.
#![cfg(unix)]

use fixstate_db::{DbError, DumpBackend, MysqlBackend};
use fixstate_schema::{ConnectionConfig, ErrorKind};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

const VERSION_GUARD: &str = "if [ \"$1\" = \"--version\" ]; then echo fake 1.0; exit 0; fi\n";

fn connection() -> ConnectionConfig {
    ConnectionConfig::new("pdo_mysql", "127.0.0.1", "app", "secret", "fixture").with_port(3316)
}

fn dump_writes_tool_stdout(dir: &Path, tools: &Path) {
    let dump_bin = script(
        tools,
        "dump-ok",
        &format!("{VERSION_GUARD}echo \"-- dump\"\nfor a in \"$@\"; do echo \"$a\"; done\n"),
    );
    let backend =
        MysqlBackend::from_connection(&connection()).with_tools(&dump_bin, "/nonexistent/mysql");
    let dest = dir.join("dump.sql");
    backend.create_dump(&dest).unwrap();
    assert_eq!(
        fs::read_to_string(&dest).unwrap(),
        "-- dump\nfixture\n--host=127.0.0.1\n--port=3316\n--user=app\n--password=secret\n"
    );
}

fn restore_feeds_dump_to_stdin(dir: &Path, tools: &Path) {
    let received = dir.join("received.sql");
    let client_bin = script(
        tools,
        "client-ok",
        &format!(
            "{VERSION_GUARD}cat > '{}'\necho \"$@\" > '{}.args'\n",
            received.display(),
            received.display()
        ),
    );
    let source = dir.join("replay.sql");
    fs::write(&source, "INSERT INTO t VALUES (1);\n").unwrap();

    let backend =
        MysqlBackend::from_connection(&connection()).with_tools("/nonexistent/dump", &client_bin);
    backend.restore_dump(&source).unwrap();
    assert_eq!(
        fs::read_to_string(&received).unwrap(),
        "INSERT INTO t VALUES (1);\n"
    );
    let args = fs::read_to_string(dir.join("received.sql.args")).unwrap();
    assert_eq!(
        args.trim(),
        "--host=127.0.0.1 --port=3316 --database=fixture --user=app --password=secret"
    );
}

fn failing_tool_reports_truncated_output(dir: &Path, tools: &Path) {
    let noisy = "E".repeat(400);
    let dump_bin = script(
        tools,
        "dump-fail",
        &format!("{VERSION_GUARD}echo \"{noisy}\" >&2\nexit 2\n"),
    );
    let backend =
        MysqlBackend::from_connection(&connection()).with_tools(&dump_bin, "/nonexistent/mysql");
    let err = backend.create_dump(&dir.join("failed.sql")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuntimeError);
    match err {
        DbError::ToolFailed { output, .. } => assert_eq!(output, "E".repeat(150)),
        other => panic!("unexpected error: {other}"),
    }
}

fn broken_version_check_is_unavailable(dir: &Path, tools: &Path) {
    let client_bin = script(tools, "client-broken", "exit 1\n");
    let source = dir.join("replay2.sql");
    fs::write(&source, "SELECT 1;\n").unwrap();
    let backend =
        MysqlBackend::from_connection(&connection()).with_tools("/nonexistent/dump", &client_bin);
    assert!(!backend.available());
    let err = backend.restore_dump(&source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ToolUnavailable);
}

#[test]
fn fake_tool_scenarios() {
    let dir = tempfile::tempdir().unwrap();
    let tools = dir.path().join("bin");
    fs::create_dir(&tools).unwrap();

    dump_writes_tool_stdout(dir.path(), &tools);
    restore_feeds_dump_to_stdin(dir.path(), &tools);
    failing_tool_reports_truncated_output(dir.path(), &tools);
    broken_version_check_is_unavailable(dir.path(), &tools);
}
