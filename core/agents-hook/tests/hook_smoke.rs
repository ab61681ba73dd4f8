use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use agents_core::{FileClaims, SessionRegistry, StorageConfig};
use tempfile::TempDir;

fn run_hook(home: &Path, session: Option<&str>, stdin: &str) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_agents-hook"));
    command
        .arg("handle")
        .env("AGENTS_HOME", home)
        .env_remove("AGENT_SESSION_ID")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(session) = session {
        command.env("AGENT_SESSION_ID", session);
    }

    let mut child = command.spawn().expect("Failed to spawn agents-hook");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("Failed to write hook input");
    child.wait_with_output().expect("Failed to wait for agents-hook")
}

fn edit_event(path: &str) -> String {
    serde_json::json!({
        "hook_event_name": "PostToolUse",
        "tool_name": "Write",
        "tool_input": { "file_path": path, "content": "..." }
    })
    .to_string()
}

#[test]
fn test_warns_about_file_touched_by_other_session() {
    let home = TempDir::new().expect("temp dir");
    let registry = SessionRegistry::open(StorageConfig::with_root(home.path().to_path_buf()));
    let other = registry.create(std::process::id()).expect("create other");
    let me = registry.create(std::process::id()).expect("create me");
    FileClaims::new(&registry).track("/proj/src/main.rs", Some(&other));

    let output = run_hook(home.path(), Some(&me), &edit_event("/proj/src/main.rs"));

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        format!(
            "File claimed by another session: /proj/src/main.rs\n\
             Session: {other}. Run `agents list` to see details.\n"
        )
    );
    assert!(FileClaims::new(&registry)
        .session_files(&me)
        .contains("/proj/src/main.rs"));
}

#[test]
fn test_bad_input_exits_zero_silently() {
    let home = TempDir::new().expect("temp dir");

    for input in ["", "not json", "{\"tool_input\": {}}"] {
        let output = run_hook(home.path(), Some("nonexistent"), input);
        assert!(output.status.success(), "input {input:?}");
        assert!(output.stdout.is_empty(), "input {input:?}");
    }
}

#[test]
fn test_unknown_session_is_not_tracked() {
    let home = TempDir::new().expect("temp dir");
    let registry = SessionRegistry::open(StorageConfig::with_root(home.path().to_path_buf()));

    let output = run_hook(home.path(), Some("ghost"), &edit_event("/proj/a.rs"));

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert!(registry.list().is_empty());
    assert!(!home.path().join("sessions").join("ghost").exists());
}
