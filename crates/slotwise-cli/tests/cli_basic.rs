//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against the fixture snapshot, with the
//! config file redirected into a temporary directory.

use std::path::{Path, PathBuf};
use std::process::Command;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/context.json")
}

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(config_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let config = config_dir.join("config.toml");
    let output = Command::new(env!("CARGO_BIN_EXE_slotwise-cli"))
        .args(args)
        .arg("--config")
        .arg(&config)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn fixture_arg() -> String {
    fixture().display().to_string()
}

#[test]
fn test_schedule_run_json() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_cli(dir.path(), &["schedule", "run", "-c", &fixture_arg(), "--json"]);
    assert_eq!(code, 0, "schedule run failed: {stderr}");

    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["fingerprint"].as_str().map(str::len), Some(64));
    let scheduled = result["scheduled"].as_array().unwrap();
    assert!(scheduled.iter().any(|s| s["source_id"] == "report" && s["kind"] == "task"));
    assert!(scheduled.iter().any(|s| s["source_id"] == "publish" && s["kind"] == "workflow_step"));
    assert!(scheduled.iter().any(|s| s["source_id"] == "ci" && s["is_wait_time"] == true));
    let sleep = scheduled.iter().filter(|s| s["source_id"] == "sleep").count();
    assert_eq!(sleep, 2);
}

#[test]
fn test_schedule_run_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let args = ["schedule", "run", "-c", &fixture_arg(), "--json"];
    let (first, _, _) = run_cli(dir.path(), &args);
    let (second, _, _) = run_cli(dir.path(), &args);
    assert_eq!(first, second);
}

#[test]
fn test_schedule_run_text() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["schedule", "run", "-c", &fixture_arg()]);
    assert_eq!(code, 0);
    assert!(stdout.contains("2026-03-02"));
    assert!(stdout.contains("Quarterly report"));
    assert!(stdout.contains("items scheduled"));
}

#[test]
fn test_schedule_explain() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_cli(dir.path(), &["schedule", "explain", "-c", &fixture_arg(), "verify"]);
    assert_eq!(code, 0, "explain failed: {stderr}");
    assert!(stdout.contains("Verify CI results scheduled"));
    assert!(stdout.contains("deadline pressure"));
}

#[test]
fn test_schedule_explain_unknown_id() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["schedule", "explain", "-c", &fixture_arg(), "nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_missing_context_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    let (_, stderr, code) = run_cli(dir.path(), &["schedule", "run", "-c", &missing.display().to_string()]);
    assert_eq!(code, 1);
    assert!(stderr.contains("cannot read context"));
}

#[test]
fn test_deadline_check_passes() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["deadline", "check", "-c", &fixture_arg()]);
    assert_eq!(code, 0);
    assert!(stdout.contains("ok   report"));
    assert!(stdout.contains("ok   launch"));
}

#[test]
fn test_deadline_check_fails_late() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_cli(
        dir.path(),
        &["deadline", "check", "-c", &fixture_arg(), "--now", "2026-03-04T16:00:00Z"],
    );
    assert_eq!(code, 1);
    assert!(stdout.contains("FAIL report"));
    assert!(stderr.contains("cannot be met"));
}

#[test]
fn test_deps_levels() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["deps", "levels", "-c", &fixture_arg()]);
    assert_eq!(code, 0);
    assert!(stdout.contains("0 copy"));
    assert!(stdout.contains("1 review <- copy"));
    assert!(stdout.contains("2 publish <- review"));
    assert!(stdout.contains("1 verify <- ci"));
}

#[test]
fn test_deps_check_edge() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = fixture_arg();
    let (_, stderr, code) = run_cli(
        dir.path(),
        &["deps", "check-edge", "-c", &fixture, "--workflow", "launch", "copy", "publish"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("cycle"));

    let (stdout, _, code) = run_cli(
        dir.path(),
        &["deps", "check-edge", "-c", &fixture, "--workflow", "launch", "publish", "copy"],
    );
    assert_eq!(code, 0);
    assert!(stdout.starts_with("ok"));
}

#[test]
fn test_config_set_get_reset() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["config", "set", "scoring.hard_deadline_k", "12"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "ok");

    let (stdout, _, _) = run_cli(dir.path(), &["config", "get", "scoring.hard_deadline_k"]);
    assert_eq!(stdout.trim(), "12.0");

    let (stdout, _, _) = run_cli(dir.path(), &["config", "list"]);
    assert!(stdout.contains("backfill.horizon_days = 14"));

    run_cli(dir.path(), &["config", "reset"]);
    let (stdout, _, _) = run_cli(dir.path(), &["config", "get", "scoring.hard_deadline_k"]);
    assert_eq!(stdout.trim(), "10.0");
}

#[test]
fn test_config_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["config", "get", "nope.nothing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "scoring.nope", "1"]);
    assert_eq!(code, 1);
}

#[test]
fn test_config_path_override() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with("config.toml"));
}

#[test]
fn test_completions() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("slotwise-cli"));
}
