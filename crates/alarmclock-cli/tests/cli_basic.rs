//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run against a throwaway data directory.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new("cargo");
    cmd.args(["run", "-q", "-p", "alarmclock-cli", "--"])
        .env("ALARMCLOCK_DATA_DIR", dir)
        .env_remove("ALARMCLOCK_LOG");
    cmd
}

/// Run a CLI command and return (code, stdout, stderr).
fn run_cli(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = cli(dir)
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn list_json(dir: &Path) -> Vec<serde_json::Value> {
    let (code, stdout, stderr) = run_cli(dir, &["alarm", "list", "--json"]);
    assert_eq!(code, 0, "alarm list failed: {stderr}");
    serde_json::from_str(&stdout).expect("list output is not JSON")
}

#[test]
fn test_alarm_add_and_list() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = run_cli(
        dir.path(),
        &["alarm", "add", "07:30", "--days", "mon,wed", "--label", "gym"],
    );
    assert_eq!(code, 0, "alarm add failed: {stderr}");
    assert!(stdout.contains("Alarm created: 1"));

    let alarms = list_json(dir.path());
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0]["hour"], 7);
    assert_eq!(alarms[0]["minute"], 30);
    assert_eq!(alarms[0]["days"], 0b101);
    assert_eq!(alarms[0]["label"], "gym");
    assert_eq!(alarms[0]["enabled"], true);
}

#[test]
fn test_alarm_add_uses_config_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(dir.path(), &["config", "set", "defaults.snooze_minutes", "5"]);
    assert_eq!(code, 0);

    run_cli(dir.path(), &["alarm", "add", "06:00"]);
    let alarms = list_json(dir.path());
    assert_eq!(alarms[0]["snooze_minutes"], 5);
}

#[test]
fn test_alarm_add_rejects_bad_time() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["alarm", "add", "25:00"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error"));
    assert!(list_json(dir.path()).is_empty());
}

#[test]
fn test_alarm_enable_disable_delete() {
    let dir = tempfile::tempdir().unwrap();
    run_cli(dir.path(), &["alarm", "add", "08:00"]);

    let (code, _, _) = run_cli(dir.path(), &["alarm", "disable", "1"]);
    assert_eq!(code, 0);
    assert_eq!(list_json(dir.path())[0]["enabled"], false);

    let (code, _, _) = run_cli(dir.path(), &["alarm", "enable", "1"]);
    assert_eq!(code, 0);
    assert_eq!(list_json(dir.path())[0]["enabled"], true);

    let (code, stdout, _) = run_cli(dir.path(), &["alarm", "delete", "1"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Alarm deleted: 1"));
    assert!(list_json(dir.path()).is_empty());
}

#[test]
fn test_alarm_edit_keeps_unspecified_fields() {
    let dir = tempfile::tempdir().unwrap();
    run_cli(dir.path(), &["alarm", "add", "08:00", "--label", "work"]);

    let (code, _, stderr) = run_cli(dir.path(), &["alarm", "edit", "1", "--time", "09:15"]);
    assert_eq!(code, 0, "alarm edit failed: {stderr}");

    let (code, stdout, _) = run_cli(dir.path(), &["alarm", "show", "1"]);
    assert_eq!(code, 0);
    let alarm: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(alarm["hour"], 9);
    assert_eq!(alarm["minute"], 15);
    assert_eq!(alarm["label"], "work");
}

#[test]
fn test_alarm_show_unknown_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["alarm", "show", "42"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("42"));
}

#[test]
fn test_config_get_set() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "scheduling.job_tag_prefix"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "alarm-");

    let (code, _, _) = run_cli(
        dir.path(),
        &["config", "set", "notifications.upcoming_lead_minutes", "15"],
    );
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(
        dir.path(),
        &["config", "get", "notifications.upcoming_lead_minutes"],
    );
    assert_eq!(stdout.trim(), "15");

    let (code, _, _) = run_cli(dir.path(), &["config", "get", "no.such.key"]);
    assert_ne!(code, 0);
}

#[test]
fn test_run_quits_on_command() {
    let dir = tempfile::tempdir().unwrap();
    run_cli(dir.path(), &["alarm", "add", "07:00", "--days", "daily"]);

    let mut child = cli(dir.path())
        .args(["run", "--rescan-secs", "0"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start daemon");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"ringing\nquit\n")
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("[]"));
}
