//! Integration tests for the cnholiday binary
//!
//! These only exercise commands that never reach the network.

use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::TempDir;

const CACHE_VARS: [&str; 5] = [
    "CACHE_ENABLED",
    "CACHE_TTL",
    "CACHE_MAX_SIZE",
    "CACHE_TYPE",
    "CACHE_DIR",
];

/// Builds a command with no cache settings inherited from the environment
fn cnholiday() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_cnholiday"));
    for var in CACHE_VARS {
        command.env_remove(var);
    }
    command.env("RUST_LOG", "error");
    command
}

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    cnholiday()
        .args(args)
        .output()
        .expect("Failed to execute cnholiday")
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("stdout should be JSON")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("cnholiday"), "Help should mention cnholiday");
    assert!(stdout.contains("countdown"), "Help should list subcommands");
    assert!(stdout.contains("CACHE_TTL"), "Help should mention env vars");
}

#[test]
fn test_missing_subcommand_fails() {
    let output = run_cli(&[]);
    assert!(!output.status.success());
}

#[test]
fn test_weekday_prints_json() {
    let output = run_cli(&["weekday", "2024-06-16"]);
    assert!(output.status.success());

    let value = stdout_json(&output);
    assert_eq!(value["weekday_name_en"], "Sunday");
    assert_eq!(value["weekday_name_cn"], "星期日");
    assert_eq!(value["weekday_index"], 7);
    assert_eq!(value["is_weekend"], true);
}

#[test]
fn test_invalid_date_reports_structured_error() {
    let output = run_cli(&["weekday", "2024-13-45"]);
    assert!(
        !output.status.success(),
        "Expected invalid date to fail"
    );

    let value = stdout_json(&output);
    assert_eq!(value["error_code"], "INVALID_INPUT");
    assert!(value["message"].as_str().unwrap().contains("2024-13-45"));
}

#[test]
fn test_out_of_range_year_rejected() {
    let output = run_cli(&["holidays", "--year", "99999"]);
    assert!(!output.status.success());
    assert_eq!(stdout_json(&output)["error_code"], "INVALID_INPUT");
}

#[test]
fn test_cache_stats_memory() {
    let output = run_cli(&["cache", "stats"]);
    assert!(output.status.success());

    let value = stdout_json(&output);
    assert_eq!(value["config"]["cache_type"], "memory");
    assert_eq!(value["config"]["enabled"], true);
    assert_eq!(value["config"]["default_ttl_secs"], 3600);
    assert_eq!(value["years"]["total_entries"], 0);
    assert_eq!(value["days"]["hit_rate"], 0.0);
}

#[test]
fn test_cache_stats_persistent_from_env() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    let output = cnholiday()
        .env("CACHE_TYPE", "persistent")
        .env("CACHE_DIR", temp_dir.path())
        .env("CACHE_MAX_SIZE", "50")
        .args(["cache", "stats"])
        .output()
        .expect("Failed to execute cnholiday");
    assert!(output.status.success());

    let value = stdout_json(&output);
    assert_eq!(value["config"]["cache_type"], "persistent");
    assert_eq!(value["config"]["max_size"], 50);
    assert_eq!(
        value["config"]["dir"],
        temp_dir.path().display().to_string()
    );
}

#[test]
fn test_invalid_cache_type_rejected() {
    let output = cnholiday()
        .env("CACHE_TYPE", "redis")
        .args(["cache", "stats"])
        .output()
        .expect("Failed to execute cnholiday");
    assert!(!output.status.success());
}

#[test]
fn test_shell_reads_commands_from_stdin() {
    let mut child = cnholiday()
        .arg("shell")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to spawn cnholiday");

    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(b"weekday 20240617\ncache sweep\nexit\n")
        .expect("Failed to write commands");

    let output = child.wait_with_output().expect("Failed to wait for shell");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Monday"));
    assert_eq!(lines[1], r#"{"removed":0}"#);
}
