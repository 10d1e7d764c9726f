//! Smoke tests for the juryrig CLI.
//!
//! These tests verify basic CLI functionality:
//! - `jr --version` outputs version info
//! - `jr --help` outputs help text
//! - `jr diagnose` accepts stdin and outputs valid JSON

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a Command for the jr binary.
fn jr() -> Command {
    Command::new(env!("CARGO_BIN_EXE_jr"))
}

#[test]
fn test_version_flag() {
    jr().arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("jr"));
}

#[test]
fn test_help_flag() {
    jr().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("diagnose"))
        .stdout(predicate::str::contains("fix"))
        .stdout(predicate::str::contains("report"));
}

#[test]
fn test_help_flag_short() {
    jr().arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_diagnose_stdin_outputs_json() {
    let output = jr()
        .arg("diagnose")
        .write_stdin("TypeError: x is not a function\n")
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("JSON output");
    assert!(parsed["clusters"].is_array());
}

#[test]
fn test_missing_repo_path_errors() {
    jr().args(["-C", "/definitely/not/a/real/path", "report"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
