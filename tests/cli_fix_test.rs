//! Integration tests for `jr fix`.
//!
//! Exercises policy gating, dry runs, manual-only causes, and a real
//! stash fix against a git repository.

mod common;

use common::TestEnv;
use predicates::prelude::*;
use std::fs;

fn fix_json(env: &TestEnv, args: &[&str]) -> serde_json::Value {
    let output = env.jr().arg("fix").args(args).assert();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    serde_json::from_str(&stdout).expect("JSON output")
}

#[test]
fn test_unknown_cause_fails() {
    let env = TestEnv::new();
    env.jr()
        .args(["fix", "not_a_cause"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown root cause"));
}

#[test]
fn test_manual_only_cause_has_no_command() {
    let env = TestEnv::new();
    let output = env
        .jr()
        .args(["fix", "failing_tests", "--policy", "all"])
        .assert()
        .failure();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    // Manual-only overrides any mode: nothing executes even under `all`.
    assert_eq!(parsed["executed"], false);
    assert_eq!(parsed["success"], false);
    assert!(
        parsed["reason"]
            .as_str()
            .unwrap()
            .contains("no automatic command")
    );
}

#[test]
fn test_policy_none_skips() {
    let env = TestEnv::with_git();
    env.commit_file("a.txt", "hello\n");

    let parsed = fix_json(&env, &["dirty_worktree", "--policy", "none"]);
    assert_eq!(parsed["skipped"], true);
    assert_eq!(parsed["executed"], false);
    assert!(
        parsed["reason"]
            .as_str()
            .unwrap()
            .contains("blocked by policy")
    );
}

#[test]
fn test_dry_run_resolves_derived_command() {
    let env = TestEnv::new();
    let parsed = fix_json(&env, &[
        "missing_dependency",
        "--dry-run",
        "--message",
        "Error: Cannot find module 'lodash'",
    ]);
    assert_eq!(parsed["dry_run"], true);
    assert_eq!(parsed["command"], "npm install lodash");
    assert_eq!(parsed["executed"], false);
}

#[test]
fn test_dry_run_rejects_unsafe_dependency() {
    let env = TestEnv::new();
    let parsed = fix_json(&env, &[
        "missing_dependency",
        "--dry-run",
        "--dependency",
        "lodash; rm -rf /",
    ]);
    assert!(parsed["command"].is_null());
}

#[test]
fn test_stash_fix_cleans_tree() {
    let env = TestEnv::with_git();
    env.commit_file("a.txt", "committed\n");
    fs::write(env.repo_path().join("a.txt"), "modified\n").unwrap();

    // needs-approval under prompt policy; --yes pre-approves.
    let parsed = fix_json(&env, &["dirty_worktree", "--yes"]);
    assert_eq!(parsed["success"], true, "fix output: {}", parsed);
    assert_eq!(parsed["executed"], true);

    let content = fs::read_to_string(env.repo_path().join("a.txt")).unwrap();
    assert_eq!(content, "committed\n");
}

#[test]
fn test_stash_fix_without_approval_channel_skips() {
    let env = TestEnv::with_git();
    env.commit_file("a.txt", "committed\n");
    fs::write(env.repo_path().join("a.txt"), "modified\n").unwrap();

    // stdin is not a TTY in tests, so the approval channel is absent and
    // the needs-approval fix must fail closed.
    let parsed = fix_json(&env, &["dirty_worktree"]);
    assert_eq!(parsed["skipped"], true);
    assert_eq!(parsed["executed"], false);

    let content = fs::read_to_string(env.repo_path().join("a.txt")).unwrap();
    assert_eq!(content, "modified\n");
}

#[test]
fn test_fix_appends_activity_log() {
    let env = TestEnv::with_git();
    env.commit_file("a.txt", "committed\n");

    env.jr()
        .args(["fix", "dirty_worktree", "--policy", "none"])
        .assert()
        .success();

    // One skipped attempt must still be on disk.
    let mut log_content = String::new();
    for entry in fs::read_dir(env.data_path()).unwrap() {
        let log = entry.unwrap().path().join("autofix.log");
        if log.exists() {
            log_content = fs::read_to_string(log).unwrap();
        }
    }
    assert!(log_content.contains("AUTO_FIX type=dirty_worktree"));
    assert!(log_content.contains("status=skipped"));
}

#[test]
fn test_human_output() {
    let env = TestEnv::with_git();
    env.jr()
        .args(["-H", "fix", "dirty_worktree", "--policy", "none"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped"));
}
