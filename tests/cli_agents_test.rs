//! Integration tests for `jr agents`: per-agent weaknesses and ranking.

mod common;

use common::TestEnv;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;

fn write_summary(
    env: &TestEnv,
    name: &str,
    run_id: &str,
    agent: &str,
    status: &str,
    body: &str,
) -> PathBuf {
    let path = env.repo_path().join(name);
    fs::write(
        &path,
        format!(
            "# Ralph Run Summary\n\n- Run ID: {}\n- Agent: {}\n- Status: {}\n\n{}\n",
            run_id, agent, status, body
        ),
    )
    .unwrap();
    path
}

#[test]
fn test_agents_ranks_by_failures() {
    let env = TestEnv::new();
    let one = write_summary(
        &env,
        "r1.md",
        "r1",
        "claude",
        "failed",
        "FAIL: login flow\nFAIL: signup flow",
    );
    let two = write_summary(&env, "r2.md", "r2", "codex", "success", "");

    let output = env
        .jr()
        .args([
            "agents",
            one.to_str().unwrap(),
            two.to_str().unwrap(),
            "--agent",
            "claude",
            "--agent",
            "codex",
        ])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    assert_eq!(parsed["recommendation"]["best_agent"], "codex");
    let ranking = parsed["recommendation"]["ranking"].as_array().unwrap();
    assert_eq!(ranking[0]["agent"], "codex");
    assert_eq!(ranking[0]["score"], 100);
    assert!(parsed["weaknesses"]["claude"]["total_failures"].as_u64().unwrap() >= 2);
}

#[test]
fn test_agents_requires_files() {
    let env = TestEnv::new();
    env.jr()
        .arg("agents")
        .assert()
        .failure()
        .stderr(predicate::str::contains("run-summary"));
}

#[test]
fn test_agents_human_output() {
    let env = TestEnv::new();
    let one = write_summary(&env, "r1.md", "r1", "claude", "failed", "FAIL: login flow");
    env.jr()
        .args(["-H", "agents", one.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("claude"));
}
