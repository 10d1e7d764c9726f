//! Common test utilities for juryrig integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/juryrig/` directory.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::Path;
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// Each `TestEnv` creates two temporary directories:
/// - `repo_dir`: Acts as the repository under repair
/// - `data_dir`: Holds juryrig's data (via `JR_DATA_DIR` env var)
///
/// The `jr()` method returns a `Command` that sets `JR_DATA_DIR`
/// per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub repo_dir: TempDir,
    pub data_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            repo_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment whose repo dir is a git repository
    /// with an identity configured for commits.
    pub fn with_git() -> Self {
        let env = Self::new();
        for args in [
            vec!["init"],
            vec!["config", "user.email", "test@test.com"],
            vec!["config", "user.name", "Test"],
        ] {
            env.git(&args);
        }
        env
    }

    /// Get a Command for the jr binary with isolated data directory.
    pub fn jr(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_jr"));
        cmd.current_dir(self.repo_dir.path());
        cmd.env("JR_DATA_DIR", self.data_dir.path());
        cmd
    }

    /// Run a git command inside the repo dir.
    pub fn git(&self, args: &[&str]) {
        std::process::Command::new("git")
            .args(args)
            .current_dir(self.repo_dir.path())
            .output()
            .expect("failed to run git");
    }

    /// Write a file in the repo and commit it.
    pub fn commit_file(&self, name: &str, content: &str) {
        std::fs::write(self.repo_path().join(name), content).unwrap();
        self.git(&["add", name]);
        self.git(&["commit", "-m", "add file"]);
    }

    /// Get the path to the repo directory.
    pub fn repo_path(&self) -> &Path {
        self.repo_dir.path()
    }

    /// Get the path to the data directory.
    pub fn data_path(&self) -> &Path {
        self.data_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
