//! Data-directory resolution and repository detection.
//!
//! Durable artifacts live under a per-repository directory keyed by a hash
//! of the repo's canonical path:
//! `~/.local/share/juryrig/<repo-hash>/` (override with `JR_DATA_DIR`).
//! The only durable artifact is the append-only activity log.

use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable overriding the data root, used by tests to keep
/// each invocation isolated.
pub const DATA_DIR_ENV: &str = "JR_DATA_DIR";

/// File name of the append-only fix activity log.
pub const ACTIVITY_LOG_FILE: &str = "autofix.log";

/// Root of all juryrig data directories.
pub fn data_root() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let data_dir = dirs::data_dir()
        .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?;
    Ok(data_dir.join("juryrig"))
}

/// Per-repository data directory, keyed by a hash of the canonical path.
pub fn repo_data_dir(repo_path: &Path) -> Result<PathBuf> {
    let canonical = repo_path
        .canonicalize()
        .map_err(|e| Error::Other(format!("Could not canonicalize repo path: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Ok(data_root()?.join(&hash[..12]))
}

/// Path of the activity log for a repository.
pub fn activity_log_path(repo_path: &Path) -> Result<PathBuf> {
    Ok(repo_data_dir(repo_path)?.join(ACTIVITY_LOG_FILE))
}

/// Find the git worktree root containing `start`, if any.
pub fn find_git_root(start: &Path) -> Option<PathBuf> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(start)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if root.is_empty() {
        None
    } else {
        Some(PathBuf::from(root))
    }
}
