//! Working-tree state capture for fix attempts.
//!
//! A snapshot pairs per-tracked-file SHA-256 checksums with the tree's
//! porcelain status and diff, taken before and after a fix runs so the
//! executor can report file changes and roll back.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

/// Diff text beyond this size is truncated to bound snapshot memory.
pub const MAX_DIFF_BYTES: usize = 1024 * 1024;

/// Point-in-time capture of working-tree state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub timestamp: DateTime<Utc>,
    /// SHA-256 hex digest per tracked file.
    pub file_checksums: BTreeMap<String, String>,
    /// `git diff` output, truncated at [`MAX_DIFF_BYTES`].
    pub git_diff: String,
    /// `git status --porcelain` output.
    pub git_status: String,
    /// Paths with local modifications, parsed from the status.
    pub modified_files: Vec<String>,
}

impl StateSnapshot {
    /// Capture the current state of the repository's working tree.
    pub fn capture(repo_path: &Path) -> Result<Self> {
        let tracked = git(repo_path, &["ls-files"])?;

        let mut file_checksums = BTreeMap::new();
        for file in tracked.lines().filter(|l| !l.is_empty()) {
            // Files can vanish between ls-files and the read; skip them.
            if let Ok(bytes) = std::fs::read(repo_path.join(file)) {
                let mut hasher = Sha256::new();
                hasher.update(&bytes);
                file_checksums.insert(file.to_string(), format!("{:x}", hasher.finalize()));
            }
        }

        let git_status = git(repo_path, &["status", "--porcelain"])?;
        let git_diff = truncate_to_boundary(git(repo_path, &["diff"])?, MAX_DIFF_BYTES);
        let modified_files = modified_from_status(&git_status);

        Ok(Self {
            timestamp: Utc::now(),
            file_checksums,
            git_diff,
            git_status,
            modified_files,
        })
    }
}

/// File-level change counts between two snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChanges {
    pub added: usize,
    pub changed: usize,
    pub deleted: usize,
}

impl FileChanges {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.changed == 0 && self.deleted == 0
    }
}

/// Diff two snapshots' checksum maps into added/changed/deleted counts.
pub fn diff_snapshots(before: &StateSnapshot, after: &StateSnapshot) -> FileChanges {
    let mut changes = FileChanges::default();

    for (path, checksum) in &after.file_checksums {
        match before.file_checksums.get(path) {
            None => changes.added += 1,
            Some(old) if old != checksum => changes.changed += 1,
            Some(_) => {}
        }
    }
    for path in before.file_checksums.keys() {
        if !after.file_checksums.contains_key(path) {
            changes.deleted += 1;
        }
    }

    changes
}

/// Paths with local modifications from `git status --porcelain` output.
///
/// Renames (`R  old -> new`) report the new path.
fn modified_from_status(status: &str) -> Vec<String> {
    status
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let path = line[3..].trim();
            match path.split_once(" -> ") {
                Some((_, renamed)) => renamed.trim().to_string(),
                None => path.to_string(),
            }
        })
        .filter(|path| !path.is_empty())
        .collect()
}

/// Run a git subcommand in the repository, returning stdout.
pub(crate) fn git(repo_path: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .map_err(|e| Error::CommandFailed(format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::CommandFailed(format!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Truncate a string to at most `max` bytes without splitting a char.
fn truncate_to_boundary(mut text: String, max: usize) -> String {
    if text.len() <= max {
        return text;
    }
    let mut cut = max;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn init_repo() -> TempDir {
        let temp = TempDir::new().unwrap();
        for args in [
            vec!["init"],
            vec!["config", "user.email", "test@test.com"],
            vec!["config", "user.name", "Test"],
        ] {
            Command::new("git")
                .args(&args)
                .current_dir(temp.path())
                .output()
                .expect("failed to run git");
        }
        temp
    }

    fn commit_file(repo: &Path, name: &str, content: &str) {
        fs::write(repo.join(name), content).unwrap();
        Command::new("git")
            .args(["add", name])
            .current_dir(repo)
            .output()
            .unwrap();
        Command::new("git")
            .args(["commit", "-m", "add file"])
            .current_dir(repo)
            .output()
            .unwrap();
    }

    #[test]
    fn test_capture_clean_repo() {
        let repo = init_repo();
        commit_file(repo.path(), "a.txt", "hello\n");

        let snap = StateSnapshot::capture(repo.path()).unwrap();
        assert_eq!(snap.file_checksums.len(), 1);
        assert!(snap.file_checksums.contains_key("a.txt"));
        assert!(snap.modified_files.is_empty());
        assert!(snap.git_diff.is_empty());
    }

    #[test]
    fn test_capture_sees_modifications() {
        let repo = init_repo();
        commit_file(repo.path(), "a.txt", "hello\n");
        fs::write(repo.path().join("a.txt"), "changed\n").unwrap();

        let snap = StateSnapshot::capture(repo.path()).unwrap();
        assert_eq!(snap.modified_files, vec!["a.txt".to_string()]);
        assert!(snap.git_diff.contains("changed"));
    }

    #[test]
    fn test_diff_snapshots_counts() {
        let repo = init_repo();
        commit_file(repo.path(), "a.txt", "one\n");
        commit_file(repo.path(), "b.txt", "two\n");
        let before = StateSnapshot::capture(repo.path()).unwrap();

        fs::write(repo.path().join("a.txt"), "edited\n").unwrap();
        commit_file(repo.path(), "c.txt", "three\n");
        let after = StateSnapshot::capture(repo.path()).unwrap();

        let changes = diff_snapshots(&before, &after);
        assert_eq!(changes.added, 1);
        assert_eq!(changes.changed, 1);
        assert_eq!(changes.deleted, 0);
    }

    #[test]
    fn test_modified_from_status_rename() {
        let status = "R  old.txt -> new.txt\n M plain.txt\n?? untracked.txt\n";
        let modified = modified_from_status(status);
        assert_eq!(modified, vec!["new.txt", "plain.txt", "untracked.txt"]);
    }

    #[test]
    fn test_truncate_to_boundary() {
        let text = "héllo".to_string();
        // 'é' is two bytes; cutting mid-char backs off to the boundary.
        let cut = truncate_to_boundary(text, 2);
        assert_eq!(cut, "h");
    }

    #[test]
    fn test_capture_outside_repo_fails() {
        let temp = TempDir::new().unwrap();
        assert!(StateSnapshot::capture(temp.path()).is_err());
    }
}
