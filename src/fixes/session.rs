//! Fix records, sessions, and their report formatters.

use super::snapshot::{StateSnapshot, diff_snapshots};
use crate::classify::RootCause;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Terminal status of one fix attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStatus {
    Success,
    Failure,
    Skipped,
}

impl FixStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixStatus::Success => "success",
            FixStatus::Failure => "failure",
            FixStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for FixStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable record of one fix attempt. Append-only once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixRecord {
    pub id: String,
    pub fix_type: RootCause,
    /// The resolved command, space-joined for display; empty when no
    /// command was ever resolved.
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<StateSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<StateSnapshot>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: FixStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Outcome of the verify step: `None` when no verification ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    /// Whether a rollback ran and succeeded. `None` when never attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolled_back: Option<bool>,
}

/// Ordered fix attempts for one reporting session. Process-local.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub records: Vec<FixRecord>,
}

impl FixSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: FixRecord) {
        self.records.push(record);
    }

    /// Aggregate counts for the session.
    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary {
            session_id: self.id.clone(),
            attempted: self.records.len(),
            succeeded: 0,
            failed: 0,
            skipped: 0,
            by_type: BTreeMap::new(),
        };

        for record in &self.records {
            let type_counts = summary
                .by_type
                .entry(record.fix_type.to_string())
                .or_default();
            type_counts.attempted += 1;
            match record.status {
                FixStatus::Success => {
                    summary.succeeded += 1;
                    type_counts.succeeded += 1;
                }
                FixStatus::Failure => {
                    summary.failed += 1;
                    type_counts.failed += 1;
                }
                FixStatus::Skipped => {
                    summary.skipped += 1;
                    type_counts.skipped += 1;
                }
            }
        }

        summary
    }

    /// Percentage of non-skipped attempts that succeeded (and did not fail
    /// verification). 0 for an empty or all-skipped session.
    pub fn success_rate(&self) -> f64 {
        let considered: Vec<&FixRecord> = self
            .records
            .iter()
            .filter(|r| r.status != FixStatus::Skipped)
            .collect();
        if considered.is_empty() {
            return 0.0;
        }
        let succeeded = considered
            .iter()
            .filter(|r| r.status == FixStatus::Success && r.verified != Some(false))
            .count();
        succeeded as f64 / considered.len() as f64 * 100.0
    }

    /// Compact commit-message fragment for the session's successful fixes,
    /// e.g. `Auto-fixed: Missing dependency, Uncommitted changes (2)`.
    /// `None` when nothing succeeded.
    pub fn commit_message(&self) -> Option<String> {
        let mut order: Vec<&'static str> = Vec::new();
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();

        for record in &self.records {
            if record.status != FixStatus::Success {
                continue;
            }
            let label = record.fix_type.profile().label;
            if !counts.contains_key(label) {
                order.push(label);
            }
            *counts.entry(label).or_insert(0) += 1;
        }

        if order.is_empty() {
            return None;
        }

        let parts: Vec<String> = order
            .iter()
            .map(|label| {
                let count = counts[label];
                if count > 1 {
                    format!("{} ({})", label, count)
                } else {
                    (*label).to_string()
                }
            })
            .collect();

        Some(format!("Auto-fixed: {}", parts.join(", ")))
    }

    /// Multi-line stats block, one entry per record with its file-change
    /// summary derived from the before/after snapshots.
    pub fn stats(&self) -> String {
        let summary = self.summary();
        let mut lines = vec![format!(
            "Session {}: {} attempted, {} succeeded, {} failed, {} skipped",
            self.id, summary.attempted, summary.succeeded, summary.failed, summary.skipped
        )];

        for record in &self.records {
            let mut line = format!(
                "  [{}] {}: {} ({}ms)",
                record.status,
                record.fix_type,
                if record.command.is_empty() {
                    "(no command)"
                } else {
                    &record.command
                },
                record.duration_ms
            );
            if let (Some(before), Some(after)) = (&record.before, &record.after) {
                let changes = diff_snapshots(before, after);
                if !changes.is_empty() {
                    line.push_str(&format!(
                        " files +{} ~{} -{}",
                        changes.added, changes.changed, changes.deleted
                    ));
                }
            }
            if let Some(error) = &record.error {
                line.push_str(&format!(" error: {}", error));
            }
            lines.push(line);
        }

        lines.join("\n")
    }
}

impl Default for FixSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregated counts for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub by_type: BTreeMap<String, TypeCounts>,
}

/// Per-fix-type slice of a session summary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TypeCounts {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fix_type: RootCause, status: FixStatus) -> FixRecord {
        let now = Utc::now();
        FixRecord {
            id: Uuid::new_v4().to_string(),
            fix_type,
            command: "true".to_string(),
            before: None,
            after: None,
            started_at: now,
            finished_at: now,
            duration_ms: 5,
            status,
            error: None,
            output: None,
            verified: None,
            rolled_back: None,
        }
    }

    #[test]
    fn test_summary_counts() {
        let mut session = FixSession::new();
        session.push(record(RootCause::MissingDependency, FixStatus::Success));
        session.push(record(RootCause::MissingDependency, FixStatus::Failure));
        session.push(record(RootCause::DirtyWorktree, FixStatus::Skipped));

        let summary = session.summary();
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.by_type["missing_dependency"].attempted, 2);
        assert_eq!(summary.by_type["dirty_worktree"].skipped, 1);
    }

    #[test]
    fn test_success_rate_empty_session() {
        let session = FixSession::new();
        assert_eq!(session.success_rate(), 0.0);
    }

    #[test]
    fn test_success_rate_all_non_skipped_succeeded() {
        let mut session = FixSession::new();
        session.push(record(RootCause::MissingDependency, FixStatus::Success));
        session.push(record(RootCause::DirtyWorktree, FixStatus::Skipped));
        assert_eq!(session.success_rate(), 100.0);
    }

    #[test]
    fn test_success_rate_counts_failed_verification() {
        let mut session = FixSession::new();
        let mut rec = record(RootCause::MissingDependency, FixStatus::Success);
        rec.verified = Some(true);
        session.push(rec);
        let mut rec = record(RootCause::DirtyWorktree, FixStatus::Failure);
        rec.verified = Some(false);
        session.push(rec);
        assert_eq!(session.success_rate(), 50.0);
    }

    #[test]
    fn test_commit_message_format() {
        let mut session = FixSession::new();
        session.push(record(RootCause::MissingDependency, FixStatus::Success));
        session.push(record(RootCause::MissingDependency, FixStatus::Success));
        session.push(record(RootCause::DirtyWorktree, FixStatus::Success));
        session.push(record(RootCause::GitConflict, FixStatus::Failure));

        assert_eq!(
            session.commit_message().unwrap(),
            "Auto-fixed: Missing dependency (2), Uncommitted changes"
        );
    }

    #[test]
    fn test_commit_message_none_without_successes() {
        let mut session = FixSession::new();
        session.push(record(RootCause::GitConflict, FixStatus::Failure));
        assert!(session.commit_message().is_none());
    }

    #[test]
    fn test_stats_mentions_each_record() {
        let mut session = FixSession::new();
        let mut rec = record(RootCause::MissingDependency, FixStatus::Failure);
        rec.error = Some("exit status 1".to_string());
        session.push(rec);

        let stats = session.stats();
        assert!(stats.contains("missing_dependency"));
        assert!(stats.contains("exit status 1"));
        assert!(stats.contains("1 failed"));
    }
}
