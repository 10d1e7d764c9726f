//! Parsers for the structured inputs produced by the build loop.
//!
//! Two formats feed the extractor beyond free-form text:
//! - markdown run summaries (`- Run ID:`, `- Status:`, a
//!   `### Uncommitted Changes` section listing dirty paths)
//! - timestamped iteration logs (`[timestamp] message` per line)
//!
//! Both produce the same [`ErrorRecord`] shape with `run_id`, `iteration`,
//! and `agent` populated when derivable.

use super::{extract, DEFAULT_MAX_ERRORS, ErrorRecord, ErrorType, ExtractOptions};
use regex::Regex;
use std::sync::LazyLock;

/// Agent command substrings recognized during heuristic agent detection.
const KNOWN_AGENTS: &[&str] = &[
    "claude", "codex", "aider", "copilot", "cursor", "gemini", "goose",
];

static PORCELAIN_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s?[MADRCU?!]{1,2}\s+(.+)$").expect("invalid pattern"));

static TIMESTAMP_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[[^\]]*\]\s?").expect("invalid pattern"));

/// Extract error records from a markdown run summary.
///
/// A failed or timed-out `Status:` yields one record, each path under
/// `Uncommitted Changes` yields an `uncommitted_changes` record, and the
/// whole body is additionally run through the generic extractor. All
/// records are stamped with the summary's run id, iteration, and agent.
pub fn extract_from_run_summary(text: &str, source: &str) -> Vec<ErrorRecord> {
    let run_id = field(text, "Run ID");
    let iteration = field(text, "Iteration").and_then(|s| s.parse().ok());
    let agent = field(text, "Agent")
        .or_else(|| field(text, "Command").and_then(|c| agent_from_command(&c)));

    let mut records = Vec::new();
    let mut status_line = None;

    if let Some(status) = field(text, "Status") {
        let lower = status.to_lowercase();
        let kind = if lower.contains("timeout") || lower.contains("timed out") {
            Some(ErrorType::TimeoutError)
        } else if lower.contains("fail") || lower.contains("error") {
            Some(ErrorType::BuildError)
        } else {
            None
        };
        if let Some(kind) = kind {
            status_line = Some(format!("- Status: {}", status));
            records.push(ErrorRecord {
                kind,
                message: format!("run ended with status {}", status),
                full_match: format!("Status: {}", status),
                location: None,
                line: None,
                source: source.to_string(),
                run_id: None,
                iteration: None,
                agent: None,
            });
        }
    }

    for path in uncommitted_paths(text) {
        records.push(ErrorRecord {
            kind: ErrorType::UncommittedChanges,
            message: format!("uncommitted changes in {}", path),
            full_match: path.clone(),
            location: Some(path.clone()),
            line: None,
            source: path,
            run_id: None,
            iteration: None,
            agent: None,
        });
    }

    let opts = ExtractOptions {
        source: source.to_string(),
        ..Default::default()
    };
    let mut general = extract(text, &opts);
    // The structured parse above is authoritative for the status field and
    // the dirty-file section; generic matches on those same lines would
    // double-count them.
    general.retain(|record| {
        record.kind != ErrorType::UncommittedChanges
            && status_line.as_deref() != Some(record.full_match.as_str())
    });
    records.extend(general);

    for record in &mut records {
        record.run_id = run_id.clone();
        record.iteration = iteration;
        record.agent = agent.clone();
    }

    records
}

/// Options for [`extract_from_iteration_log`].
#[derive(Debug, Clone)]
pub struct IterationLogOptions {
    pub run_id: Option<String>,
    pub iteration: Option<u32>,
    pub agent: Option<String>,
    pub source: String,
    pub max_errors: usize,
}

impl Default for IterationLogOptions {
    fn default() -> Self {
        Self {
            run_id: None,
            iteration: None,
            agent: None,
            source: "iteration-log".to_string(),
            max_errors: DEFAULT_MAX_ERRORS,
        }
    }
}

/// Extract error records from a line-oriented `[timestamp] message` log.
///
/// Timestamp brackets are stripped before signature matching so they don't
/// defeat the patterns; line structure is preserved so reported line
/// numbers refer to the original file.
pub fn extract_from_iteration_log(text: &str, opts: &IterationLogOptions) -> Vec<ErrorRecord> {
    let cleaned: String = text
        .lines()
        .map(|line| TIMESTAMP_PREFIX.replace(line, ""))
        .collect::<Vec<_>>()
        .join("\n");

    let extract_opts = ExtractOptions {
        source: opts.source.clone(),
        max_errors: opts.max_errors,
    };
    let mut records = extract(&cleaned, &extract_opts);

    for record in &mut records {
        record.run_id = opts.run_id.clone();
        record.iteration = opts.iteration;
        record.agent = opts.agent.clone();
    }

    records
}

/// Read a `- Name: value` field from summary markdown.
fn field(text: &str, name: &str) -> Option<String> {
    let prefix = format!("- {}: ", name);
    text.lines()
        .find_map(|line| line.trim().strip_prefix(&prefix))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Paths listed under the `Uncommitted Changes` heading.
///
/// Entries are either `- path` bullets or `git status --porcelain` lines;
/// `- (clean)` and `- (none)` placeholders are ignored.
fn uncommitted_paths(text: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut in_section = false;

    for line in text.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim_start().starts_with('#') {
            in_section = trimmed.trim_start().trim_start_matches('#').trim() == "Uncommitted Changes";
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some(entry) = trimmed.trim_start().strip_prefix("- ") {
            let entry = entry.trim();
            if entry != "(clean)" && entry != "(none)" && !entry.is_empty() {
                paths.push(entry.to_string());
            }
        } else if let Some(caps) = PORCELAIN_LINE.captures(trimmed) {
            paths.push(caps[1].trim().to_string());
        }
    }

    paths
}

/// Guess the agent name from a launch command line.
fn agent_from_command(command: &str) -> Option<String> {
    let lower = command.to_lowercase();
    KNOWN_AGENTS
        .iter()
        .find(|name| lower.contains(*name))
        .map(|name| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY: &str = "\
# Ralph Run Summary

- Run ID: 20260201-091500
- Iteration: 4
- Status: failed
- Command: claude -p prompt.md

## Git
- Head (before): abc1234
- Head (after): abc1234

### Uncommitted Changes
 M src/index.js
 M src/util.js
?? notes.txt

## Token Usage
- Input tokens: 1000
";

    #[test]
    fn test_run_summary_metadata() {
        let records = extract_from_run_summary(SUMMARY, "summary.md");
        assert!(!records.is_empty());
        for record in &records {
            assert_eq!(record.run_id.as_deref(), Some("20260201-091500"));
            assert_eq!(record.iteration, Some(4));
            assert_eq!(record.agent.as_deref(), Some("claude"));
        }
    }

    #[test]
    fn test_run_summary_dirty_paths() {
        let records = extract_from_run_summary(SUMMARY, "summary.md");
        let dirty: Vec<_> = records
            .iter()
            .filter(|r| r.kind == ErrorType::UncommittedChanges)
            .collect();
        assert_eq!(dirty.len(), 3);
        assert!(dirty.iter().any(|r| r.source == "src/index.js"));
        assert!(dirty.iter().any(|r| r.source == "notes.txt"));
    }

    #[test]
    fn test_run_summary_failed_status() {
        let records = extract_from_run_summary(SUMMARY, "summary.md");
        assert!(
            records
                .iter()
                .any(|r| r.kind == ErrorType::BuildError && r.message.contains("failed"))
        );
    }

    #[test]
    fn test_run_summary_clean_tree() {
        let summary = "\
- Run ID: r1
- Status: success

### Uncommitted Changes
- (clean)
";
        let records = extract_from_run_summary(summary, "summary.md");
        assert!(
            !records
                .iter()
                .any(|r| r.kind == ErrorType::UncommittedChanges)
        );
    }

    #[test]
    fn test_timeout_status_not_double_counted() {
        let summary = "- Run ID: r2\n- Status: timeout\n";
        let records = extract_from_run_summary(summary, "s");
        let timeouts: Vec<_> = records
            .iter()
            .filter(|r| r.kind == ErrorType::TimeoutError)
            .collect();
        assert_eq!(timeouts.len(), 1);
        assert!(timeouts[0].message.contains("run ended with status"));
    }

    #[test]
    fn test_explicit_agent_field_wins() {
        let summary = "- Agent: codex\n- Command: claude -p x\n- Status: failed\n";
        let records = extract_from_run_summary(summary, "s");
        assert_eq!(records[0].agent.as_deref(), Some("codex"));
    }

    #[test]
    fn test_iteration_log_strips_timestamps() {
        let log = "\
[2026-02-01T09:15:00Z] starting iteration
[2026-02-01T09:15:07Z] Error: Cannot find module 'left-pad'
[2026-02-01T09:15:08Z] exiting
";
        let opts = IterationLogOptions {
            run_id: Some("r7".to_string()),
            iteration: Some(2),
            ..Default::default()
        };
        let records = extract_from_iteration_log(log, &opts);
        let dep = records
            .iter()
            .find(|r| r.kind == ErrorType::MissingDependency)
            .unwrap();
        assert!(dep.message.contains("left-pad"));
        assert_eq!(dep.line, Some(2));
        assert_eq!(dep.run_id.as_deref(), Some("r7"));
        assert_eq!(dep.iteration, Some(2));
    }
}
