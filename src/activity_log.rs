//! Durable activity logging for fix attempts.
//!
//! Every fix attempt - regardless of outcome - appends one line to an
//! append-only log in a fixed, machine-parseable format:
//!
//! ```text
//! [<RFC3339 UTC>] AUTO_FIX type=<id> command="<cmd>" status=<status> duration=<ms>ms [error="<msg>"]
//! ```
//!
//! The format is stable: a standalone reporter must be able to reconstruct
//! summaries from the file alone, with no access to the in-memory session.
//! Appends never fail - log I/O problems degrade to a warning so they
//! cannot abort an in-progress fix.

use crate::Result;
use crate::fixes::FixRecord;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

static LOG_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\[([^\]]+)\] AUTO_FIX type=(\S+) command="((?:[^"\\]|\\.)*)" status=(\S+) duration=(\d+)ms(?: error="((?:[^"\\]|\\.)*)")?$"#,
    )
    .expect("invalid pattern")
});

/// One parsed activity-log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub fix_type: String,
    pub command: String,
    pub status: String,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Render a fix record as one activity-log line (no trailing newline).
pub fn format_line(record: &FixRecord) -> String {
    let mut line = format!(
        "[{}] AUTO_FIX type={} command=\"{}\" status={} duration={}ms",
        record.finished_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        record.fix_type,
        escape(&record.command),
        record.status,
        record.duration_ms
    );
    if let Some(error) = &record.error {
        line.push_str(&format!(" error=\"{}\"", escape(error)));
    }
    line
}

/// Append a fix record to the log at `path`.
///
/// Never fails: on any error a warning is printed and the fix proceeds.
pub fn append(path: &Path, record: &FixRecord) {
    if let Err(e) = try_append(path, record) {
        eprintln!("Warning: failed to write activity log: {}", e);
    }
}

fn try_append(path: &Path, record: &FixRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", format_line(record))?;
    Ok(())
}

/// Parse one activity-log line. Returns `None` for lines that don't match
/// the format (a reporter skips them rather than failing).
pub fn parse_line(line: &str) -> Option<ActivityEntry> {
    let caps = LOG_LINE.captures(line.trim_end())?;
    let timestamp = DateTime::parse_from_rfc3339(&caps[1])
        .ok()?
        .with_timezone(&Utc);

    Some(ActivityEntry {
        timestamp,
        fix_type: caps[2].to_string(),
        command: unescape(&caps[3]),
        status: caps[4].to_string(),
        duration_ms: caps[5].parse().ok()?,
        error: caps.get(6).map(|m| unescape(m.as_str())),
    })
}

/// Read and parse every well-formed line of a log file. A missing file is
/// an empty log.
pub fn read_log(path: &Path) -> Result<Vec<ActivityEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(content.lines().filter_map(parse_line).collect())
}

/// Aggregate counts reconstructed from log entries alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration_ms: u64,
    pub by_type: BTreeMap<String, usize>,
}

/// Summarize parsed log entries.
pub fn summarize(entries: &[ActivityEntry]) -> LogSummary {
    let mut summary = LogSummary::default();
    for entry in entries {
        summary.total += 1;
        summary.total_duration_ms += entry.duration_ms;
        match entry.status.as_str() {
            "success" => summary.succeeded += 1,
            "skipped" => summary.skipped += 1,
            _ => summary.failed += 1,
        }
        *summary.by_type.entry(entry.fix_type.clone()).or_insert(0) += 1;
    }
    summary
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => result.push(next),
                None => result.push(c),
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RootCause;
    use crate::fixes::FixStatus;
    use tempfile::TempDir;

    fn record(status: FixStatus, error: Option<&str>) -> FixRecord {
        let now = Utc::now();
        FixRecord {
            id: "fix-1".to_string(),
            fix_type: RootCause::MissingDependency,
            command: "npm install lodash".to_string(),
            before: None,
            after: None,
            started_at: now,
            finished_at: now,
            duration_ms: 1234,
            status,
            error: error.map(|s| s.to_string()),
            output: None,
            verified: None,
            rolled_back: None,
        }
    }

    #[test]
    fn test_format_line_shape() {
        let line = format_line(&record(FixStatus::Success, None));
        assert!(line.contains("AUTO_FIX type=missing_dependency"));
        assert!(line.contains("command=\"npm install lodash\""));
        assert!(line.contains("status=success"));
        assert!(line.contains("duration=1234ms"));
        assert!(!line.contains("error="));
    }

    #[test]
    fn test_round_trip() {
        let rec = record(FixStatus::Failure, Some("exit status 1"));
        let entry = parse_line(&format_line(&rec)).unwrap();
        assert_eq!(entry.fix_type, "missing_dependency");
        assert_eq!(entry.command, "npm install lodash");
        assert_eq!(entry.status, "failure");
        assert_eq!(entry.duration_ms, 1234);
        assert_eq!(entry.error.as_deref(), Some("exit status 1"));
    }

    #[test]
    fn test_round_trip_with_quotes() {
        let mut rec = record(FixStatus::Failure, Some(r#"unexpected token "}" in config"#));
        rec.command = r#"echo "hello""#.to_string();
        let entry = parse_line(&format_line(&rec)).unwrap();
        assert_eq!(entry.command, r#"echo "hello""#);
        assert_eq!(
            entry.error.as_deref(),
            Some(r#"unexpected token "}" in config"#)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_line("not a log line").is_none());
        assert!(parse_line("[ts] AUTO_FIX type=x").is_none());
        assert!(parse_line("").is_none());
    }

    #[test]
    fn test_append_and_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/autofix.log");

        append(&path, &record(FixStatus::Success, None));
        append(&path, &record(FixStatus::Skipped, None));
        append(&path, &record(FixStatus::Failure, Some("boom")));

        let entries = read_log(&path).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].status, "success");
        assert_eq!(entries[1].status, "skipped");
        assert_eq!(entries[2].error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let entries = read_log(&temp.path().join("absent.log")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_summarize() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("autofix.log");
        append(&path, &record(FixStatus::Success, None));
        append(&path, &record(FixStatus::Success, None));
        append(&path, &record(FixStatus::Failure, Some("x")));
        append(&path, &record(FixStatus::Skipped, None));

        let summary = summarize(&read_log(&path).unwrap());
        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.by_type["missing_dependency"], 4);
        assert_eq!(summary.total_duration_ms, 4 * 1234);
    }
}
