//! Signature extraction: raw log text to typed error records.
//!
//! The extractor scans free-form text with an ordered set of regular
//! expressions per error type, deduplicates repeating log lines, and
//! attributes each record with a line number and an optional location hint.
//! `runlog` adds parsers for the two structured inputs produced by the
//! build loop: markdown run summaries and timestamped iteration logs.

pub mod patterns;
pub mod runlog;

pub use runlog::{extract_from_iteration_log, extract_from_run_summary};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Default cap on records produced by a single extraction call.
pub const DEFAULT_MAX_ERRORS: usize = 100;

/// Number of message characters contributing to the dedup key.
const DEDUP_PREFIX_CHARS: usize = 50;

/// Closed taxonomy of error signatures recognized in build-loop output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    TypeError,
    SyntaxError,
    ReferenceError,
    FileNotFound,
    PermissionError,
    TestFailure,
    ShellError,
    MissingDependency,
    GitError,
    TimeoutError,
    NetworkError,
    MemoryError,
    BuildError,
    UncommittedChanges,
    LoopError,
}

impl ErrorType {
    /// All taxonomy members, in scan order.
    pub const ALL: [ErrorType; 15] = [
        ErrorType::TypeError,
        ErrorType::SyntaxError,
        ErrorType::ReferenceError,
        ErrorType::FileNotFound,
        ErrorType::PermissionError,
        ErrorType::TestFailure,
        ErrorType::ShellError,
        ErrorType::MissingDependency,
        ErrorType::GitError,
        ErrorType::TimeoutError,
        ErrorType::NetworkError,
        ErrorType::MemoryError,
        ErrorType::BuildError,
        ErrorType::UncommittedChanges,
        ErrorType::LoopError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::TypeError => "type_error",
            ErrorType::SyntaxError => "syntax_error",
            ErrorType::ReferenceError => "reference_error",
            ErrorType::FileNotFound => "file_not_found",
            ErrorType::PermissionError => "permission_error",
            ErrorType::TestFailure => "test_failure",
            ErrorType::ShellError => "shell_error",
            ErrorType::MissingDependency => "missing_dependency",
            ErrorType::GitError => "git_error",
            ErrorType::TimeoutError => "timeout_error",
            ErrorType::NetworkError => "network_error",
            ErrorType::MemoryError => "memory_error",
            ErrorType::BuildError => "build_error",
            ErrorType::UncommittedChanges => "uncommitted_changes",
            ErrorType::LoopError => "loop_error",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ErrorType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorType::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidInput(format!("unknown error type: '{}'", s)))
    }
}

/// A single extracted error signature. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Taxonomy category this signature matched.
    #[serde(rename = "type")]
    pub kind: ErrorType,

    /// Captured message (group 1 of the signature, or the whole match).
    pub message: String,

    /// Full matched text, kept for display and debugging.
    pub full_match: String,

    /// File/module location hint, when derivable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// 1-based line number of the match within the input text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    /// Where this record came from (a path or a label like "log").
    pub source: String,

    /// Run identifier, when the input carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Build-loop iteration number, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,

    /// Agent that produced the failing run, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// Options for [`extract`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Stop once this many records have been produced.
    pub max_errors: usize,
    /// Source label attached to each record.
    pub source: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_errors: DEFAULT_MAX_ERRORS,
            source: "log".to_string(),
        }
    }
}

/// Extract typed error records from free-form log text.
///
/// For each taxonomy category the ordered signature patterns are applied
/// against the full text. Matches are deduplicated by error type plus the
/// first 50 characters of the message, so a log line repeated thousands of
/// times yields a single record. Extraction stops at `max_errors`.
pub fn extract(text: &str, opts: &ExtractOptions) -> Vec<ErrorRecord> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();

    'scan: for kind in ErrorType::ALL {
        for re in patterns::signatures(kind) {
            for caps in re.captures_iter(text) {
                let whole = caps.get(0).expect("match group 0 always present");
                let message = caps
                    .get(1)
                    .map(|g| g.as_str())
                    .unwrap_or(whole.as_str())
                    .trim()
                    .to_string();
                if message.is_empty() {
                    continue;
                }
                if !seen.insert(dedup_key(kind, &message)) {
                    continue;
                }

                let line = 1 + text[..whole.start()].matches('\n').count();
                records.push(ErrorRecord {
                    kind,
                    message,
                    full_match: whole.as_str().trim().to_string(),
                    location: patterns::location_hint(whole.as_str()),
                    line: Some(line),
                    source: opts.source.clone(),
                    run_id: None,
                    iteration: None,
                    agent: None,
                });

                if records.len() >= opts.max_errors {
                    break 'scan;
                }
            }
        }
    }

    records
}

fn dedup_key(kind: ErrorType, message: &str) -> String {
    let prefix: String = message.chars().take(DEDUP_PREFIX_CHARS).collect();
    format!("{}:{}", kind, prefix)
}
