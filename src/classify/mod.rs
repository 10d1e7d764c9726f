//! Root-cause classification of error clusters.
//!
//! A closed taxonomy maps every error type to a root cause carrying a
//! label, description, severity, and remediation guidance. Classification
//! is total over the error taxonomy; [`RootCause::Unknown`] covers
//! anything arriving from outside it (e.g. a cause name typed at the CLI).

pub mod agents;

pub use agents::{
    AgentRecommendation, AgentScore, AgentWeakness, AgentWeaknessMap, agent_recommendation,
    agent_weaknesses,
};

use crate::cluster::ErrorCluster;
use crate::extract::ErrorType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Severity levels, most severe first. The derived ordering is the sort
/// rank used for prioritizing suggestions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed root-cause taxonomy. Every error type maps to exactly one cause;
/// the compiler enforces coverage when a variant is added.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RootCause {
    MissingDependency,
    TypeMismatch,
    SyntaxIssue,
    UndefinedReference,
    MissingFile,
    PermissionDenied,
    FailingTests,
    ShellMisuse,
    GitConflict,
    Timeout,
    NetworkDown,
    MemoryExhaustion,
    BuildBreakage,
    DirtyWorktree,
    LoopStall,
    Unknown,
}

/// Static classification row for a root cause.
#[derive(Debug, Clone, Copy)]
pub struct RootCauseProfile {
    pub label: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub remediation: &'static [&'static str],
    pub related: &'static [ErrorType],
}

impl RootCause {
    pub const ALL: [RootCause; 16] = [
        RootCause::MissingDependency,
        RootCause::TypeMismatch,
        RootCause::SyntaxIssue,
        RootCause::UndefinedReference,
        RootCause::MissingFile,
        RootCause::PermissionDenied,
        RootCause::FailingTests,
        RootCause::ShellMisuse,
        RootCause::GitConflict,
        RootCause::Timeout,
        RootCause::NetworkDown,
        RootCause::MemoryExhaustion,
        RootCause::BuildBreakage,
        RootCause::DirtyWorktree,
        RootCause::LoopStall,
        RootCause::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RootCause::MissingDependency => "missing_dependency",
            RootCause::TypeMismatch => "type_mismatch",
            RootCause::SyntaxIssue => "syntax_issue",
            RootCause::UndefinedReference => "undefined_reference",
            RootCause::MissingFile => "missing_file",
            RootCause::PermissionDenied => "permission_denied",
            RootCause::FailingTests => "failing_tests",
            RootCause::ShellMisuse => "shell_misuse",
            RootCause::GitConflict => "git_conflict",
            RootCause::Timeout => "timeout",
            RootCause::NetworkDown => "network_down",
            RootCause::MemoryExhaustion => "memory_exhaustion",
            RootCause::BuildBreakage => "build_breakage",
            RootCause::DirtyWorktree => "dirty_worktree",
            RootCause::LoopStall => "loop_stall",
            RootCause::Unknown => "unknown",
        }
    }

    /// Classification row for this cause.
    pub fn profile(&self) -> RootCauseProfile {
        match self {
            RootCause::MissingDependency => RootCauseProfile {
                label: "Missing dependency",
                description: "A required package or module is not installed in the project.",
                severity: Severity::High,
                remediation: &[
                    "Install the missing package with the project's package manager",
                    "Check the import path for typos",
                    "Verify the dependency is declared in the manifest",
                ],
                related: &[ErrorType::MissingDependency],
            },
            RootCause::TypeMismatch => RootCauseProfile {
                label: "Type mismatch",
                description: "A value's type does not match what the code expects.",
                severity: Severity::Medium,
                remediation: &[
                    "Review the failing expression and its declared types",
                    "Add null/undefined guards where values may be absent",
                ],
                related: &[ErrorType::TypeError],
            },
            RootCause::SyntaxIssue => RootCauseProfile {
                label: "Syntax error",
                description: "The source fails to parse.",
                severity: Severity::High,
                remediation: &[
                    "Inspect the reported location for unbalanced brackets or quotes",
                    "Run the project's formatter to surface the parse failure",
                ],
                related: &[ErrorType::SyntaxError],
            },
            RootCause::UndefinedReference => RootCauseProfile {
                label: "Undefined reference",
                description: "Code references a name that is not in scope.",
                severity: Severity::Medium,
                remediation: &[
                    "Check the identifier for typos",
                    "Verify the symbol is imported or declared before use",
                ],
                related: &[ErrorType::ReferenceError],
            },
            RootCause::MissingFile => RootCauseProfile {
                label: "Missing file",
                description: "A file or directory the build expects does not exist.",
                severity: Severity::High,
                remediation: &[
                    "Verify the path and working directory",
                    "Check whether a generated file was cleaned but not rebuilt",
                ],
                related: &[ErrorType::FileNotFound],
            },
            RootCause::PermissionDenied => RootCauseProfile {
                label: "Permission denied",
                description: "The process lacks permission for a file or operation.",
                severity: Severity::High,
                remediation: &[
                    "Check ownership and mode of the affected path",
                    "Avoid running build steps that require elevated privileges",
                ],
                related: &[ErrorType::PermissionError],
            },
            RootCause::FailingTests => RootCauseProfile {
                label: "Failing tests",
                description: "One or more tests assert behavior the code does not satisfy.",
                severity: Severity::Critical,
                remediation: &[
                    "Read the first failing assertion and fix the code or the test",
                    "Run the failing test in isolation to get a focused trace",
                ],
                related: &[ErrorType::TestFailure],
            },
            RootCause::ShellMisuse => RootCauseProfile {
                label: "Shell command error",
                description: "A shell invoked a command that does not exist or misfired.",
                severity: Severity::Medium,
                remediation: &[
                    "Verify the tool is installed and on PATH",
                    "Check the script for typos in the command name",
                ],
                related: &[ErrorType::ShellError],
            },
            RootCause::GitConflict => RootCauseProfile {
                label: "Git conflict",
                description: "Version-control state blocks the loop (conflict or bad ref).",
                severity: Severity::Critical,
                remediation: &[
                    "Resolve or abort the in-progress merge",
                    "Verify the branch and remote state before re-running",
                ],
                related: &[ErrorType::GitError],
            },
            RootCause::Timeout => RootCauseProfile {
                label: "Timeout",
                description: "An operation exceeded its time budget.",
                severity: Severity::Medium,
                remediation: &[
                    "Re-run; transient slowness is common",
                    "Raise the step's timeout if it is consistently slow",
                ],
                related: &[ErrorType::TimeoutError],
            },
            RootCause::NetworkDown => RootCauseProfile {
                label: "Network failure",
                description: "A network endpoint was unreachable or a download failed.",
                severity: Severity::Medium,
                remediation: &[
                    "Check connectivity and any required VPN or proxy",
                    "Re-run once the endpoint is reachable",
                ],
                related: &[ErrorType::NetworkError],
            },
            RootCause::MemoryExhaustion => RootCauseProfile {
                label: "Out of memory",
                description: "The build or test process exhausted available memory.",
                severity: Severity::Critical,
                remediation: &[
                    "Raise the process memory limit",
                    "Split the workload or reduce parallelism",
                ],
                related: &[ErrorType::MemoryError],
            },
            RootCause::BuildBreakage => RootCauseProfile {
                label: "Build failure",
                description: "Compilation or bundling failed.",
                severity: Severity::High,
                remediation: &[
                    "Read the first compiler error; later errors usually cascade",
                    "Reinstall dependencies if the toolchain state looks corrupted",
                ],
                related: &[ErrorType::BuildError],
            },
            RootCause::DirtyWorktree => RootCauseProfile {
                label: "Uncommitted changes",
                description: "The working tree carries changes the loop did not commit.",
                severity: Severity::Low,
                remediation: &[
                    "Commit or stash the changes before the next iteration",
                    "Check why the previous iteration stopped before committing",
                ],
                related: &[ErrorType::UncommittedChanges],
            },
            RootCause::LoopStall => RootCauseProfile {
                label: "Loop stall",
                description: "The build loop stopped making progress or hit its limit.",
                severity: Severity::High,
                remediation: &[
                    "Inspect the last iterations for a repeating failure",
                    "Tighten the task prompt or split the task",
                ],
                related: &[ErrorType::LoopError],
            },
            RootCause::Unknown => RootCauseProfile {
                label: "Unknown",
                description: "The failure does not match any known signature.",
                severity: Severity::Low,
                remediation: &["Inspect the raw log around the reported line"],
                related: &[],
            },
        }
    }
}

impl fmt::Display for RootCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RootCause {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RootCause::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| crate::Error::UnknownRootCause(s.to_string()))
    }
}

/// Map an error type to its root cause. Total by construction.
pub fn classify_error_type(kind: ErrorType) -> RootCause {
    match kind {
        ErrorType::MissingDependency => RootCause::MissingDependency,
        ErrorType::TypeError => RootCause::TypeMismatch,
        ErrorType::SyntaxError => RootCause::SyntaxIssue,
        ErrorType::ReferenceError => RootCause::UndefinedReference,
        ErrorType::FileNotFound => RootCause::MissingFile,
        ErrorType::PermissionError => RootCause::PermissionDenied,
        ErrorType::TestFailure => RootCause::FailingTests,
        ErrorType::ShellError => RootCause::ShellMisuse,
        ErrorType::GitError => RootCause::GitConflict,
        ErrorType::TimeoutError => RootCause::Timeout,
        ErrorType::NetworkError => RootCause::NetworkDown,
        ErrorType::MemoryError => RootCause::MemoryExhaustion,
        ErrorType::BuildError => RootCause::BuildBreakage,
        ErrorType::UncommittedChanges => RootCause::DirtyWorktree,
        ErrorType::LoopError => RootCause::LoopStall,
    }
}

/// A cluster annotated with its root cause and severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedCluster {
    pub cluster: ErrorCluster,
    pub root_cause: RootCause,
    pub label: String,
    pub severity: Severity,
    pub description: String,
    pub remediation: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// Classify a cluster. Merged clusters classify on their dominant kind.
pub fn classify(cluster: ErrorCluster) -> ClassifiedCluster {
    let root_cause = classify_error_type(cluster.dominant_kind());
    let profile = root_cause.profile();
    let agent = cluster
        .errors
        .iter()
        .find_map(|record| record.agent.clone());

    ClassifiedCluster {
        cluster,
        root_cause,
        label: profile.label.to_string(),
        severity: profile.severity,
        description: profile.description.to_string(),
        remediation: profile.remediation.iter().map(|s| s.to_string()).collect(),
        agent,
    }
}

/// Classify every cluster in a diagnosis pass.
pub fn classify_all(clusters: Vec<ErrorCluster>) -> Vec<ClassifiedCluster> {
    clusters.into_iter().map(classify).collect()
}

/// A prioritized remediation suggestion covering one root cause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationSuggestion {
    pub root_cause: RootCause,
    pub label: String,
    pub severity: Severity,
    pub description: String,
    pub remediation: Vec<String>,
    /// Total error occurrences across the contributing clusters.
    pub occurrences: usize,
    /// Up to three representative messages.
    pub examples: Vec<String>,
    /// Run identifiers affected by this cause.
    pub runs: Vec<String>,
}

/// Group classified clusters by root cause and rank the result: severity
/// first (critical before low), then total occurrences descending.
pub fn remediation_suggestions(clusters: &[ClassifiedCluster]) -> Vec<RemediationSuggestion> {
    let mut grouped: BTreeMap<RootCause, RemediationSuggestion> = BTreeMap::new();

    for classified in clusters {
        let entry = grouped
            .entry(classified.root_cause)
            .or_insert_with(|| RemediationSuggestion {
                root_cause: classified.root_cause,
                label: classified.label.clone(),
                severity: classified.severity,
                description: classified.description.clone(),
                remediation: classified.remediation.clone(),
                occurrences: 0,
                examples: Vec::new(),
                runs: Vec::new(),
            });
        entry.occurrences += classified.cluster.count;
        if entry.examples.len() < 3 {
            entry.examples.push(classified.cluster.representative.clone());
        }
        for run in &classified.cluster.runs {
            if !entry.runs.contains(run) {
                entry.runs.push(run.clone());
            }
        }
    }

    let mut suggestions: Vec<RemediationSuggestion> = grouped.into_values().collect();
    suggestions.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then(b.occurrences.cmp(&a.occurrences))
    });
    suggestions
}
