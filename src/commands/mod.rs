//! Command implementations for the juryrig CLI.
//!
//! Each command returns a typed result implementing [`Output`], rendered
//! as JSON by default or human-readable text with `-H`.

use crate::activity_log::{self, LogSummary};
use crate::classify::{
    self, AgentRecommendation, AgentWeaknessMap, ClassifiedCluster, RemediationSuggestion,
    RootCause, Severity,
};
use crate::cluster::{ClusterOptions, cluster};
use crate::config::Config;
use crate::extract::{
    self, ErrorRecord, ExtractOptions, extract_from_iteration_log, extract_from_run_summary,
};
use crate::fixes::{
    Approval, AssumeYes, DenyApproval, ExecutorOptions, FixContext, FixExecutor, FixPolicy,
    SessionSummary, registry,
};
use crate::storage;
use crate::{Error, Result};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Interactive approval over stderr/stdin. EOF or any read failure counts
/// as rejection: no interactive channel means no approval.
pub struct StdinApproval;

impl Approval for StdinApproval {
    fn request(&mut self, description: &str, command: &str) -> bool {
        eprintln!("About to run: {}", command);
        eprintln!("  ({})", description);
        eprint!("Proceed? [y/N] ");
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => false,
            Ok(_) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
        }
    }
}

// === diagnose ===

/// Inputs for a diagnosis pass.
#[derive(Debug, Default)]
pub struct DiagnoseInputs {
    /// Free-form log files; stdin is read when everything is empty.
    pub paths: Vec<PathBuf>,
    /// Run-summary markdown files.
    pub summaries: Vec<PathBuf>,
    /// Timestamped iteration-log files.
    pub iteration_logs: Vec<PathBuf>,
    pub threshold: Option<f64>,
    pub max_errors: Option<usize>,
}

/// One cluster in a diagnosis report.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterReport {
    pub kind: String,
    pub root_cause: RootCause,
    pub label: String,
    pub severity: Severity,
    pub count: usize,
    pub representative: String,
    pub runs: Vec<String>,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DiagnoseResult {
    pub records: usize,
    pub clusters: Vec<ClusterReport>,
    pub suggestions: Vec<RemediationSuggestion>,
}

impl Output for DiagnoseResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.clusters.is_empty() {
            return "No known failure signatures found.".to_string();
        }
        let mut lines = vec![format!(
            "{} error record(s) in {} cluster(s):",
            self.records,
            self.clusters.len()
        )];
        for cluster in &self.clusters {
            lines.push(format!(
                "  [{}] {} x{} - {}",
                cluster.severity, cluster.label, cluster.count, cluster.representative
            ));
        }
        lines.push(String::new());
        lines.push("Suggested remediation, most urgent first:".to_string());
        for suggestion in &self.suggestions {
            lines.push(format!(
                "  {} ({}, {} occurrence(s)):",
                suggestion.label, suggestion.severity, suggestion.occurrences
            ));
            for step in &suggestion.remediation {
                lines.push(format!("    - {}", step));
            }
        }
        lines.join("\n")
    }
}

/// Run extraction, clustering, and classification over the given inputs.
pub fn diagnose(inputs: &DiagnoseInputs, config: &Config) -> Result<DiagnoseResult> {
    let (record_count, classified) = classify_inputs(inputs, config)?;
    Ok(build_diagnose_result(record_count, &classified))
}

fn classify_inputs(
    inputs: &DiagnoseInputs,
    config: &Config,
) -> Result<(usize, Vec<ClassifiedCluster>)> {
    let records = collect_records(inputs, config)?;

    let threshold = inputs
        .threshold
        .or(config.cluster_threshold)
        .unwrap_or(crate::cluster::DEFAULT_THRESHOLD);
    let options = ClusterOptions {
        threshold,
        ..Default::default()
    };
    let classified = classify::classify_all(cluster(&records, &options));
    Ok((records.len(), classified))
}

fn build_diagnose_result(record_count: usize, classified: &[ClassifiedCluster]) -> DiagnoseResult {
    DiagnoseResult {
        records: record_count,
        clusters: classified.iter().map(cluster_report).collect(),
        suggestions: classify::remediation_suggestions(classified),
    }
}

fn cluster_report(classified: &ClassifiedCluster) -> ClusterReport {
    ClusterReport {
        kind: classified.cluster.kind_label(),
        root_cause: classified.root_cause,
        label: classified.label.clone(),
        severity: classified.severity,
        count: classified.cluster.count,
        representative: classified.cluster.representative.clone(),
        runs: classified.cluster.runs.iter().cloned().collect(),
        sources: classified.cluster.sources.iter().cloned().collect(),
        agent: classified.agent.clone(),
    }
}

fn collect_records(inputs: &DiagnoseInputs, config: &Config) -> Result<Vec<ErrorRecord>> {
    let max_errors = inputs
        .max_errors
        .or(config.max_errors)
        .unwrap_or(extract::DEFAULT_MAX_ERRORS);
    let mut records = Vec::new();

    for path in &inputs.paths {
        let text = std::fs::read_to_string(path)?;
        let opts = ExtractOptions {
            max_errors,
            source: path.display().to_string(),
        };
        records.extend(extract::extract(&text, &opts));
    }

    for path in &inputs.summaries {
        let text = std::fs::read_to_string(path)?;
        records.extend(extract_from_run_summary(&text, &path.display().to_string()));
    }

    for path in &inputs.iteration_logs {
        let text = std::fs::read_to_string(path)?;
        let opts = extract::runlog::IterationLogOptions {
            source: path.display().to_string(),
            max_errors,
            ..Default::default()
        };
        records.extend(extract_from_iteration_log(&text, &opts));
    }

    if inputs.paths.is_empty() && inputs.summaries.is_empty() && inputs.iteration_logs.is_empty() {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        let opts = ExtractOptions {
            max_errors,
            source: "stdin".to_string(),
        };
        records.extend(extract::extract(&text, &opts));
    }

    Ok(records)
}

// === fix ===

/// Options for the `fix` command.
#[derive(Debug, Default)]
pub struct FixOptions {
    pub message: Option<String>,
    pub dependency: Option<String>,
    pub policy: Option<String>,
    pub yes: bool,
    pub no_rollback: bool,
    pub no_snapshot: bool,
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct FixCommandResult {
    pub cause: RootCause,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub executed: bool,
    pub success: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
}

impl Output for FixCommandResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.dry_run {
            return match &self.command {
                Some(command) => format!("Would run for {}: {}", self.cause, command),
                None => format!("No automatic command available for {}", self.cause),
            };
        }
        let verdict = if self.success {
            "fixed"
        } else if self.skipped {
            "skipped"
        } else {
            "failed"
        };
        match &self.reason {
            Some(reason) => format!("{}: {} ({})", self.cause, verdict, reason),
            None => format!("{}: {}", self.cause, verdict),
        }
    }
}

/// Run the registered fix for one root cause.
pub fn fix(repo_path: &Path, cause_name: &str, options: &FixOptions, config: &Config) -> Result<FixCommandResult> {
    let cause: RootCause = cause_name.parse()?;
    let definition = registry::definition(cause);

    let ctx = FixContext {
        message: options.message.clone(),
        dependency: options.dependency.clone(),
        source: None,
    };

    if options.dry_run {
        let command = definition.command.resolve(&ctx).map(|argv| argv.join(" "));
        return Ok(FixCommandResult {
            cause,
            dry_run: true,
            executed: false,
            success: false,
            skipped: false,
            reason: None,
            command,
            log_path: None,
        });
    }

    let log_path = resolve_log_path(repo_path, config)?;
    let executor_options = ExecutorOptions {
        policy: resolve_policy(options.policy.as_deref(), config)?,
        rollback: !options.no_rollback && config.rollback.unwrap_or(true),
        capture_state: !options.no_snapshot,
        log_path: Some(log_path.clone()),
        ..Default::default()
    };
    let approval = approval_channel(options.yes);
    let mut executor = FixExecutor::new(repo_path, executor_options, approval);

    let outcome = executor.execute(cause, &ctx);
    Ok(FixCommandResult {
        cause,
        dry_run: false,
        command: if outcome.record.command.is_empty() {
            None
        } else {
            Some(outcome.record.command.clone())
        },
        executed: outcome.executed,
        success: outcome.success,
        skipped: outcome.skipped,
        reason: outcome.reason,
        log_path: Some(log_path.display().to_string()),
    })
}

// === auto ===

/// Options for the `auto` command.
#[derive(Debug, Default)]
pub struct AutoOptions {
    pub policy: Option<String>,
    pub yes: bool,
    pub no_rollback: bool,
}

#[derive(Debug, Serialize)]
pub struct AttemptReport {
    pub cause: RootCause,
    pub executed: bool,
    pub success: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AutoResult {
    pub diagnosis: DiagnoseResult,
    pub attempts: Vec<AttemptReport>,
    pub summary: SessionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    pub success_rate: f64,
}

impl Output for AutoResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![self.diagnosis.to_human(), String::new()];
        if self.attempts.is_empty() {
            lines.push("No registered fixes applicable.".to_string());
        }
        for attempt in &self.attempts {
            let verdict = if attempt.success {
                "fixed"
            } else if attempt.skipped {
                "skipped"
            } else {
                "failed"
            };
            match &attempt.reason {
                Some(reason) => lines.push(format!("{}: {} ({})", attempt.cause, verdict, reason)),
                None => lines.push(format!("{}: {}", attempt.cause, verdict)),
            }
        }
        if let Some(message) = &self.commit_message {
            lines.push(String::new());
            lines.push(message.clone());
        }
        lines.join("\n")
    }
}

/// Diagnose, then attempt one registered fix per distinct root cause.
pub fn auto(
    repo_path: &Path,
    inputs: &DiagnoseInputs,
    options: &AutoOptions,
    config: &Config,
) -> Result<AutoResult> {
    let (record_count, classified) = classify_inputs(inputs, config)?;

    let log_path = resolve_log_path(repo_path, config)?;
    let executor_options = ExecutorOptions {
        policy: resolve_policy(options.policy.as_deref(), config)?,
        rollback: !options.no_rollback && config.rollback.unwrap_or(true),
        log_path: Some(log_path),
        ..Default::default()
    };
    let approval = approval_channel(options.yes);
    let mut executor = FixExecutor::new(repo_path, executor_options, approval);

    let mut attempted_causes = Vec::new();
    let mut attempts = Vec::new();
    // Clusters arrive sorted by count, so the most frequent failure for a
    // cause is the one that parameterizes its fix.
    for cluster in &classified {
        let cause = cluster.root_cause;
        if attempted_causes.contains(&cause) {
            continue;
        }
        let definition = registry::definition(cause);
        // The seed record's full matched text carries the detail a derived
        // command needs (the captured message may be just a name).
        let ctx = FixContext {
            message: cluster
                .cluster
                .errors
                .first()
                .map(|record| record.full_match.clone()),
            dependency: None,
            source: cluster.cluster.sources.iter().next().cloned(),
        };
        if definition.command.resolve(&ctx).is_none() {
            continue;
        }
        attempted_causes.push(cause);

        let outcome = executor.execute(cause, &ctx);
        attempts.push(AttemptReport {
            cause,
            executed: outcome.executed,
            success: outcome.success,
            skipped: outcome.skipped,
            reason: outcome.reason,
        });
    }

    let session = executor.into_session();
    Ok(AutoResult {
        diagnosis: build_diagnose_result(record_count, &classified),
        attempts,
        summary: session.summary(),
        commit_message: session.commit_message(),
        success_rate: session.success_rate(),
    })
}

// === report ===

#[derive(Debug, Serialize)]
pub struct ReportResult {
    pub log_path: String,
    pub summary: LogSummary,
}

impl Output for ReportResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let summary = &self.summary;
        if summary.total == 0 {
            return format!("No fix attempts recorded in {}", self.log_path);
        }
        let mut lines = vec![format!(
            "{}: {} attempt(s), {} succeeded, {} failed, {} skipped ({}ms total)",
            self.log_path,
            summary.total,
            summary.succeeded,
            summary.failed,
            summary.skipped,
            summary.total_duration_ms
        )];
        for (fix_type, count) in &summary.by_type {
            lines.push(format!("  {}: {}", fix_type, count));
        }
        lines.join("\n")
    }
}

/// Summarize the durable activity log. Reads only the on-disk log.
pub fn report(repo_path: &Path, log_override: Option<&Path>, config: &Config) -> Result<ReportResult> {
    let log_path = match log_override {
        Some(path) => path.to_path_buf(),
        None => resolve_log_path(repo_path, config)?,
    };
    let entries = activity_log::read_log(&log_path)?;
    Ok(ReportResult {
        log_path: log_path.display().to_string(),
        summary: activity_log::summarize(&entries),
    })
}

// === agents ===

#[derive(Debug, Serialize)]
pub struct AgentsResult {
    pub weaknesses: AgentWeaknessMap,
    pub recommendation: AgentRecommendation,
}

impl Output for AgentsResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        for weakness in self.weaknesses.values() {
            let primary = weakness.primary_weakness.as_deref().unwrap_or("n/a");
            lines.push(format!(
                "{}: {} failure(s), weakest on {}",
                weakness.agent, weakness.total_failures, primary
            ));
        }
        lines.push(self.recommendation.reasoning.clone());
        lines.join("\n")
    }
}

/// Aggregate per-agent failure statistics from run summaries.
pub fn agents(paths: &[PathBuf], roster: &[String]) -> Result<AgentsResult> {
    if paths.is_empty() {
        return Err(Error::InvalidInput(
            "at least one run-summary file is required".to_string(),
        ));
    }

    let mut records = Vec::new();
    for path in paths {
        let text = std::fs::read_to_string(path)?;
        records.extend(extract_from_run_summary(&text, &path.display().to_string()));
    }

    let classified = classify::classify_all(cluster(&records, &ClusterOptions::default()));
    let weaknesses = classify::agent_weaknesses(&classified);

    let roster: Vec<String> = if roster.is_empty() {
        weaknesses.keys().cloned().collect()
    } else {
        roster.to_vec()
    };
    let recommendation = classify::agent_recommendation(&weaknesses, &roster);

    Ok(AgentsResult {
        weaknesses,
        recommendation,
    })
}

// === shared helpers ===

fn resolve_policy(flag: Option<&str>, config: &Config) -> Result<FixPolicy> {
    match flag.or(config.policy.as_deref()) {
        Some(name) => name.parse(),
        None => Ok(FixPolicy::default()),
    }
}

fn resolve_log_path(repo_path: &Path, config: &Config) -> Result<PathBuf> {
    match &config.log_path {
        Some(path) => Ok(path.clone()),
        None => storage::activity_log_path(repo_path),
    }
}

fn approval_channel(assume_yes: bool) -> Box<dyn Approval> {
    if assume_yes {
        Box::new(AssumeYes)
    } else if is_interactive() {
        Box::new(StdinApproval)
    } else {
        // No interactive channel: fail closed.
        Box::new(DenyApproval)
    }
}

fn is_interactive() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stdin())
}
