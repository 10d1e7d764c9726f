//! CLI argument definitions for juryrig.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Juryrig - failure diagnosis and guarded auto-fixes for agent build loops.
///
/// Start with `jr diagnose` on a run log to see clustered failures, then
/// `jr fix <cause>` or `jr auto` to apply registered remediations.
#[derive(Parser, Debug)]
#[command(name = "jr")]
#[command(author, version, about = "Diagnose agent build-loop failures and apply guarded auto-fixes", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if jr was started in <path> instead of the current directory.
    /// Can also be set via the JR_REPO environment variable.
    #[arg(short = 'C', long = "repo", global = true, env = "JR_REPO")]
    pub repo_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract, cluster, and classify failures from log text
    ///
    /// Reads free-form logs from the given paths (or stdin when none are
    /// given) and prints clusters with root causes and prioritized
    /// remediation suggestions.
    Diagnose {
        /// Log files to read; stdin when empty
        paths: Vec<PathBuf>,

        /// Run-summary markdown files (structured parse with run metadata)
        #[arg(short = 's', long = "summary")]
        summaries: Vec<PathBuf>,

        /// Timestamped iteration-log files
        #[arg(short = 'i', long = "iteration-log")]
        iteration_logs: Vec<PathBuf>,

        /// Clustering similarity threshold (0.0 - 1.0)
        #[arg(short = 't', long)]
        threshold: Option<f64>,

        /// Stop extraction after this many records
        #[arg(short = 'm', long)]
        max_errors: Option<usize>,
    },

    /// Run the registered fix for one root cause
    Fix {
        /// Root cause id (e.g. missing_dependency, dirty_worktree)
        cause: String,

        /// Triggering error message, used to derive parameterized commands
        #[arg(short = 'M', long)]
        message: Option<String>,

        /// Explicit dependency name for missing_dependency fixes
        #[arg(short = 'd', long)]
        dependency: Option<String>,

        /// Execution policy: none, safe, all, or prompt
        #[arg(short = 'p', long)]
        policy: Option<String>,

        /// Pre-approve any needs-approval prompt (for scripting)
        #[arg(short = 'y', long)]
        yes: bool,

        /// Do not roll back on verification failure
        #[arg(long)]
        no_rollback: bool,

        /// Skip before/after state snapshots
        #[arg(long)]
        no_snapshot: bool,

        /// Resolve and print the command without executing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Diagnose, then attempt a registered fix per actionable cluster
    Auto {
        /// Log files to read; stdin when empty
        paths: Vec<PathBuf>,

        /// Run-summary markdown files
        #[arg(short = 's', long = "summary")]
        summaries: Vec<PathBuf>,

        /// Execution policy: none, safe, all, or prompt
        #[arg(short = 'p', long)]
        policy: Option<String>,

        /// Pre-approve any needs-approval prompt (for scripting)
        #[arg(short = 'y', long)]
        yes: bool,

        /// Do not roll back on verification failure
        #[arg(long)]
        no_rollback: bool,
    },

    /// Summarize the durable activity log
    ///
    /// Stateless: reads only the on-disk log, so it works in a separate
    /// process from the one that ran the fixes.
    Report {
        /// Activity-log path (defaults to this repo's log)
        #[arg(short = 'l', long)]
        log: Option<PathBuf>,
    },

    /// Per-agent failure statistics from run summaries
    Agents {
        /// Run-summary markdown files
        paths: Vec<PathBuf>,

        /// Candidate agents to rank (repeatable); defaults to the agents
        /// seen in the summaries
        #[arg(short = 'a', long = "agent")]
        roster: Vec<String>,
    },
}
