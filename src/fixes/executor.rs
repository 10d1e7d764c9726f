//! The fix executor: policy, approval, state capture, timeout-bounded
//! execution, verification, rollback, and attempt limiting.
//!
//! Per attempt the flow is: attempt-cap check, command resolution, policy
//! evaluation (possibly an approval prompt), before-snapshot, execution
//! under a hard timeout, after-snapshot (taken even when execution fails),
//! optional verification, and rollback on verification failure. Every
//! branch ends in a [`FixRecord`] appended to the session and the activity
//! log; nothing on this path propagates an error to the caller.

use super::registry::{self, FixDefinition, RiskCategory};
use super::session::{FixRecord, FixSession, FixStatus};
use super::snapshot::{StateSnapshot, git};
use super::FixContext;
use crate::activity_log;
use crate::classify::RootCause;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use uuid::Uuid;
use wait_timeout::ChildExt;

/// Retries per fix id within one executor lifetime.
pub const MAX_FIX_ATTEMPTS: u32 = 3;

/// Hard wall-clock limit for a fix or verify command.
pub const FIX_TIMEOUT: Duration = Duration::from_secs(60);

/// Execution policy modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FixPolicy {
    /// Never auto-execute anything.
    Never,
    /// Execute only `safe` fixes; never prompt.
    SafeOnly,
    /// Execute safe and needs-approval fixes without prompting.
    All,
    /// Default: auto-run safe fixes, prompt for needs-approval.
    #[default]
    Prompt,
}

impl FixPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixPolicy::Never => "none",
            FixPolicy::SafeOnly => "safe",
            FixPolicy::All => "all",
            FixPolicy::Prompt => "prompt",
        }
    }
}

impl std::fmt::Display for FixPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FixPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "never" => Ok(FixPolicy::Never),
            "safe" => Ok(FixPolicy::SafeOnly),
            "all" => Ok(FixPolicy::All),
            "prompt" | "default" => Ok(FixPolicy::Prompt),
            _ => Err(crate::Error::InvalidInput(format!(
                "Invalid policy: '{}'. Expected 'none', 'safe', 'all', or 'prompt'.",
                s
            ))),
        }
    }
}

/// Outcome of evaluating a risk category against a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyDecision {
    pub execute: bool,
    pub needs_prompt: bool,
}

/// Decide whether a fix of the given category may run under a policy.
///
/// Manual-only fixes never execute, under any mode.
pub fn evaluate_policy(category: RiskCategory, policy: FixPolicy) -> PolicyDecision {
    if category == RiskCategory::ManualOnly {
        return PolicyDecision {
            execute: false,
            needs_prompt: false,
        };
    }
    match policy {
        FixPolicy::Never => PolicyDecision {
            execute: false,
            needs_prompt: false,
        },
        FixPolicy::SafeOnly => PolicyDecision {
            execute: category == RiskCategory::Safe,
            needs_prompt: false,
        },
        FixPolicy::All => PolicyDecision {
            execute: true,
            needs_prompt: false,
        },
        FixPolicy::Prompt => PolicyDecision {
            execute: true,
            needs_prompt: category == RiskCategory::NeedsApproval,
        },
    }
}

/// Approval channel for needs-approval fixes.
///
/// The CLI installs an interactive implementation; everything else uses
/// [`DenyApproval`], which fails closed - a risky command never runs just
/// because no one was there to say no.
pub trait Approval {
    fn request(&mut self, description: &str, command: &str) -> bool;
}

/// Rejects every request. The fail-closed default.
pub struct DenyApproval;

impl Approval for DenyApproval {
    fn request(&mut self, _description: &str, _command: &str) -> bool {
        false
    }
}

/// Approves every request. Used by `--yes` and by `all`-policy scripting.
pub struct AssumeYes;

impl Approval for AssumeYes {
    fn request(&mut self, _description: &str, _command: &str) -> bool {
        true
    }
}

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub policy: FixPolicy,
    /// Roll back on verification failure.
    pub rollback: bool,
    /// Capture before/after snapshots.
    pub capture_state: bool,
    pub timeout: Duration,
    /// Activity-log destination; `None` disables durable logging.
    pub log_path: Option<PathBuf>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            policy: FixPolicy::default(),
            rollback: true,
            capture_state: true,
            timeout: FIX_TIMEOUT,
            log_path: None,
        }
    }
}

/// Result of one gated execution attempt.
#[derive(Debug, Clone)]
pub struct FixOutcome {
    /// The fix ran and ended in success (verification included).
    pub success: bool,
    /// The underlying command was actually invoked.
    pub executed: bool,
    /// The attempt was declined (policy or approval), not tried and failed.
    pub skipped: bool,
    pub reason: Option<String>,
    pub record: FixRecord,
}

/// Result of a rollback attempt.
#[derive(Debug, Clone)]
pub struct RollbackResult {
    pub success: bool,
    pub files_restored: usize,
    pub error: Option<String>,
}

/// Result of running a definition's verify command.
#[derive(Debug, Clone)]
pub struct VerifyResult {
    pub verified: bool,
    pub error: Option<String>,
    pub output: Option<String>,
    pub duration_ms: u64,
}

/// Run a verification argv under the given timeout. Vacuously verified
/// when no verify command exists.
pub fn run_verification(
    repo_path: &Path,
    argv: Option<&[String]>,
    timeout: Duration,
) -> VerifyResult {
    let clock = Instant::now();
    let Some(argv) = argv else {
        return VerifyResult {
            verified: true,
            error: None,
            output: None,
            duration_ms: 0,
        };
    };
    let execution = run_command(repo_path, argv, timeout);
    VerifyResult {
        verified: execution.success,
        error: execution.error,
        output: if execution.output.is_empty() {
            None
        } else {
            Some(execution.output)
        },
        duration_ms: clock.elapsed().as_millis() as u64,
    }
}

/// The execution context owned by the caller and threaded through every
/// attempt: policy, approval channel, attempt counters, and the session.
pub struct FixExecutor {
    repo_path: PathBuf,
    options: ExecutorOptions,
    approval: Box<dyn Approval>,
    attempts: HashMap<RootCause, u32>,
    session: FixSession,
}

impl FixExecutor {
    pub fn new(repo_path: &Path, options: ExecutorOptions, approval: Box<dyn Approval>) -> Self {
        Self {
            repo_path: repo_path.to_path_buf(),
            options,
            approval,
            attempts: HashMap::new(),
            session: FixSession::new(),
        }
    }

    pub fn session(&self) -> &FixSession {
        &self.session
    }

    pub fn into_session(self) -> FixSession {
        self.session
    }

    /// Attempts recorded for a fix id so far.
    pub fn attempts_for(&self, cause: RootCause) -> u32 {
        self.attempts.get(&cause).copied().unwrap_or(0)
    }

    /// Reset all attempt counters. Called at each build-iteration boundary.
    pub fn reset_attempts(&mut self) {
        self.attempts.clear();
    }

    /// Execute the registered fix for a root cause.
    pub fn execute(&mut self, cause: RootCause, ctx: &FixContext) -> FixOutcome {
        let definition = registry::definition(cause);
        self.execute_definition(cause, &definition, ctx)
    }

    /// Execute an explicit definition. Tests inject spy definitions here.
    pub fn execute_definition(
        &mut self,
        cause: RootCause,
        definition: &FixDefinition,
        ctx: &FixContext,
    ) -> FixOutcome {
        let started_at = Utc::now();
        let clock = Instant::now();

        // Attempt cap comes first: once reached, the command is never
        // resolved or invoked again until the counters reset.
        let prior_attempts = self.attempts_for(cause);
        if prior_attempts >= MAX_FIX_ATTEMPTS {
            return self.finish_unexecuted(
                cause,
                String::new(),
                FixStatus::Failure,
                format!(
                    "attempt limit reached for {}: {}/{} attempts used",
                    cause, prior_attempts, MAX_FIX_ATTEMPTS
                ),
                started_at,
                clock,
            );
        }
        self.attempts.insert(cause, prior_attempts + 1);

        let Some(argv) = definition.command.resolve(ctx) else {
            return self.finish_unexecuted(
                cause,
                String::new(),
                FixStatus::Failure,
                format!("no automatic command available for {}", cause),
                started_at,
                clock,
            );
        };
        let command_display = argv.join(" ");

        let decision = evaluate_policy(definition.category, self.options.policy);
        if !decision.execute {
            return self.finish_unexecuted(
                cause,
                command_display,
                FixStatus::Skipped,
                format!(
                    "{} fix blocked by policy '{}'",
                    definition.category, self.options.policy
                ),
                started_at,
                clock,
            );
        }
        if decision.needs_prompt
            && !self.approval.request(definition.description, &command_display)
        {
            return self.finish_unexecuted(
                cause,
                command_display,
                FixStatus::Skipped,
                "approval declined".to_string(),
                started_at,
                clock,
            );
        }

        let before = if self.options.capture_state {
            StateSnapshot::capture(&self.repo_path).ok()
        } else {
            None
        };

        let execution = run_command(&self.repo_path, &argv, self.options.timeout);

        // Snapshot again even when execution failed, so a diff is always
        // possible whenever `before` exists.
        let after = if self.options.capture_state {
            StateSnapshot::capture(&self.repo_path).ok()
        } else {
            None
        };

        let mut status = if execution.success {
            FixStatus::Success
        } else {
            FixStatus::Failure
        };
        let mut error = execution.error;
        let mut verified = None;
        let mut rolled_back = None;

        if execution.success {
            if let Some(verify_argv) = definition.verify.resolve(ctx) {
                let verification = run_verification(
                    &self.repo_path,
                    Some(verify_argv.as_slice()),
                    self.options.timeout,
                );
                verified = Some(verification.verified);
                if !verification.verified {
                    status = FixStatus::Failure;
                    error = Some(format!(
                        "verification failed: {}",
                        verify_argv.join(" ")
                    ));
                    if self.options.rollback {
                        // Rollback needs a before snapshot to know what to
                        // restore.
                        match &before {
                            Some(snapshot) => {
                                let result =
                                    rollback(&self.repo_path, snapshot, after.as_ref());
                                rolled_back = Some(result.success);
                                if let Some(rollback_error) = result.error {
                                    error = Some(format!(
                                        "{}; rollback: {}",
                                        error.unwrap_or_default(),
                                        rollback_error
                                    ));
                                }
                            }
                            None => rolled_back = Some(false),
                        }
                    }
                }
            }
        }

        let record = FixRecord {
            id: Uuid::new_v4().to_string(),
            fix_type: cause,
            command: command_display,
            before,
            after,
            started_at,
            finished_at: Utc::now(),
            duration_ms: clock.elapsed().as_millis() as u64,
            status,
            error: error.clone(),
            output: if execution.output.is_empty() {
                None
            } else {
                Some(execution.output)
            },
            verified,
            rolled_back,
        };
        self.record(record.clone());

        FixOutcome {
            success: status == FixStatus::Success,
            executed: true,
            skipped: false,
            reason: error,
            record,
        }
    }

    /// Build, store, and log a record for an attempt that never invoked
    /// its command (blocked, capped, or declined).
    fn finish_unexecuted(
        &mut self,
        cause: RootCause,
        command: String,
        status: FixStatus,
        reason: String,
        started_at: chrono::DateTime<Utc>,
        clock: Instant,
    ) -> FixOutcome {
        let record = FixRecord {
            id: Uuid::new_v4().to_string(),
            fix_type: cause,
            command,
            before: None,
            after: None,
            started_at,
            finished_at: Utc::now(),
            duration_ms: clock.elapsed().as_millis() as u64,
            status,
            error: Some(reason.clone()),
            output: None,
            verified: None,
            rolled_back: None,
        };
        self.record(record.clone());

        FixOutcome {
            success: false,
            executed: false,
            skipped: status == FixStatus::Skipped,
            reason: Some(reason),
            record,
        }
    }

    fn record(&mut self, record: FixRecord) {
        if let Some(log_path) = &self.options.log_path {
            activity_log::append(log_path, &record);
        }
        self.session.push(record);
    }
}

/// Restore every file named by either snapshot's modified list to its last
/// committed content via `git checkout`.
///
/// Reported successful when at least one file was restored. Untracked or
/// newly created files have no committed state and cannot be restored this
/// way.
pub fn rollback(
    repo_path: &Path,
    before: &StateSnapshot,
    after: Option<&StateSnapshot>,
) -> RollbackResult {
    let mut files: BTreeSet<&str> = before.modified_files.iter().map(String::as_str).collect();
    if let Some(after) = after {
        files.extend(after.modified_files.iter().map(String::as_str));
    }

    let mut restored = 0;
    let mut failures = Vec::new();
    for file in files {
        match git(repo_path, &["checkout", "--", file]) {
            Ok(_) => restored += 1,
            Err(e) => failures.push(format!("{}: {}", file, e)),
        }
    }

    RollbackResult {
        success: restored > 0,
        files_restored: restored,
        error: if failures.is_empty() {
            None
        } else {
            Some(failures.join("; "))
        },
    }
}

struct Execution {
    success: bool,
    output: String,
    error: Option<String>,
}

/// Run an argument vector with combined output capture under a hard
/// timeout. Never returns an error: failures become `Execution` values.
fn run_command(repo_path: &Path, argv: &[String], timeout: Duration) -> Execution {
    let Some((program, args)) = argv.split_first() else {
        return Execution {
            success: false,
            output: String::new(),
            error: Some("empty command".to_string()),
        };
    };

    let spawned = Command::new(program)
        .args(args)
        .current_dir(repo_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            return Execution {
                success: false,
                output: String::new(),
                error: Some(format!("failed to start '{}': {}", program, e)),
            };
        }
    };

    // Drain pipes on threads so a chatty command can't fill the pipe
    // buffer and deadlock the timeout wait.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = std::thread::spawn(move || read_all(stdout));
    let stderr_reader = std::thread::spawn(move || read_all(stderr));

    let waited = child.wait_timeout(timeout);

    let (success, error) = match waited {
        Ok(Some(status)) => {
            if status.success() {
                (true, None)
            } else {
                let code = status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "terminated by signal".to_string());
                (false, Some(format!("exit status {}", code)))
            }
        }
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            (false, Some(format!("timed out after {:?}", timeout)))
        }
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            (false, Some(format!("wait failed: {}", e)))
        }
    };

    let mut output = stdout_reader.join().unwrap_or_default();
    let err_output = stderr_reader.join().unwrap_or_default();
    if !err_output.is_empty() {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&err_output);
    }

    Execution {
        success,
        output,
        error,
    }
}

fn read_all<R: Read>(source: Option<R>) -> String {
    let mut buffer = String::new();
    if let Some(mut reader) = source {
        let mut bytes = Vec::new();
        if reader.read_to_end(&mut bytes).is_ok() {
            buffer = String::from_utf8_lossy(&bytes).into_owned();
        }
    }
    buffer
}
