//! The fix registry and the guarded fix executor.
//!
//! `registry` is the declarative root-cause → remediation table;
//! `executor` owns policy, approval, state capture, timeout-bounded
//! execution, verification, rollback, and attempt limiting; `snapshot`
//! captures working-tree state; `session` holds the per-process records
//! and their report formatters.

pub mod executor;
pub mod registry;
pub mod session;
pub mod snapshot;

pub use executor::{
    Approval, AssumeYes, DenyApproval, ExecutorOptions, FIX_TIMEOUT, FixExecutor, FixOutcome,
    FixPolicy, MAX_FIX_ATTEMPTS, PolicyDecision, RollbackResult, VerifyResult, evaluate_policy,
    rollback, run_verification,
};
pub use registry::{
    FixCommand, FixDefinition, RiskCategory, definition, validate_dependency_name,
};
pub use session::{FixRecord, FixSession, FixStatus, SessionSummary};
pub use snapshot::{FileChanges, StateSnapshot};

/// Context handed to derived fix commands.
///
/// Carries whatever the diagnosis produced that a parameterized command
/// might need: the triggering message, an explicitly named dependency, or
/// a path hint.
#[derive(Debug, Clone, Default)]
pub struct FixContext {
    /// Representative message of the cluster being fixed.
    pub message: Option<String>,
    /// Explicit dependency name, when the caller already knows it.
    pub dependency: Option<String>,
    /// File or path hint from the triggering record.
    pub source: Option<String>,
}

impl FixContext {
    /// Context derived from a triggering error message.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }
}
