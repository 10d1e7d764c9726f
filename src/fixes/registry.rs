//! Declarative fix registry.
//!
//! One definition per root cause. Causes without a safe, well-defined
//! remedy (failing tests, syntax errors, ...) are manual-only with no
//! command. Commands are argument vectors, never shell strings, so no
//! shell interpolation happens anywhere on the execution path; the one
//! parameterized command (dependency install) passes a strict allow-list
//! validator before it is returned.

use super::FixContext;
use crate::classify::RootCause;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Risk tier controlling whether a fix may run without a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskCategory {
    /// Safe to run automatically.
    Safe,
    /// Runs only after explicit approval.
    NeedsApproval,
    /// Never executed automatically, under any policy.
    ManualOnly,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Safe => "safe",
            RiskCategory::NeedsApproval => "needs-approval",
            RiskCategory::ManualOnly => "manual-only",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A remediation command: absent, a fixed argument vector, or derived
/// from the fix context.
#[derive(Clone, Copy)]
pub enum FixCommand {
    None,
    Static(&'static [&'static str]),
    Derived(fn(&FixContext) -> Option<Vec<String>>),
}

impl FixCommand {
    /// Resolve to a concrete argument vector, if one exists.
    pub fn resolve(&self, ctx: &FixContext) -> Option<Vec<String>> {
        match self {
            FixCommand::None => None,
            FixCommand::Static(argv) => {
                Some(argv.iter().map(|s| s.to_string()).collect())
            }
            FixCommand::Derived(derive) => derive(ctx),
        }
    }
}

impl fmt::Debug for FixCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixCommand::None => write!(f, "None"),
            FixCommand::Static(argv) => write!(f, "Static({:?})", argv),
            FixCommand::Derived(_) => write!(f, "Derived(..)"),
        }
    }
}

/// One row of the registry.
#[derive(Debug, Clone)]
pub struct FixDefinition {
    pub category: RiskCategory,
    pub command: FixCommand,
    /// Optional post-execution check confirming the fix took effect.
    pub verify: FixCommand,
    pub description: &'static str,
}

impl FixDefinition {
    fn manual(description: &'static str) -> Self {
        Self {
            category: RiskCategory::ManualOnly,
            command: FixCommand::None,
            verify: FixCommand::None,
            description,
        }
    }
}

/// Look up the remediation definition for a root cause. Total: every cause
/// has a row, most of them manual-only.
pub fn definition(cause: RootCause) -> FixDefinition {
    match cause {
        RootCause::MissingDependency => FixDefinition {
            category: RiskCategory::Safe,
            command: FixCommand::Derived(derive_install_command),
            verify: FixCommand::Derived(derive_install_verify),
            description: "Install the missing dependency with npm",
        },
        RootCause::DirtyWorktree => FixDefinition {
            category: RiskCategory::NeedsApproval,
            command: FixCommand::Static(&["git", "stash", "--include-untracked"]),
            verify: FixCommand::Static(&["git", "diff", "--quiet"]),
            description: "Stash uncommitted changes to restore a clean tree",
        },
        RootCause::GitConflict => FixDefinition {
            category: RiskCategory::NeedsApproval,
            command: FixCommand::Static(&["git", "merge", "--abort"]),
            verify: FixCommand::None,
            description: "Abort the in-progress merge",
        },
        RootCause::BuildBreakage => FixDefinition {
            category: RiskCategory::NeedsApproval,
            command: FixCommand::Static(&["npm", "ci"]),
            verify: FixCommand::None,
            description: "Reinstall dependencies from the lockfile",
        },
        RootCause::TypeMismatch => {
            FixDefinition::manual("Type errors require a code change")
        }
        RootCause::SyntaxIssue => {
            FixDefinition::manual("Syntax errors require a code change")
        }
        RootCause::UndefinedReference => {
            FixDefinition::manual("Undefined references require a code change")
        }
        RootCause::MissingFile => {
            FixDefinition::manual("Missing files cannot be conjured automatically")
        }
        RootCause::PermissionDenied => {
            FixDefinition::manual("Permission problems need human review")
        }
        RootCause::FailingTests => {
            FixDefinition::manual("Failing tests require a code or test change")
        }
        RootCause::ShellMisuse => {
            FixDefinition::manual("Install the missing tool or fix the script")
        }
        RootCause::Timeout => {
            FixDefinition::manual("Re-run; raise the step timeout if persistent")
        }
        RootCause::NetworkDown => {
            FixDefinition::manual("Restore connectivity, then re-run")
        }
        RootCause::MemoryExhaustion => {
            FixDefinition::manual("Raise memory limits or reduce parallelism")
        }
        RootCause::LoopStall => {
            FixDefinition::manual("Inspect the loop; likely a repeating failure")
        }
        RootCause::Unknown => FixDefinition::manual("No automatic remedy for unknown failures"),
    }
}

static DEPENDENCY_FROM_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:Cannot find module|No module named|Can't resolve|unresolved import)\s*['"`]([^'"`]+)['"`]"#,
    )
    .expect("invalid pattern")
});

/// Shell metacharacters rejected outright by the validator.
const SHELL_METACHARACTERS: &[char] = &[
    ';', '&', '|', '`', '$', '(', ')', '{', '}', '[', ']', '\\', '<', '>',
];

/// Pull a dependency name out of a module-not-found style message.
pub fn dependency_from_message(message: &str) -> Option<String> {
    DEPENDENCY_FROM_MESSAGE
        .captures(message)
        .map(|caps| caps[1].to_string())
}

/// Strict allow-list check for dependency names used in derived commands.
///
/// Accepts alphanumerics plus `. _ ~ -`, with an optional `@scope/`
/// prefix. Anything containing a shell metacharacter or whitespace is
/// rejected; callers return no command rather than an unsafe one.
pub fn validate_dependency_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 214 {
        return false;
    }
    if name.contains(SHELL_METACHARACTERS) || name.chars().any(char::is_whitespace) {
        return false;
    }

    let is_name_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '~' | '-');

    match name.strip_prefix('@') {
        Some(rest) => {
            let Some((scope, package)) = rest.split_once('/') else {
                return false;
            };
            !scope.is_empty()
                && !package.is_empty()
                && scope.chars().all(is_name_char)
                && package.chars().all(is_name_char)
        }
        None => name.chars().all(is_name_char),
    }
}

fn dependency_from_context(ctx: &FixContext) -> Option<String> {
    ctx.dependency
        .clone()
        .or_else(|| ctx.message.as_deref().and_then(dependency_from_message))
        .filter(|name| validate_dependency_name(name))
}

fn derive_install_command(ctx: &FixContext) -> Option<Vec<String>> {
    let name = dependency_from_context(ctx)?;
    Some(vec!["npm".to_string(), "install".to_string(), name])
}

fn derive_install_verify(ctx: &FixContext) -> Option<Vec<String>> {
    let name = dependency_from_context(ctx)?;
    Some(vec![
        "npm".to_string(),
        "ls".to_string(),
        "--depth=0".to_string(),
        name,
    ])
}
