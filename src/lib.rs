//! Juryrig - failure diagnosis and auto-remediation for agent build loops.
//!
//! This library provides the core functionality for the `jr` CLI tool:
//! - `extract` - turn raw log text into typed error records
//! - `cluster` - group near-duplicate errors by approximate similarity
//! - `classify` - map clusters to root causes, severities, and remediation
//! - `fixes` - the declarative fix registry and the guarded fix executor
//! - `activity_log` - the durable, append-only record of every fix attempt

pub mod activity_log;
pub mod classify;
pub mod cli;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod extract;
pub mod fixes;
pub mod storage;

/// Library-level error type for juryrig operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown root cause: {0}")]
    UnknownRootCause(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for juryrig operations.
pub type Result<T> = std::result::Result<T, Error>;
