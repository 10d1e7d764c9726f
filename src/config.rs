//! TOML configuration for juryrig defaults.
//!
//! Located at `<data-root>/config.toml`. Everything is optional; CLI flags
//! take precedence over config values, which take precedence over built-in
//! defaults.
//!
//! ```toml
//! policy = "safe"
//! cluster-threshold = 0.7
//! max-errors = 50
//! rollback = true
//! log-path = "/var/log/juryrig/autofix.log"
//! ```

use crate::storage;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User-facing configuration. All fields optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Default execution policy: "none", "safe", "all", or "prompt".
    pub policy: Option<String>,

    /// Default clustering similarity threshold.
    pub cluster_threshold: Option<f64>,

    /// Default extraction cap.
    pub max_errors: Option<usize>,

    /// Whether verification failures trigger rollback.
    pub rollback: Option<bool>,

    /// Fixed activity-log path, overriding the per-repo default.
    pub log_path: Option<PathBuf>,
}

impl Config {
    /// Load the configuration from the default location. A missing file
    /// yields the default (empty) config.
    pub fn load() -> Result<Self> {
        let path = storage::data_root()?.join("config.toml");
        Self::load_from(&path)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(&temp.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_full_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "policy = \"safe\"\ncluster-threshold = 0.7\nmax-errors = 50\nrollback = false\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.policy.as_deref(), Some("safe"));
        assert_eq!(config.cluster_threshold, Some(0.7));
        assert_eq!(config.max_errors, Some(50));
        assert_eq!(config.rollback, Some(false));
        assert!(config.log_path.is_none());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "policy = [broken").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
