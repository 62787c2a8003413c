//! Vault configuration
//!
//! Loaded from a JSON file. Only `data_dir` is required; everything else
//! has a default and is validated after load.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diff::BreakingPolicy;
use crate::lock::LockConfig;
use crate::observability::{log_event_with_fields, Event};
use crate::spec::SpecFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Storage root (required)
    pub data_dir: PathBuf,

    /// Lease age after which a lock is considered abandoned
    #[serde(default = "default_lock_stale_after_ms")]
    pub lock_stale_after_ms: u64,

    #[serde(default = "default_lock_max_attempts")]
    pub lock_max_attempts: u32,

    #[serde(default = "default_lock_base_backoff_ms")]
    pub lock_base_backoff_ms: u64,

    #[serde(default = "default_lock_max_backoff_ms")]
    pub lock_max_backoff_ms: u64,

    /// Serialization for newly saved content
    #[serde(default)]
    pub default_format: SpecFormat,

    /// Whether the audit log takes its own lock around appends
    #[serde(default = "default_audit_locking")]
    pub audit_locking: bool,

    #[serde(default)]
    pub breaking_policy: BreakingPolicy,
}

fn default_lock_stale_after_ms() -> u64 {
    30_000
}
fn default_lock_max_attempts() -> u32 {
    10
}
fn default_lock_base_backoff_ms() -> u64 {
    25
}
fn default_lock_max_backoff_ms() -> u64 {
    1_000
}
fn default_audit_locking() -> bool {
    true
}

impl VaultConfig {
    /// Configuration with defaults rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            lock_stale_after_ms: default_lock_stale_after_ms(),
            lock_max_attempts: default_lock_max_attempts(),
            lock_base_backoff_ms: default_lock_base_backoff_ms(),
            lock_max_backoff_ms: default_lock_max_backoff_ms(),
            default_format: SpecFormat::default(),
            audit_locking: default_audit_locking(),
            breaking_policy: BreakingPolicy::default(),
        }
    }

    /// Load and validate configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content)?;
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("data_dir", &config.data_dir.display().to_string()),
                ("path", &path.display().to_string()),
            ],
        );
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: VaultConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }
        if self.lock_stale_after_ms == 0 {
            return Err(ConfigError::Invalid("lock_stale_after_ms must be > 0".into()));
        }
        if self.lock_max_attempts == 0 {
            return Err(ConfigError::Invalid("lock_max_attempts must be > 0".into()));
        }
        if self.lock_max_backoff_ms < self.lock_base_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "lock_max_backoff_ms ({}) must be >= lock_base_backoff_ms ({})",
                self.lock_max_backoff_ms, self.lock_base_backoff_ms
            )));
        }
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        &self.data_dir
    }

    pub fn lock_config(&self) -> LockConfig {
        LockConfig {
            stale_after: Duration::from_millis(self.lock_stale_after_ms),
            max_attempts: self.lock_max_attempts,
            base_backoff: Duration::from_millis(self.lock_base_backoff_ms),
            max_backoff: Duration::from_millis(self.lock_max_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::from_json(r#"{"data_dir": "/var/lib/apivault"}"#).unwrap();
        assert_eq!(config, VaultConfig::new("/var/lib/apivault"));
        assert_eq!(config.lock_config().max_attempts, 10);
        assert_eq!(config.default_format, SpecFormat::Yaml);
        assert!(config.audit_locking);
        assert!(config.breaking_policy.enum_value_removal_breaking);
    }

    #[test]
    fn test_overrides() {
        let config = VaultConfig::from_json(
            r#"{"data_dir": "d", "default_format": "json", "audit_locking": false,
                "breaking_policy": {"format_change_breaking": false}}"#,
        )
        .unwrap();
        assert_eq!(config.default_format, SpecFormat::Json);
        assert!(!config.audit_locking);
        assert!(!config.breaking_policy.format_change_breaking);
        assert!(config.breaking_policy.request_body_removal_breaking);
    }

    #[test]
    fn test_validation() {
        assert!(VaultConfig::from_json(r#"{}"#).is_err());
        assert!(VaultConfig::from_json(r#"{"data_dir": "d", "lock_max_attempts": 0}"#).is_err());
        assert!(VaultConfig::from_json(
            r#"{"data_dir": "d", "lock_base_backoff_ms": 500, "lock_max_backoff_ms": 100}"#
        )
        .is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = VaultConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
