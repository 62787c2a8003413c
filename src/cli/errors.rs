//! CLI-specific error types
//!
//! Vault failures keep the vault's own code so scripts can match on
//! `API_NOT_FOUND` and friends regardless of which command produced them.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::errors::VaultError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Io(String),

    #[error("{0}")]
    Usage(String),

    #[error("{message}")]
    Vault { code: &'static str, message: String },
}

impl CliError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Stable code written to the error response
    pub fn code_str(&self) -> &'static str {
        match self {
            Self::Config(_) => "CLI_CONFIG_ERROR",
            Self::Io(_) => "CLI_IO_ERROR",
            Self::Usage(_) => "CLI_USAGE_ERROR",
            Self::Vault { code, .. } => *code,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<VaultError> for CliError {
    fn from(e: VaultError) -> Self {
        Self::Vault {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_code_passes_through() {
        let err: CliError = VaultError::validation("bad tag").into();
        assert_eq!(err.code_str(), VaultError::validation("x").code());
        assert!(err.message().contains("bad tag"));
    }

    #[test]
    fn test_json_errors_are_io() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(CliError::from(json_err).code_str(), "CLI_IO_ERROR");
    }
}
