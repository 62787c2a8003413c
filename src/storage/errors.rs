//! Storage provider errors

use std::io;

use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage provider errors.
///
/// Key validation failures are reported before any I/O and are kept
/// distinct from I/O failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Key not found: {key} (during {operation})")]
    NotFound { operation: &'static str, key: String },

    #[error("Storage {operation} failed for '{key}': {source}")]
    Io {
        operation: &'static str,
        key: String,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Key validation failure
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an I/O error with operation and key context.
    ///
    /// `NotFound` I/O errors get their own variant.
    pub fn io(operation: &'static str, key: impl Into<String>, source: io::Error) -> Self {
        let key = key.into();
        if source.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound { operation, key }
        } else {
            StorageError::Io {
                operation,
                key,
                source,
            }
        }
    }

    /// Returns true if the key did not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    /// Returns true if the key was rejected before any I/O
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, StorageError::InvalidKey { .. })
    }

    /// The key the failing operation was applied to
    pub fn key(&self) -> &str {
        match self {
            StorageError::InvalidKey { key, .. }
            | StorageError::NotFound { key, .. }
            | StorageError::Io { key, .. } => key,
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            StorageError::InvalidKey { .. } => 400,
            StorageError::NotFound { .. } => 404,
            StorageError::Io { .. } => 503,
        }
    }
}
