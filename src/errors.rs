//! Error taxonomy shared by the mid-level components.
//!
//! Low-level errors ([`StorageError`], [`LockError`]) carry operation and key
//! context; this module translates them into the five kinds callers act on.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::lock::LockError;
use crate::storage::StorageError;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Boxed underlying cause
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Externally visible classification of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The requested thing does not exist
    Missing,
    /// The request was malformed or violates a precondition
    Rejected,
    /// Transient failure; retrying may succeed
    Unavailable,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Missing => "missing",
            ErrorCategory::Rejected => "rejected",
            ErrorCategory::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Vault errors
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage {operation} failed for '{key}': {source}")]
    Storage {
        operation: String,
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Timed out acquiring lock on '{resource}' after {attempts} attempts")]
    LockTimeout { resource: String, attempts: u32 },

    #[error("Document {api_id}@{version} unavailable: {source}")]
    DocumentUnavailable {
        api_id: String,
        version: String,
        missing: bool,
        #[source]
        source: BoxedCause,
    },
}

impl VaultError {
    pub fn validation(message: impl Into<String>) -> Self {
        VaultError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        VaultError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        VaultError::Conflict(message.into())
    }

    /// Translate a storage error, tagging it with the logical operation.
    ///
    /// Key validation failures stay validation errors.
    pub fn storage(operation: &str, error: StorageError) -> Self {
        match error {
            StorageError::InvalidKey { key, reason } => {
                VaultError::Validation(format!("invalid key '{}': {}", key, reason))
            }
            other => VaultError::Storage {
                operation: operation.to_string(),
                key: other.key().to_string(),
                source: other,
            },
        }
    }

    /// Stored bytes at `key` could not be decoded
    pub fn corrupt(operation: &str, key: &str, cause: impl fmt::Display) -> Self {
        VaultError::Storage {
            operation: operation.to_string(),
            key: key.to_string(),
            source: StorageError::Io {
                operation: "decode",
                key: key.to_string(),
                source: io::Error::new(io::ErrorKind::InvalidData, cause.to_string()),
            },
        }
    }

    /// Externally visible category
    pub fn category(&self) -> ErrorCategory {
        match self {
            VaultError::NotFound(_) => ErrorCategory::Missing,
            VaultError::Validation(_) | VaultError::Conflict(_) => ErrorCategory::Rejected,
            VaultError::Storage { .. } | VaultError::LockTimeout { .. } => {
                ErrorCategory::Unavailable
            }
            VaultError::DocumentUnavailable { missing: true, .. } => ErrorCategory::Missing,
            VaultError::DocumentUnavailable { missing: false, .. } => ErrorCategory::Unavailable,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::Validation(_) => "VALIDATION_ERROR",
            VaultError::NotFound(_) => "NOT_FOUND",
            VaultError::Conflict(_) => "CONFLICT",
            VaultError::Storage { .. } => "STORAGE_ERROR",
            VaultError::LockTimeout { .. } => "LOCK_TIMEOUT",
            VaultError::DocumentUnavailable { .. } => "DOCUMENT_UNAVAILABLE",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            VaultError::Validation(_) => 400,
            VaultError::NotFound(_) => 404,
            VaultError::Conflict(_) => 409,
            VaultError::Storage { .. } => 503,
            VaultError::LockTimeout { .. } => 503,
            VaultError::DocumentUnavailable { missing: true, .. } => 404,
            VaultError::DocumentUnavailable { missing: false, .. } => 422,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VaultError::NotFound(_) | VaultError::DocumentUnavailable { missing: true, .. }
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, VaultError::Conflict(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, VaultError::Validation(_))
    }
}

impl From<LockError> for VaultError {
    fn from(error: LockError) -> Self {
        match error {
            LockError::Timeout { resource, attempts } => {
                VaultError::LockTimeout { resource, attempts }
            }
            LockError::InvalidResource(inner) => VaultError::storage("lock", inner),
            LockError::Io {
                operation,
                resource,
                source,
            } => VaultError::Storage {
                operation: format!("lock:{}", operation),
                key: resource.clone(),
                source: StorageError::Io {
                    operation,
                    key: resource,
                    source,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(VaultError::not_found("x").category(), ErrorCategory::Missing);
        assert_eq!(VaultError::validation("x").category(), ErrorCategory::Rejected);
        assert_eq!(VaultError::conflict("x").category(), ErrorCategory::Rejected);
        let timeout = VaultError::LockTimeout {
            resource: "r".into(),
            attempts: 3,
        };
        assert_eq!(timeout.category(), ErrorCategory::Unavailable);
        assert_eq!(timeout.category().as_str(), "unavailable");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(VaultError::not_found("x").status_code(), 404);
        assert_eq!(VaultError::conflict("x").status_code(), 409);
        assert_eq!(VaultError::validation("x").status_code(), 400);
    }

    #[test]
    fn test_invalid_key_becomes_validation() {
        let err = VaultError::storage(
            "save_spec",
            StorageError::invalid_key("../x", "parent directory traversal is not allowed"),
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_storage_error_tagged_with_operation() {
        let err = VaultError::storage(
            "delete_spec",
            StorageError::io(
                "delete",
                "a/v1/spec.yaml",
                io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            ),
        );
        match err {
            VaultError::Storage { operation, key, .. } => {
                assert_eq!(operation, "delete_spec");
                assert_eq!(key, "a/v1/spec.yaml");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_lock_timeout_translation() {
        let err: VaultError = LockError::Timeout {
            resource: "billing-api".into(),
            attempts: 10,
        }
        .into();
        assert!(matches!(err, VaultError::LockTimeout { attempts: 10, .. }));
    }
}
