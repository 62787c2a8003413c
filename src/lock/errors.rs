//! Lock manager errors

use std::io;

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Lock manager errors
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Timed out acquiring lock on '{resource}' after {attempts} attempts")]
    Timeout { resource: String, attempts: u32 },

    #[error("Invalid lock resource: {0}")]
    InvalidResource(#[from] StorageError),

    #[error("Lock {operation} failed for '{resource}': {source}")]
    Io {
        operation: &'static str,
        resource: String,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    pub(crate) fn io(operation: &'static str, resource: &str, source: io::Error) -> Self {
        LockError::Io {
            operation,
            resource: resource.to_string(),
            source,
        }
    }

    /// Returns true if the retry budget was exhausted
    pub fn is_timeout(&self) -> bool {
        matches!(self, LockError::Timeout { .. })
    }
}
