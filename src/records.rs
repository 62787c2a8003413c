//! JSON record helpers over a storage backend.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{VaultError, VaultResult};
use crate::storage::StorageBackend;

/// Read and decode the JSON record at `key`; `None` if absent.
pub(crate) async fn load_record<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    operation: &str,
    key: &str,
) -> VaultResult<Option<T>> {
    let bytes = match backend.read(key).await {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(VaultError::storage(operation, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| VaultError::corrupt(operation, key, e))
}

/// Encode `record` as pretty JSON and write it atomically to `key`.
pub(crate) async fn save_record<T: Serialize + ?Sized>(
    backend: &dyn StorageBackend,
    operation: &str,
    key: &str,
    record: &T,
) -> VaultResult<()> {
    let bytes =
        serde_json::to_vec_pretty(record).map_err(|e| VaultError::corrupt(operation, key, e))?;
    backend
        .write(key, &bytes)
        .await
        .map_err(|e| VaultError::storage(operation, e))
}
