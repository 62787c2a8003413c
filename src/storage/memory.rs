//! In-memory backend for testing.
//!
//! Applies the same key validation as [`super::LocalBackend`] so tests
//! exercise the same rejection paths.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

use super::backend::{BoxFuture, StorageBackend};
use super::errors::{StorageError, StorageResult};
use super::key::{resolve_key, resolve_prefix};

const VIRTUAL_ROOT: &str = "/";

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a key through the shared validation rules
    fn normalize(key: &str) -> StorageResult<String> {
        let path = resolve_key(Path::new(VIRTUAL_ROOT), key)?;
        Ok(path.to_string_lossy().trim_start_matches('/').to_string())
    }

    fn poisoned(operation: &'static str, key: &str) -> StorageError {
        StorageError::io(
            operation,
            key,
            std::io::Error::new(std::io::ErrorKind::Other, "lock poisoned"),
        )
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryBackend {
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<Vec<u8>>> {
        Box::pin(async move {
            let normalized = Self::normalize(key)?;
            let objects = self.objects.read().map_err(|_| Self::poisoned("read", key))?;
            objects
                .get(&normalized)
                .cloned()
                .ok_or_else(|| StorageError::NotFound {
                    operation: "read",
                    key: key.to_string(),
                })
        })
    }

    fn write<'a>(&'a self, key: &'a str, data: &'a [u8]) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            let normalized = Self::normalize(key)?;
            let mut objects = self.objects.write().map_err(|_| Self::poisoned("write", key))?;
            objects.insert(normalized, data.to_vec());
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            let normalized = Self::normalize(key)?;
            let mut objects = self.objects.write().map_err(|_| Self::poisoned("delete", key))?;
            objects
                .remove(&normalized)
                .map(|_| ())
                .ok_or_else(|| StorageError::NotFound {
                    operation: "delete",
                    key: key.to_string(),
                })
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<bool>> {
        Box::pin(async move {
            let normalized = Self::normalize(key)?;
            let objects = self.objects.read().map_err(|_| Self::poisoned("exists", key))?;
            Ok(objects.contains_key(&normalized))
        })
    }

    fn list<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let path = resolve_prefix(Path::new(VIRTUAL_ROOT), prefix)?;
            let normalized = path.to_string_lossy().trim_start_matches('/').to_string();
            let objects = self.objects.read().map_err(|_| Self::poisoned("list", prefix))?;

            // BTreeMap iteration is already sorted
            Ok(objects
                .keys()
                .filter(|k| {
                    normalized.is_empty()
                        || *k == &normalized
                        || k.starts_with(&format!("{}/", normalized))
                })
                .cloned()
                .collect())
        })
    }

    fn ensure_directory<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            // Directories are implicit in a flat key space
            Self::normalize(path).map(|_| ())
        })
    }
}
