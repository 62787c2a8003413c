//! # Storage Backend Trait

use std::future::Future;
use std::pin::Pin;

use super::errors::StorageResult;

/// Boxed future returned by backend operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Key to byte-string persistence.
///
/// Every call is a suspension point. Implementations validate keys before
/// touching the underlying medium and never expose partially written data.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Read the full content stored at `key`
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<Vec<u8>>>;

    /// Atomically replace the content stored at `key`
    fn write<'a>(&'a self, key: &'a str, data: &'a [u8]) -> BoxFuture<'a, StorageResult<()>>;

    /// Delete the content stored at `key`
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<()>>;

    /// Check whether `key` holds content
    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<bool>>;

    /// Recursively list keys under `prefix`, sorted
    fn list<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, StorageResult<Vec<String>>>;

    /// Make sure the directory `path` exists
    fn ensure_directory<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StorageResult<()>>;
}
