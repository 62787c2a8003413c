//! # Local Filesystem Backend
//!
//! Writes are atomic: content goes to a uniquely named temp file in the
//! destination directory, is fsynced, then renamed over the destination.
//! A reader therefore sees either the old or the new content, never a mix.
//!
//! Keys are checked twice: textually by [`resolve_key`], then against the
//! real filesystem, so a symlink inside the root cannot lead outside it.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::backend::{BoxFuture, StorageBackend};
use super::errors::{StorageError, StorageResult};
use super::fault::{points, FaultPoints};
use super::key::{path_to_key, resolve_key, resolve_prefix};
use crate::observability::{log_event_with_fields, Event};

const TEMP_SUFFIX: &str = ".tmp";

/// Local filesystem storage backend
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
    faults: FaultPoints,
}

impl LocalBackend {
    /// Create a new local backend rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            faults: FaultPoints::new(),
        }
    }

    /// The storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fault points for this backend
    pub fn faults(&self) -> &FaultPoints {
        &self.faults
    }

    fn temp_path_for(dest: &Path) -> Option<PathBuf> {
        let parent = dest.parent()?;
        let name = dest.file_name()?.to_str()?;
        Some(parent.join(format!(".{}.{}{}", name, Uuid::new_v4().simple(), TEMP_SUFFIX)))
    }

    fn is_temp_file(name: &str) -> bool {
        name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
    }

    /// Resolve `key` and reject it if its nearest existing ancestor lies
    /// outside the canonical root.
    async fn confined(&self, key: &str) -> StorageResult<PathBuf> {
        let path = resolve_key(&self.root, key)?;
        let root = match fs::canonicalize(&self.root).await {
            Ok(root) => root,
            // Nothing exists yet, so nothing can point elsewhere
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(path),
            Err(e) => return Err(StorageError::io("resolve", key, e)),
        };

        let mut nearest = path.as_path();
        loop {
            match fs::canonicalize(nearest).await {
                Ok(real) if real.starts_with(&root) => return Ok(path),
                Ok(_) => {
                    return Err(StorageError::invalid_key(
                        key,
                        "key resolves outside the storage root through a symlink",
                    ))
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => match nearest.parent() {
                    Some(parent) if parent.starts_with(&self.root) => nearest = parent,
                    _ => return Ok(path),
                },
                Err(e) => return Err(StorageError::io("resolve", key, e)),
            }
        }
    }

    async fn write_atomic(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let dest = self.confined(key).await?;
        let parent = dest
            .parent()
            .ok_or_else(|| StorageError::invalid_key(key, "key has no parent directory"))?;

        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io("write", key, e))?;

        let temp = Self::temp_path_for(&dest)
            .ok_or_else(|| StorageError::invalid_key(key, "key has no file name"))?;

        if let Err(e) = self.write_temp_then_rename(&temp, &dest, data).await {
            self.cleanup_temp(key, &temp).await;
            return Err(StorageError::io("write", key, e));
        }

        log_event_with_fields(
            Event::StorageWrite,
            &[("bytes", &data.len().to_string()), ("key", key)],
        );
        Ok(())
    }

    async fn write_temp_then_rename(&self, temp: &Path, dest: &Path, data: &[u8]) -> io::Result<()> {
        self.faults.check(points::STORAGE_BEFORE_TEMP_WRITE)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(temp)
            .await?;
        file.write_all(data).await?;

        self.faults.check(points::STORAGE_AFTER_TEMP_WRITE)?;

        file.sync_all().await?;
        drop(file);

        self.faults.check(points::STORAGE_BEFORE_RENAME)?;

        fs::rename(temp, dest).await
    }

    /// Best-effort temp removal; a failure here is logged, never returned.
    async fn cleanup_temp(&self, key: &str, temp: &Path) {
        match fs::remove_file(temp).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                let temp_display = temp.display().to_string();
                log_event_with_fields(
                    Event::TempCleanupFailed,
                    &[
                        ("error", &e.to_string()),
                        ("key", key),
                        ("temp", &temp_display),
                    ],
                );
            }
        }
    }

    async fn list_recursive(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let start = resolve_prefix(&self.root, prefix)?;
        let mut results = Vec::new();

        match fs::metadata(&start).await {
            Ok(meta) if meta.is_file() => {
                if let Some(key) = path_to_key(&self.root, &start) {
                    results.push(key);
                }
                return Ok(results);
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(results),
            Err(e) => return Err(StorageError::io("list", prefix, e)),
        }

        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| StorageError::io("list", prefix, e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::io("list", prefix, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::io("list", prefix, e))?;

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let is_temp = entry
                        .file_name()
                        .to_str()
                        .map(Self::is_temp_file)
                        .unwrap_or(true);
                    if is_temp {
                        continue;
                    }
                    if let Some(key) = path_to_key(&self.root, &path) {
                        results.push(key);
                    }
                }
            }
        }

        results.sort();
        Ok(results)
    }
}

impl StorageBackend for LocalBackend {
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<Vec<u8>>> {
        Box::pin(async move {
            let path = self.confined(key).await?;
            fs::read(&path)
                .await
                .map_err(|e| StorageError::io("read", key, e))
        })
    }

    fn write<'a>(&'a self, key: &'a str, data: &'a [u8]) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(self.write_atomic(key, data))
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            let path = self.confined(key).await?;
            fs::remove_file(&path)
                .await
                .map_err(|e| StorageError::io("delete", key, e))?;
            log_event_with_fields(Event::StorageDelete, &[("key", key)]);
            Ok(())
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<bool>> {
        Box::pin(async move {
            let path = self.confined(key).await?;
            fs::try_exists(&path)
                .await
                .map_err(|e| StorageError::io("exists", key, e))
        })
    }

    fn list<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, StorageResult<Vec<String>>> {
        Box::pin(self.list_recursive(prefix))
    }

    fn ensure_directory<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            let dir = self.confined(path).await?;
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| StorageError::io("ensure_directory", path, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_read() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());

        backend.write("test.txt", b"hello").await.unwrap();
        let data = backend.read("test.txt").await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_nested_path() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());

        backend.write("a/b/c/file.txt", b"nested").await.unwrap();
        let data = backend.read("a/b/c/file.txt").await.unwrap();
        assert_eq!(data, b"nested");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());

        backend.write("doc.json", b"old").await.unwrap();
        backend.write("doc.json", b"new content").await.unwrap();
        assert_eq!(backend.read("doc.json").await.unwrap(), b"new content");
    }

    #[tokio::test]
    async fn test_delete() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());

        backend.write("delete-me.txt", b"bye").await.unwrap();
        assert!(backend.exists("delete-me.txt").await.unwrap());

        backend.delete("delete-me.txt").await.unwrap();
        assert!(!backend.exists("delete-me.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_not_found() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());

        let err = backend.read("nonexistent.txt").await.unwrap_err();
        assert!(err.is_not_found());

        let err = backend.delete("nonexistent.txt").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_is_recursive_and_sorted() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());

        backend.write("api/v2/spec.yaml", b"b").await.unwrap();
        backend.write("api/metadata.json", b"{}").await.unwrap();
        backend.write("api/v1/spec.yaml", b"a").await.unwrap();
        backend.write("other/metadata.json", b"{}").await.unwrap();

        let keys = backend.list("api").await.unwrap();
        assert_eq!(
            keys,
            vec!["api/metadata.json", "api/v1/spec.yaml", "api/v2/spec.yaml"]
        );

        let all = backend.list("").await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_list_missing_prefix_is_empty() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());
        assert!(backend.list("nothing-here").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_traversal_rejected_before_io() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().join("root"));

        let err = backend.write("../../etc/passwd", b"x").await.unwrap_err();
        assert!(err.is_invalid_key());
        // The root itself was never created, so no filesystem call happened
        assert!(!temp.path().join("root").exists());
    }

    #[tokio::test]
    async fn test_fault_before_rename_keeps_old_content() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());

        backend.write("doc.yaml", b"old").await.unwrap();
        backend.faults().arm(points::STORAGE_BEFORE_RENAME);

        let err = backend.write("doc.yaml", b"new").await.unwrap_err();
        assert!(matches!(err, StorageError::Io { operation: "write", .. }));
        assert_eq!(backend.read("doc.yaml").await.unwrap(), b"old");

        // Temp file was cleaned up
        let names: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["doc.yaml"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_root_rejected() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("escape")).unwrap();
        std::fs::write(outside.path().join("secret.json"), b"{}").unwrap();
        let backend = LocalBackend::new(temp.path());

        let err = backend.write("escape/evil.json", b"x").await.unwrap_err();
        assert!(err.is_invalid_key());
        assert!(!outside.path().join("evil.json").exists());

        assert!(backend.read("escape/secret.json").await.unwrap_err().is_invalid_key());
        assert!(backend.delete("escape/secret.json").await.unwrap_err().is_invalid_key());
        assert!(outside.path().join("secret.json").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_within_root_allowed() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("real")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("alias")).unwrap();
        let backend = LocalBackend::new(temp.path());

        backend.write("alias/doc.json", b"ok").await.unwrap();
        assert_eq!(backend.read("real/doc.json").await.unwrap(), b"ok");
    }

    #[tokio::test]
    async fn test_ensure_directory() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());

        backend.ensure_directory("api/v1.0.0").await.unwrap();
        assert!(temp.path().join("api/v1.0.0").is_dir());
    }
}
