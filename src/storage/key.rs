//! Storage key validation.
//!
//! Keys are `/`-separated relative paths under the storage root. They are
//! validated before any filesystem call is made.

use std::path::{Component, Path, PathBuf};

use super::errors::{StorageError, StorageResult};

/// Resolve a key to a path under `root`.
///
/// Rejects empty keys, parent-directory segments, absolute keys and
/// anything else that would land outside `root`.
pub fn resolve_key(root: &Path, key: &str) -> StorageResult<PathBuf> {
    if key.trim().is_empty() {
        return Err(StorageError::invalid_key(key, "key must not be empty"));
    }
    resolve(root, key)
}

/// Resolve a listing prefix. An empty prefix means the whole root.
pub fn resolve_prefix(root: &Path, prefix: &str) -> StorageResult<PathBuf> {
    if prefix.is_empty() {
        return Ok(root.to_path_buf());
    }
    resolve(root, prefix)
}

fn resolve(root: &Path, key: &str) -> StorageResult<PathBuf> {
    if key.contains('\0') {
        return Err(StorageError::invalid_key(key, "key contains a NUL byte"));
    }
    if key.starts_with('/') || key.starts_with('\\') {
        return Err(StorageError::invalid_key(key, "key must be relative"));
    }

    let mut resolved = root.to_path_buf();
    for segment in key.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(StorageError::invalid_key(
                    key,
                    "parent directory traversal is not allowed",
                ))
            }
            _ => {}
        }

        // A single segment must stay a single normal component
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => resolved.push(segment),
            _ => {
                return Err(StorageError::invalid_key(
                    key,
                    format!("segment '{}' resolves outside the storage root", segment),
                ))
            }
        }
    }

    if !resolved.starts_with(root) {
        return Err(StorageError::invalid_key(
            key,
            "key resolves outside the storage root",
        ));
    }

    Ok(resolved)
}

/// Convert a path under `root` back into a `/`-separated key.
pub fn path_to_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}
