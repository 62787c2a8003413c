//! Atomic write and key validation tests
//!
//! - A failure between temp write and rename never leaves the destination
//!   partially written, and never leaves the temp file behind
//! - A concurrent reader sees only old or new content
//! - Traversal keys are rejected before any filesystem call

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use apivault::storage::fault::points;
use apivault::storage::{LocalBackend, StorageBackend};
use apivault::VaultError;

use common::create_temp_data_dir;

fn leftover_temp_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect()
}

#[tokio::test]
async fn test_fault_after_temp_write_leaves_destination_intact() {
    let temp_dir = create_temp_data_dir();
    let backend = LocalBackend::new(temp_dir.path());
    let key = "billing-api/v1.0.0/spec.yaml";

    backend.write(key, b"openapi: 3.0.3\n").await.unwrap();

    backend.faults().arm(points::STORAGE_AFTER_TEMP_WRITE);
    let result = backend.write(key, b"openapi: 3.1.0\ninfo: {}\n").await;
    backend.faults().disarm(points::STORAGE_AFTER_TEMP_WRITE);

    assert!(result.is_err(), "armed fault must fail the write");
    assert_eq!(backend.read(key).await.unwrap(), b"openapi: 3.0.3\n");
    assert!(leftover_temp_files(&temp_dir.path().join("billing-api/v1.0.0")).is_empty());
}

#[tokio::test]
async fn test_fault_on_first_write_creates_nothing() {
    let temp_dir = create_temp_data_dir();
    let backend = LocalBackend::new(temp_dir.path());
    let key = "billing-api/metadata.json";

    backend.faults().arm(points::STORAGE_BEFORE_RENAME);
    assert!(backend.write(key, b"{}").await.is_err());
    backend.faults().disarm(points::STORAGE_BEFORE_RENAME);

    assert!(!backend.exists(key).await.unwrap());
    assert!(leftover_temp_files(&temp_dir.path().join("billing-api")).is_empty());
    assert!(backend.list("").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_reader_sees_old_or_new() {
    let temp_dir = create_temp_data_dir();
    let backend = Arc::new(LocalBackend::new(temp_dir.path()));
    let key = "billing-api/v1.0.0/spec.json".to_string();

    let old = vec![b'a'; 64 * 1024];
    let new = vec![b'b'; 96 * 1024];
    backend.write(&key, &old).await.unwrap();

    let writer = {
        let backend = backend.clone();
        let key = key.clone();
        let (old, new) = (old.clone(), new.clone());
        tokio::spawn(async move {
            for i in 0..50 {
                let data = if i % 2 == 0 { &new } else { &old };
                backend.write(&key, data).await.unwrap();
            }
        })
    };

    let reader = {
        let backend = backend.clone();
        let key = key.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                let seen = backend.read(&key).await.unwrap();
                let whole_old = seen.len() == old.len() && seen.iter().all(|b| *b == b'a');
                let whole_new = seen.len() == new.len() && seen.iter().all(|b| *b == b'b');
                assert!(whole_old || whole_new, "reader saw a torn write of {} bytes", seen.len());
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
}

#[tokio::test]
async fn test_traversal_key_rejected_before_io() {
    let temp_dir = create_temp_data_dir();
    let root = temp_dir.path().join("vault");
    let backend = LocalBackend::new(&root);

    let err = backend.write("../../etc/passwd", b"x").await.unwrap_err();
    assert!(err.is_invalid_key());
    assert!(!root.exists(), "no filesystem call may happen for a rejected key");

    let vault_err = VaultError::storage("write", err);
    assert!(vault_err.is_validation());

    for bad in ["", "/etc/passwd", "a/../../b", "a/b\0c"] {
        assert!(
            backend.read(bad).await.unwrap_err().is_invalid_key(),
            "{:?} should be rejected",
            bad
        );
    }
}
