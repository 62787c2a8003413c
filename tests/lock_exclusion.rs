//! Lock manager tests
//!
//! - Two holders of the same resource never overlap, even across managers
//! - Acquisition gives up with a typed timeout
//! - Abandoned leases are broken once stale
//! - A cancelled holder releases its lease

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use apivault::lock::{LockConfig, LockError, LockManager};
use apivault::{ErrorCategory, VaultError};

use common::{create_temp_data_dir, fast_lock_config};

#[tokio::test]
async fn test_with_lock_never_overlaps() {
    let temp_dir = create_temp_data_dir();
    let in_flight = Arc::new(AtomicBool::new(false));
    let completed = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..2 {
        // Separate managers stand in for separate processes
        let manager = LockManager::new(temp_dir.path(), fast_lock_config());
        let in_flight = in_flight.clone();
        let completed = completed.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..10 {
                manager
                    .with_lock("billing-api/v1.0.0", || async {
                        assert!(
                            !in_flight.swap(true, Ordering::SeqCst),
                            "two holders inside the critical section"
                        );
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        in_flight.store(false, Ordering::SeqCst);
                        completed.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, LockError>(())
                    })
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(completed.load(Ordering::SeqCst), 20);
}

#[tokio::test]
async fn test_timeout_is_typed() {
    let temp_dir = create_temp_data_dir();
    let holder = LockManager::new(temp_dir.path(), fast_lock_config());
    let impatient = LockManager::new(
        temp_dir.path(),
        LockConfig {
            max_attempts: 3,
            ..fast_lock_config()
        },
    );

    let guard = holder.acquire("billing-api").await.unwrap();
    assert!(impatient.is_locked("billing-api").await);

    let err = impatient.acquire("billing-api").await.unwrap_err();
    assert!(err.is_timeout());
    let err: VaultError = err.into();
    assert_eq!(err.category(), ErrorCategory::Unavailable);

    guard.release().await;
    assert!(!impatient.is_locked("billing-api").await);
    impatient.acquire("billing-api").await.unwrap().release().await;
}

#[tokio::test]
async fn test_abandoned_lease_is_broken() {
    let temp_dir = create_temp_data_dir();
    let config = LockConfig {
        stale_after: Duration::from_millis(50),
        ..fast_lock_config()
    };
    let crashed = LockManager::new(temp_dir.path(), config.clone());
    let survivor = LockManager::new(temp_dir.path(), config);

    // Never released: the holder "crashed"
    std::mem::forget(crashed.acquire("billing-api").await.unwrap());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!survivor.is_locked("billing-api").await);
    let guard = survivor.acquire("billing-api").await.unwrap();
    guard.release().await;
}

#[tokio::test]
async fn test_cancelled_holder_releases() {
    let temp_dir = create_temp_data_dir();
    let manager = LockManager::new(temp_dir.path(), fast_lock_config());

    let slow = manager.with_lock("billing-api", || async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<_, LockError>(())
    });
    assert!(tokio::time::timeout(Duration::from_millis(50), slow)
        .await
        .is_err());

    assert!(!manager.is_locked("billing-api").await);
}

#[tokio::test]
async fn test_error_inside_operation_releases() {
    let temp_dir = create_temp_data_dir();
    let manager = LockManager::new(temp_dir.path(), fast_lock_config());

    let result: Result<(), VaultError> = manager
        .with_lock("billing-api", || async {
            Err(VaultError::conflict("precondition failed"))
        })
        .await;
    assert!(result.unwrap_err().is_conflict());
    assert!(!manager.is_locked("billing-api").await);
}

#[tokio::test]
async fn test_force_unlock_and_is_locked_never_fail() {
    let temp_dir = create_temp_data_dir();
    let manager = LockManager::new(temp_dir.path(), fast_lock_config());

    assert!(!manager.is_locked("never-locked").await);
    assert!(!manager.is_locked("../outside").await);
    assert!(!manager.force_unlock("never-locked").await.unwrap());

    let guard = manager.acquire("billing-api").await.unwrap();
    assert!(manager.force_unlock("billing-api").await.unwrap());
    assert!(!manager.is_locked("billing-api").await);
    // The released guard must not remove someone else's lease
    let next = manager.acquire("billing-api").await.unwrap();
    guard.release().await;
    assert!(manager.is_locked("billing-api").await);
    next.release().await;
}
