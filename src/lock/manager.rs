//! Lease-based lock manager
//!
//! A lock is a file `.locks/<resource>.lock` created with exclusive-create
//! semantics. Its content is a [`Lease`]; a lease older than the staleness
//! threshold is treated as abandoned and may be broken by another caller.
//! A lock file with no readable lease (holder crashed between create and
//! write) is judged by its modification time instead.
//!
//! Breaking is serialized per resource through a short-lived
//! `<resource>.lock.breaking` file. The breaker moves the stale file aside
//! under a unique name, re-checks that it moved the holder it judged stale,
//! and only then deletes it. A lock is only ever removed by its owner or
//! through this path.
//!
//! Acquisition retries with exponential backoff (plus jitter) for a bounded
//! number of attempts, then fails with [`LockError::Timeout`].

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::errors::{LockError, LockResult};
use super::lease::Lease;
use crate::observability::{log_event_with_fields, Event};
use crate::storage::resolve_key;

/// Directory under the storage root holding lock files
pub const LOCK_DIR: &str = ".locks";

/// Lock timing configuration
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Age after which a lease is considered abandoned
    pub stale_after: Duration,
    /// Maximum acquisition attempts
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles each retry
    pub base_backoff: Duration,
    /// Backoff ceiling
    pub max_backoff: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(30),
            max_attempts: 10,
            base_backoff: Duration::from_millis(25),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl LockConfig {
    /// Backoff to sleep after the given failed attempt (0-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        let backoff = self.base_backoff.saturating_mul(factor);
        backoff.min(self.max_backoff)
    }
}

/// Lease-based mutual exclusion over storage resources
#[derive(Debug, Clone)]
pub struct LockManager {
    root: PathBuf,
    config: LockConfig,
}

impl LockManager {
    /// Create a lock manager storing its lock files under `root`
    pub fn new(root: impl Into<PathBuf>, config: LockConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    fn lock_path(&self, resource: &str) -> LockResult<PathBuf> {
        let key = format!("{}/{}.lock", LOCK_DIR, resource.trim_end_matches('/'));
        Ok(resolve_key(&self.root, &key)?)
    }

    /// Run `operation` while holding the lock on `resource`.
    ///
    /// The lock is released on every exit path: success, error, or the
    /// returned future being dropped before completion.
    pub async fn with_lock<F, Fut, T, E>(&self, resource: &str, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let guard = self.acquire(resource).await?;
        let result = operation().await;
        guard.release().await;
        result
    }

    /// Acquire the lock on `resource`, retrying with backoff.
    pub async fn acquire(&self, resource: &str) -> LockResult<LockGuard> {
        let path = self.lock_path(resource)?;
        let stale_after = chrono::Duration::from_std(self.config.stale_after)
            .unwrap_or_else(|_| chrono::Duration::seconds(30));

        for attempt in 0..self.config.max_attempts {
            let mut broke_stale = false;
            loop {
                let lease = Lease::new();
                match self.try_create(&path, &lease).await {
                    Ok(()) => {
                        log_event_with_fields(
                            Event::LockAcquired,
                            &[
                                ("attempt", &(attempt + 1).to_string()),
                                ("owner", &lease.owner.to_string()),
                                ("resource", resource),
                            ],
                        );
                        return Ok(LockGuard {
                            path,
                            resource: resource.to_string(),
                            owner: lease.owner,
                            released: false,
                        });
                    }
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                        // One immediate retry per attempt once the holder is gone
                        if !broke_stale && self.break_if_stale(&path, resource, stale_after).await? {
                            broke_stale = true;
                            continue;
                        }
                        log_event_with_fields(
                            Event::LockContended,
                            &[("attempt", &(attempt + 1).to_string()), ("resource", resource)],
                        );
                        break;
                    }
                    Err(e) => return Err(LockError::io("acquire", resource, e)),
                }
            }

            if attempt + 1 < self.config.max_attempts {
                tokio::time::sleep(self.jittered(attempt)).await;
            }
        }

        log_event_with_fields(
            Event::LockTimeout,
            &[
                ("attempts", &self.config.max_attempts.to_string()),
                ("resource", resource),
            ],
        );
        Err(LockError::Timeout {
            resource: resource.to_string(),
            attempts: self.config.max_attempts,
        })
    }

    fn jittered(&self, attempt: u32) -> Duration {
        let backoff = self.config.backoff_for(attempt);
        let jitter_cap = (self.config.base_backoff.as_millis() as u64 / 2).max(1);
        let jitter = rand::thread_rng().gen_range(0..jitter_cap);
        (backoff + Duration::from_millis(jitter)).min(self.config.max_backoff)
    }

    async fn try_create(&self, path: &Path, lease: &Lease) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;

        let written = async {
            file.write_all(&lease.to_bytes()).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(path).await;
            return Err(e);
        }
        Ok(())
    }

    /// Clear the lock file if its holder is stale. Returns true if the path
    /// is free to retry: the stale holder was removed, or the file was
    /// already gone.
    async fn break_if_stale(
        &self,
        path: &Path,
        resource: &str,
        stale_after: chrono::Duration,
    ) -> LockResult<bool> {
        let inspect_err = |e: io::Error| LockError::io("inspect", resource, e);

        match inspect(path).await.map_err(inspect_err)? {
            None => return Ok(true),
            Some(holder) if !holder.is_stale(Utc::now(), stale_after) => return Ok(false),
            Some(_) => {}
        }

        let breaker_path = breaker_path_for(path);
        let breaker = Lease::new();
        match self.try_create(&breaker_path, &breaker).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                // Another caller is breaking; clear its marker only if it died mid-break
                if let Some(marker) = inspect(&breaker_path).await.map_err(inspect_err)? {
                    if marker.is_stale(Utc::now(), stale_after) {
                        evict(&breaker_path, &marker, stale_after)
                            .await
                            .map_err(|e| LockError::io("break", resource, e))?;
                    }
                }
                return Ok(false);
            }
            Err(e) => return Err(LockError::io("break", resource, e)),
        }

        let outcome = self.break_serialized(path, resource, stale_after).await;
        if let Err(e) = LockGuard::remove_if_owned(&breaker_path, breaker.owner).await {
            LockGuard::report_release_failure(resource, &e);
        }
        outcome
    }

    /// Body of [`Self::break_if_stale`], run while holding the breaker marker
    async fn break_serialized(
        &self,
        path: &Path,
        resource: &str,
        stale_after: chrono::Duration,
    ) -> LockResult<bool> {
        // Re-judge: the holder may have released and been replaced meanwhile
        let holder = match inspect(path)
            .await
            .map_err(|e| LockError::io("inspect", resource, e))?
        {
            None => return Ok(true),
            Some(holder) if !holder.is_stale(Utc::now(), stale_after) => return Ok(false),
            Some(holder) => holder,
        };

        let broken = evict(path, &holder, stale_after)
            .await
            .map_err(|e| LockError::io("break", resource, e))?;
        if broken {
            let age_ms = holder.age(Utc::now()).num_milliseconds().to_string();
            log_event_with_fields(
                Event::LockStaleBroken,
                &[
                    ("age_ms", &age_ms),
                    ("owner", &holder.owner_label()),
                    ("resource", resource),
                ],
            );
        }
        Ok(broken)
    }

    /// Best-effort check whether `resource` is currently locked by a live
    /// lease. Never fails: any error reads as "not locked".
    pub async fn is_locked(&self, resource: &str) -> bool {
        let Ok(path) = self.lock_path(resource) else {
            return false;
        };
        let stale_after = match chrono::Duration::from_std(self.config.stale_after) {
            Ok(d) => d,
            Err(_) => return false,
        };
        match inspect(&path).await {
            Ok(Some(holder)) => !holder.is_stale(Utc::now(), stale_after),
            _ => false,
        }
    }

    /// Administrative override: remove the lock on `resource` regardless of
    /// holder. Returns whether a lock file was removed.
    pub async fn force_unlock(&self, resource: &str) -> LockResult<bool> {
        let path = self.lock_path(resource)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                log_event_with_fields(Event::LockForced, &[("resource", resource)]);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LockError::io("force_unlock", resource, e)),
        }
    }
}

/// What a lock file held when it was inspected
#[derive(Debug, Clone, PartialEq, Eq)]
enum Holder {
    Leased(Lease),
    /// Empty or torn lease; only the file's mtime is known
    Unreadable { modified: DateTime<Utc> },
}

impl Holder {
    fn since(&self) -> DateTime<Utc> {
        match self {
            Holder::Leased(lease) => lease.acquired_at,
            Holder::Unreadable { modified } => *modified,
        }
    }

    fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.since()
    }

    fn is_stale(&self, now: DateTime<Utc>, stale_after: chrono::Duration) -> bool {
        self.age(now) > stale_after
    }

    fn same_holder(&self, other: &Holder) -> bool {
        match (self, other) {
            (Holder::Leased(a), Holder::Leased(b)) => a.owner == b.owner,
            (Holder::Unreadable { .. }, Holder::Unreadable { .. }) => true,
            _ => false,
        }
    }

    fn owner_label(&self) -> String {
        match self {
            Holder::Leased(lease) => lease.owner.to_string(),
            Holder::Unreadable { .. } => "unknown".to_string(),
        }
    }
}

async fn inspect(path: &Path) -> io::Result<Option<Holder>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    if let Some(lease) = Lease::from_bytes(&bytes) {
        return Ok(Some(Holder::Leased(lease)));
    }
    match fs::metadata(path).await {
        Ok(meta) => Ok(Some(Holder::Unreadable {
            modified: DateTime::<Utc>::from(meta.modified()?),
        })),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn breaker_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".breaking");
    PathBuf::from(name)
}

fn parked_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.broken", name, Uuid::new_v4().simple()))
}

/// Move `path` aside and delete it if it still holds `expected`, stale.
///
/// Rename is atomic, so whatever is parked is exactly what was at `path`.
/// A holder that is not the one judged stale is linked back into place;
/// the link fails rather than overwrite a lock created in the meantime.
/// Returns true if `path` was freed.
async fn evict(path: &Path, expected: &Holder, stale_after: chrono::Duration) -> io::Result<bool> {
    let parked = parked_path_for(path);
    match fs::rename(path, &parked).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    }

    let confirmed = match inspect(&parked).await? {
        Some(moved) => moved.same_holder(expected) && moved.is_stale(Utc::now(), stale_after),
        None => true,
    };
    if !confirmed {
        match fs::hard_link(&parked, path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }

    match fs::remove_file(&parked).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    Ok(confirmed)
}

/// Held lock. Released explicitly via [`LockGuard::release`], or on drop if
/// the holder never got that far (error unwinding, task cancellation).
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    resource: String,
    owner: Uuid,
    released: bool,
}

impl LockGuard {
    /// The locked resource
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Release the lock. Failures are logged, never returned: the lease
    /// will expire on its own.
    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = Self::remove_if_owned(&self.path, self.owner).await {
            Self::report_release_failure(&self.resource, &e);
            return;
        }
        log_event_with_fields(Event::LockReleased, &[("resource", &self.resource)]);
    }

    async fn remove_if_owned(path: &Path, owner: Uuid) -> io::Result<()> {
        match fs::read(path).await {
            Ok(bytes) => match Lease::from_bytes(&bytes) {
                Some(lease) if lease.owner == owner => fs::remove_file(path).await,
                // Our lease was broken as stale and someone else holds it now
                _ => Ok(()),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn report_release_failure(resource: &str, error: &io::Error) {
        log_event_with_fields(
            Event::LockReleaseFailed,
            &[("error", &error.to_string()), ("resource", resource)],
        );
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let result = match std::fs::read(&self.path) {
            Ok(bytes) => match Lease::from_bytes(&bytes) {
                Some(lease) if lease.owner == self.owner => std::fs::remove_file(&self.path),
                _ => Ok(()),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            Self::report_release_failure(&self.resource, &e);
        }
    }
}
