//! Lease record stored in a lock file

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content of a lock file: who holds it and since when.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lease {
    /// Unique token of this acquisition
    pub owner: Uuid,
    /// Process that acquired the lease
    pub pid: u32,
    /// Acquisition time
    pub acquired_at: DateTime<Utc>,
}

impl Lease {
    /// A fresh lease owned by the current process
    pub fn new() -> Self {
        Self {
            owner: Uuid::new_v4(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }

    /// Age of the lease at `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.acquired_at
    }

    /// A lease older than `stale_after` is considered abandoned
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        self.age(now) > stale_after
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Serializing a struct of plain fields cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }
}

impl Default for Lease {
    fn default() -> Self {
        Self::new()
    }
}
