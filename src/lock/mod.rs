//! Lock manager
//!
//! Lease-based mutual exclusion over storage resources, used to keep two
//! processes from interleaving a read-modify-write on the same document.
//!
//! Locking is a caller contract: the spec store does not take locks on its
//! own. Every mutating workflow wraps its load, mutate and save sequence in
//! [`LockManager::with_lock`] keyed to the same resource path.

mod errors;
mod lease;
mod manager;

pub use errors::{LockError, LockResult};
pub use lease::Lease;
pub use manager::{LockConfig, LockGuard, LockManager, LOCK_DIR};
