//! Storage provider
//!
//! Key to byte-string persistence under a single root. Keys are
//! `/`-separated relative paths, validated before any I/O.
//!
//! # Guarantees
//!
//! - Writes are atomic (temp file + rename); readers never observe a
//!   partially written value
//! - Invalid keys fail with [`StorageError::InvalidKey`], distinct from I/O
//!   failures
//! - No caching: every call goes to the medium

mod backend;
mod errors;
pub mod fault;
mod key;
mod local;
mod memory;

pub use backend::{BoxFuture, StorageBackend};
pub use errors::{StorageError, StorageResult};
pub use fault::FaultPoints;
pub use key::{path_to_key, resolve_key};
pub use local::LocalBackend;
pub use memory::MemoryBackend;
