//! apivault - a versioned, audited store for API specification documents
//!
//! Documents are kept as immutable named versions with lineage, current and
//! stable pointers, and an append-only audit trail. Two versions can be
//! diffed structurally into added / modified / deleted endpoints and schemas
//! with breaking changes called out.

pub mod audit;
pub mod cli;
pub mod config;
pub mod diff;
pub mod errors;
pub mod ids;
pub mod layout;
pub mod lint;
pub mod lock;
pub mod observability;
mod records;
pub mod registry;
pub mod spec;
pub mod storage;
pub mod tree;
pub mod vault;

pub use errors::{ErrorCategory, VaultError, VaultResult};
pub use ids::{ApiId, VersionTag};
pub use vault::ApiVault;
