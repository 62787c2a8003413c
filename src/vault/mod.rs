//! Vault facade and boundary request type.

mod request;
#[allow(clippy::module_inception)]
mod vault;

pub use request::{CreateApi, CreateVersion, VaultRequest, VersionSource};
pub use vault::{ApiVault, ValidationReport};
