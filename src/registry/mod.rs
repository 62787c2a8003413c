//! Version registry: document metadata, version lists and pointers.

mod metadata;
#[allow(clippy::module_inception)]
mod registry;

pub use metadata::{
    ApiMetadata, ApiMetadataPatch, ChangeSummary, ValidationSnapshot, VersionMetadata,
};
pub use registry::VersionRegistry;
