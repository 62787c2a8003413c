//! On-disk layout.
//!
//! ```text
//! {id}/metadata.json            document metadata
//! {id}/audit.json               audit log (JSON array, append order)
//! {id}/{version}/spec.yaml      content (or spec.json)
//! {id}/{version}/metadata.json  version metadata
//! .locks/...                    lease files
//! ```

use crate::ids::{ApiId, VersionTag};
use crate::spec::SpecFormat;

pub const METADATA_FILE: &str = "metadata.json";
pub const AUDIT_FILE: &str = "audit.json";
pub const SPEC_STEM: &str = "spec";

pub fn api_dir(id: &ApiId) -> String {
    id.as_str().to_string()
}

pub fn api_metadata_key(id: &ApiId) -> String {
    format!("{}/{}", id, METADATA_FILE)
}

pub fn audit_key(id: &ApiId) -> String {
    format!("{}/{}", id, AUDIT_FILE)
}

pub fn version_dir(id: &ApiId, version: &VersionTag) -> String {
    format!("{}/{}", id, version)
}

pub fn version_metadata_key(id: &ApiId, version: &VersionTag) -> String {
    format!("{}/{}/{}", id, version, METADATA_FILE)
}

pub fn spec_key(id: &ApiId, version: &VersionTag, format: SpecFormat) -> String {
    format!("{}/{}/{}.{}", id, version, SPEC_STEM, format.extension())
}

/// Lock resource guarding a document's metadata
pub fn document_resource(id: &ApiId) -> String {
    id.as_str().to_string()
}

/// Lock resource guarding one version's content and metadata
pub fn version_resource(id: &ApiId, version: &VersionTag) -> String {
    version_dir(id, version)
}

/// Lock resource guarding a document's audit log
pub fn audit_resource(id: &ApiId) -> String {
    format!("{}/audit", id)
}

/// Identifier from a `{id}/metadata.json` key, if it is one
pub fn api_id_from_metadata_key(key: &str) -> Option<ApiId> {
    let (id, file) = key.split_once('/')?;
    if file != METADATA_FILE {
        return None;
    }
    ApiId::new(id).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        let id = ApiId::new("billing-api").unwrap();
        let v = VersionTag::new("v1.0.0").unwrap();
        assert_eq!(api_metadata_key(&id), "billing-api/metadata.json");
        assert_eq!(spec_key(&id, &v, SpecFormat::Yaml), "billing-api/v1.0.0/spec.yaml");
        assert_eq!(version_metadata_key(&id, &v), "billing-api/v1.0.0/metadata.json");
        assert_eq!(audit_key(&id), "billing-api/audit.json");
    }

    #[test]
    fn test_api_id_from_metadata_key() {
        assert_eq!(
            api_id_from_metadata_key("billing-api/metadata.json").unwrap().as_str(),
            "billing-api"
        );
        assert!(api_id_from_metadata_key("billing-api/v1.0.0/metadata.json").is_none());
        assert!(api_id_from_metadata_key("billing-api/audit.json").is_none());
        assert!(api_id_from_metadata_key(".locks/metadata.json").is_none());
    }
}
