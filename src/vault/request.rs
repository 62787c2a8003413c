//! Boundary request type.
//!
//! One variant per operation, decoded and validated once. Dispatch is an
//! exhaustive `match`, so no handler re-checks which operation it serves.

use serde::{Deserialize, Serialize};

use crate::audit::AuditQuery;
use crate::ids::{ApiId, VersionTag};
use crate::registry::ApiMetadataPatch;
use crate::spec::SpecFormat;
use crate::tree::SpecTree;

/// Parameters for registering a new document with its first version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateApi {
    pub api_id: ApiId,
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: VersionTag,
    pub spec: SpecTree,
    #[serde(default)]
    pub format: Option<SpecFormat>,
    pub actor: String,
}

/// Where a new version's content comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VersionSource {
    /// Copy the content of an existing version, which becomes the parent
    Copy { from: VersionTag },
    /// Caller-supplied content
    Content {
        spec: SpecTree,
        #[serde(default)]
        parent: Option<VersionTag>,
    },
}

impl VersionSource {
    pub fn parent(&self) -> Option<&VersionTag> {
        match self {
            VersionSource::Copy { from } => Some(from),
            VersionSource::Content { parent, .. } => parent.as_ref(),
        }
    }
}

/// Parameters for adding a version to an existing document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateVersion {
    pub api_id: ApiId,
    pub version: VersionTag,
    pub source: VersionSource,
    pub actor: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub make_current: bool,
    #[serde(default)]
    pub format: Option<SpecFormat>,
}

/// A vault operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum VaultRequest {
    ListApis,
    GetApi {
        api_id: ApiId,
    },
    CreateApi(CreateApi),
    UpdateApi {
        api_id: ApiId,
        patch: ApiMetadataPatch,
        actor: String,
    },
    ListVersions {
        api_id: ApiId,
    },
    GetVersion {
        api_id: ApiId,
        version: VersionTag,
    },
    /// Content of `version`, or of the current version when absent
    GetSpec {
        api_id: ApiId,
        #[serde(default)]
        version: Option<VersionTag>,
    },
    CreateVersion(CreateVersion),
    /// Replace the content of an existing version
    UpdateSpec {
        api_id: ApiId,
        version: VersionTag,
        spec: SpecTree,
        actor: String,
        #[serde(default)]
        reason: Option<String>,
    },
    SetCurrent {
        api_id: ApiId,
        version: VersionTag,
        actor: String,
        #[serde(default)]
        reason: Option<String>,
    },
    SetStable {
        api_id: ApiId,
        version: VersionTag,
        actor: String,
        #[serde(default)]
        reason: Option<String>,
    },
    DeleteVersion {
        api_id: ApiId,
        version: VersionTag,
        actor: String,
        #[serde(default)]
        reason: Option<String>,
    },
    Compare {
        api_id: ApiId,
        from: VersionTag,
        to: VersionTag,
    },
    Lineage {
        api_id: ApiId,
        version: VersionTag,
    },
    Validate {
        api_id: ApiId,
        version: VersionTag,
        actor: String,
    },
    AuditLog {
        api_id: ApiId,
        #[serde(default)]
        query: AuditQuery,
    },
}

impl VaultRequest {
    /// Operation name as it appears on the wire
    pub fn operation(&self) -> &'static str {
        match self {
            VaultRequest::ListApis => "list_apis",
            VaultRequest::GetApi { .. } => "get_api",
            VaultRequest::CreateApi(_) => "create_api",
            VaultRequest::UpdateApi { .. } => "update_api",
            VaultRequest::ListVersions { .. } => "list_versions",
            VaultRequest::GetVersion { .. } => "get_version",
            VaultRequest::GetSpec { .. } => "get_spec",
            VaultRequest::CreateVersion(_) => "create_version",
            VaultRequest::UpdateSpec { .. } => "update_spec",
            VaultRequest::SetCurrent { .. } => "set_current",
            VaultRequest::SetStable { .. } => "set_stable",
            VaultRequest::DeleteVersion { .. } => "delete_version",
            VaultRequest::Compare { .. } => "compare",
            VaultRequest::Lineage { .. } => "lineage",
            VaultRequest::Validate { .. } => "validate",
            VaultRequest::AuditLog { .. } => "audit_log",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_tagged_request() {
        let request: VaultRequest = serde_json::from_value(json!({
            "operation": "set_current",
            "api_id": "billing-api",
            "version": "v1.1.0",
            "actor": "alice"
        }))
        .unwrap();
        assert_eq!(request.operation(), "set_current");
        assert!(matches!(request, VaultRequest::SetCurrent { reason: None, .. }));
    }

    #[test]
    fn test_decode_copy_source() {
        let request: VaultRequest = serde_json::from_value(json!({
            "operation": "create_version",
            "api_id": "billing-api",
            "version": "v1.1.0",
            "source": {"kind": "copy", "from": "v1.0.0"},
            "actor": "alice"
        }))
        .unwrap();
        match request {
            VaultRequest::CreateVersion(create) => {
                assert_eq!(create.source.parent().map(|v| v.as_str()), Some("v1.0.0"));
                assert!(!create.make_current);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_tag_rejected_at_boundary() {
        let result = serde_json::from_value::<VaultRequest>(json!({
            "operation": "get_version",
            "api_id": "billing-api",
            "version": "../../etc"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_operation() {
        assert!(serde_json::from_value::<VaultRequest>(json!({"operation": "drop_all"})).is_err());
    }
}
