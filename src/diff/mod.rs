//! Diff engine
//!
//! Pure comparison of two loaded document trees into an added / modified /
//! deleted delta over endpoints and named schemas, plus a flat list of
//! breaking changes. No storage access, no suspension.
//!
//! # Guarantees
//!
//! - `compare(t, t)` is empty on every axis
//! - Output is sorted, so repeated calls on the same inputs are identical

mod endpoints;
mod policy;
mod result;
mod schemas;

pub use endpoints::COMPARED_FIELDS;
pub use policy::BreakingPolicy;
pub use result::{
    DiffDetails, DiffResult, EndpointGroup, ModifiedEndpoint, ModifiedSchema, SchemaDetail,
};

use crate::tree::SpecTree;

/// Diff engine configured with a breaking-change policy
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine {
    policy: BreakingPolicy,
}

impl DiffEngine {
    pub fn new(policy: BreakingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &BreakingPolicy {
        &self.policy
    }

    /// Compare `old` against `new`
    pub fn compare(&self, old: &SpecTree, new: &SpecTree) -> DiffResult {
        let endpoint_delta = endpoints::compare_endpoints(old, new, &self.policy);
        let schema_delta = schemas::compare_schemas(old, new, &self.policy);

        let mut modified_endpoints = endpoint_delta.modified;
        modified_endpoints.sort_by(|a, b| (&a.path, &a.method).cmp(&(&b.path, &b.method)));
        let mut modified_schemas = schema_delta.modified;
        modified_schemas.sort_by(|a, b| a.name.cmp(&b.name));
        let mut added_schemas = schema_delta.added;
        added_schemas.sort_by(|a, b| a.name.cmp(&b.name));
        let mut deleted_schemas = schema_delta.deleted;
        deleted_schemas.sort_by(|a, b| a.name.cmp(&b.name));

        let mut breaking_changes = endpoint_delta.breaking;
        breaking_changes.extend(schema_delta.breaking);
        breaking_changes.sort();
        breaking_changes.dedup();

        DiffResult {
            added: sorted_names(endpoint_delta.added.iter().map(|k| k.to_string())),
            modified: sorted_names(
                modified_endpoints
                    .iter()
                    .map(|m| format!("{} {}", m.method, m.path)),
            ),
            deleted: sorted_names(endpoint_delta.deleted.iter().map(|k| k.to_string())),
            added_schemas: sorted_names(added_schemas.iter().map(|s| s.name.clone())),
            modified_schemas: sorted_names(modified_schemas.iter().map(|s| s.name.clone())),
            deleted_schemas: sorted_names(deleted_schemas.iter().map(|s| s.name.clone())),
            details: DiffDetails {
                added_endpoints: endpoints::group_by_path(&endpoint_delta.added),
                modified_endpoints,
                deleted_endpoints: endpoints::group_by_path(&endpoint_delta.deleted),
                added_schemas,
                modified_schemas,
                deleted_schemas,
            },
            breaking_changes,
        }
    }
}

fn sorted_names(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut names: Vec<String> = names.collect();
    names.sort();
    names
}

/// Compare two trees under the default policy
pub fn compare(old: &SpecTree, new: &SpecTree) -> DiffResult {
    DiffEngine::default().compare(old, new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn billing() -> SpecTree {
        json!({
            "openapi": "3.0.3",
            "info": {"title": "Billing", "version": "1.0.0"},
            "paths": {
                "/invoices": {
                    "get": {"summary": "List invoices", "responses": {"200": {"description": "ok"}}}
                }
            },
            "components": {
                "schemas": {
                    "Invoice": {
                        "type": "object",
                        "required": ["id"],
                        "properties": {"id": {"type": "string"}, "amount": {"type": "number"}}
                    }
                }
            }
        })
    }

    #[test]
    fn test_reflexive() {
        let tree = billing();
        let result = compare(&tree, &tree);
        assert!(result.is_empty());
        assert_eq!(result.summary_line(), "+0 added, ~0 modified, -0 deleted, 0 breaking");
    }

    #[test]
    fn test_added_endpoint_is_not_breaking() {
        let old = billing();
        let mut new = billing();
        new["paths"]["/invoices/{id}"] = json!({"delete": {"responses": {"204": {}}}});

        let result = compare(&old, &new);
        assert_eq!(result.added, vec!["delete /invoices/{id}"]);
        assert!(result.breaking_changes.is_empty());
        assert_eq!(result.details.added_endpoints[0].path, "/invoices/{id}");
        assert_eq!(result.details.added_endpoints[0].methods, vec!["delete"]);
    }

    #[test]
    fn test_deleted_endpoint_is_breaking() {
        let old = billing();
        let mut new = billing();
        new["paths"] = json!({});

        let result = compare(&old, &new);
        assert_eq!(result.deleted, vec!["get /invoices"]);
        assert!(result.breaking_changes[0].contains("get /invoices"));
    }

    #[test]
    fn test_modified_reported_in_both_forms() {
        let old = billing();
        let mut new = billing();
        new["paths"]["/invoices"]["get"]["summary"] = json!("All invoices");
        new["components"]["schemas"]["Invoice"]["properties"]["amount"]["type"] = json!("integer");

        let result = compare(&old, &new);
        assert_eq!(result.modified, vec!["get /invoices"]);
        assert_eq!(result.details.modified_endpoints[0].changes, vec!["summary"]);
        assert_eq!(result.modified_schemas, vec!["Invoice"]);
        assert_eq!(result.breaking_changes.len(), 1);

        let summary = result.to_change_summary();
        assert_eq!(summary.modified_schemas, vec!["Invoice"]);
    }

    #[test]
    fn test_deterministic() {
        let old = billing();
        let mut new = billing();
        for path in ["/z", "/a", "/m"] {
            new["paths"][path] = json!({"post": {}, "get": {}});
        }
        new["components"]["schemas"] = json!({"Zeta": {}, "Alpha": {}});

        let first = serde_json::to_string(&compare(&old, &new)).unwrap();
        for _ in 0..20 {
            assert_eq!(serde_json::to_string(&compare(&old, &new)).unwrap(), first);
        }
        let result = compare(&old, &new);
        assert_eq!(result.added[0], "get /a");
        assert_eq!(result.added_schemas, vec!["Alpha", "Zeta"]);
    }
}
