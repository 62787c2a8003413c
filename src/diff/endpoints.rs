//! Endpoint comparison over `(path, method)` pairs

use std::collections::BTreeMap;

use super::policy::BreakingPolicy;
use super::result::{EndpointGroup, ModifiedEndpoint};
use crate::tree::{endpoints, EndpointKey, SpecTree};

/// Operation fields compared between versions
pub const COMPARED_FIELDS: [&str; 5] = [
    "summary",
    "description",
    "parameters",
    "requestBody",
    "responses",
];

#[derive(Debug, Default)]
pub(super) struct EndpointDelta {
    pub added: Vec<EndpointKey>,
    pub deleted: Vec<EndpointKey>,
    pub modified: Vec<ModifiedEndpoint>,
    pub breaking: Vec<String>,
}

pub(super) fn compare_endpoints(
    old: &SpecTree,
    new: &SpecTree,
    policy: &BreakingPolicy,
) -> EndpointDelta {
    let old_eps = endpoints(old);
    let new_eps = endpoints(new);
    let mut delta = EndpointDelta::default();

    for key in new_eps.keys() {
        if !old_eps.contains_key(key) {
            delta.added.push(key.clone());
        }
    }

    for (key, old_view) in &old_eps {
        let Some(new_view) = new_eps.get(key) else {
            delta.breaking.push(format!("Removed endpoint {}", key));
            delta.deleted.push(key.clone());
            continue;
        };

        let changes: Vec<String> = COMPARED_FIELDS
            .iter()
            .filter(|field| old_view.field(field) != new_view.field(field))
            .map(|field| field.to_string())
            .collect();

        if changes.is_empty() {
            continue;
        }

        let mut breaking = false;
        if old_view.request_body().is_some()
            && new_view.request_body().is_none()
            && policy.request_body_removal_breaking
        {
            delta
                .breaking
                .push(format!("Removed request body from endpoint {}", key));
            breaking = true;
        }

        delta.modified.push(ModifiedEndpoint {
            path: key.path.clone(),
            method: key.method.clone(),
            changes,
            breaking,
        });
    }

    delta
}

/// Group endpoint keys by path, methods sorted
pub(super) fn group_by_path(keys: &[EndpointKey]) -> Vec<EndpointGroup> {
    let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for key in keys {
        groups
            .entry(key.path.as_str())
            .or_default()
            .push(key.method.clone());
    }
    groups
        .into_iter()
        .map(|(path, mut methods)| {
            methods.sort();
            EndpointGroup {
                path: path.to_string(),
                methods,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_level_reasons() {
        let old = json!({"paths": {"/a": {"get": {"summary": "x", "responses": {"200": {}}}}}});
        let new = json!({"paths": {"/a": {"get": {"summary": "y", "responses": {"200": {}}}}}});
        let delta = compare_endpoints(&old, &new, &BreakingPolicy::default());
        assert_eq!(delta.modified.len(), 1);
        assert_eq!(delta.modified[0].changes, vec!["summary"]);
        assert!(!delta.modified[0].breaking);
        assert!(delta.breaking.is_empty());
    }

    #[test]
    fn test_request_body_removal_follows_policy() {
        let old = json!({"paths": {"/a": {"post": {"requestBody": {"content": {}}}}}});
        let new = json!({"paths": {"/a": {"post": {}}}});

        let strict = compare_endpoints(&old, &new, &BreakingPolicy::default());
        assert!(strict.modified[0].breaking);
        assert_eq!(strict.breaking.len(), 1);

        let lenient = compare_endpoints(&old, &new, &BreakingPolicy::lenient());
        assert!(!lenient.modified[0].breaking);
        assert!(lenient.breaking.is_empty());
    }

    #[test]
    fn test_group_by_path() {
        let keys = vec![
            EndpointKey::new("/b", "post"),
            EndpointKey::new("/a", "put"),
            EndpointKey::new("/b", "get"),
        ];
        let groups = group_by_path(&keys);
        assert_eq!(groups[0].path, "/a");
        assert_eq!(groups[1].methods, vec!["get", "post"]);
    }
}
