//! Structured document tree and the narrow views built on top of it.
//!
//! Documents are open-ended (vendor `x-` extensions, dialect differences),
//! so the whole document is kept as a generic tree. Components that need
//! structure build a typed view over just the part they touch.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded in-memory form of a document
pub type SpecTree = Value;

/// HTTP methods recognised as operations inside a path item
pub const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// `(path, method)` pair identifying one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointKey {
    pub path: String,
    /// Lowercase HTTP method
    pub method: String,
}

impl EndpointKey {
    pub fn new(path: impl Into<String>, method: impl AsRef<str>) -> Self {
        Self {
            path: path.into(),
            method: method.as_ref().to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for EndpointKey {
    /// Renders as `"get /invoices"`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// View over one operation object
#[derive(Debug, Clone, Copy)]
pub struct EndpointView<'a> {
    operation: &'a Map<String, Value>,
    path_item: &'a Map<String, Value>,
}

impl<'a> EndpointView<'a> {
    pub fn summary(&self) -> Option<&'a Value> {
        self.operation.get("summary")
    }

    pub fn description(&self) -> Option<&'a Value> {
        self.operation.get("description")
    }

    /// Operation parameters, falling back to path-level parameters
    pub fn parameters(&self) -> Option<&'a Value> {
        self.operation
            .get("parameters")
            .or_else(|| self.path_item.get("parameters"))
    }

    pub fn request_body(&self) -> Option<&'a Value> {
        self.operation.get("requestBody")
    }

    pub fn responses(&self) -> Option<&'a Value> {
        self.operation.get("responses")
    }

    /// Field by name, for generic comparison
    pub fn field(&self, name: &str) -> Option<&'a Value> {
        match name {
            "parameters" => self.parameters(),
            other => self.operation.get(other),
        }
    }
}

/// Collect every `(path, method)` endpoint in the document, ordered.
pub fn endpoints(tree: &SpecTree) -> BTreeMap<EndpointKey, EndpointView<'_>> {
    let mut result = BTreeMap::new();
    let Some(paths) = tree.get("paths").and_then(Value::as_object) else {
        return result;
    };

    for (path, item) in paths {
        let Some(path_item) = item.as_object() else {
            continue;
        };
        for (method, operation) in path_item {
            let lowered = method.to_ascii_lowercase();
            if !HTTP_METHODS.contains(&lowered.as_str()) {
                continue;
            }
            if let Some(operation) = operation.as_object() {
                result.insert(
                    EndpointKey::new(path.clone(), &lowered),
                    EndpointView {
                        operation,
                        path_item,
                    },
                );
            }
        }
    }
    result
}

/// View over one named schema (or a nested property schema)
#[derive(Debug, Clone, Copy)]
pub struct SchemaView<'a> {
    node: &'a Value,
}

impl<'a> SchemaView<'a> {
    pub fn new(node: &'a Value) -> Self {
        Self { node }
    }

    pub fn raw(&self) -> &'a Value {
        self.node
    }

    /// Declared types. OpenAPI 3.1 allows an array; `nullable: true` adds
    /// `"null"`. Empty means unconstrained.
    pub fn types(&self) -> BTreeSet<String> {
        let mut types = BTreeSet::new();
        match self.node.get("type") {
            Some(Value::String(t)) => {
                types.insert(t.clone());
            }
            Some(Value::Array(items)) => {
                types.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
            }
            _ => {}
        }
        if !types.is_empty() && self.node.get("nullable") == Some(&Value::Bool(true)) {
            types.insert("null".to_string());
        }
        types
    }

    /// Single display type, e.g. `"object"`, `"string|null"`, or `$ref`
    pub fn type_label(&self) -> Option<String> {
        let types = self.types();
        if !types.is_empty() {
            return Some(types.into_iter().collect::<Vec<_>>().join("|"));
        }
        self.node
            .get("$ref")
            .and_then(Value::as_str)
            .map(|r| format!("ref:{}", r))
    }

    pub fn format(&self) -> Option<&'a str> {
        self.node.get("format").and_then(Value::as_str)
    }

    pub fn enum_values(&self) -> Option<&'a Vec<Value>> {
        self.node.get("enum").and_then(Value::as_array)
    }

    pub fn required(&self) -> BTreeSet<&'a str> {
        self.node
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn properties(&self) -> BTreeMap<&'a str, SchemaView<'a>> {
        self.node
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, node)| (name.as_str(), SchemaView::new(node)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn items(&self) -> Option<SchemaView<'a>> {
        self.node.get("items").map(SchemaView::new)
    }
}

/// Named schemas: `components.schemas` (OpenAPI 3) or `definitions`
/// (Swagger 2), ordered by name.
pub fn schemas(tree: &SpecTree) -> BTreeMap<&str, SchemaView<'_>> {
    let map = tree
        .get("components")
        .and_then(|c| c.get("schemas"))
        .or_else(|| tree.get("definitions"))
        .and_then(Value::as_object);

    map.map(|m| {
        m.iter()
            .map(|(name, node)| (name.as_str(), SchemaView::new(node)))
            .collect()
    })
    .unwrap_or_default()
}

/// Size and shape counts of one document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecStats {
    pub size_bytes: u64,
    pub endpoint_count: u64,
    pub schema_count: u64,
}

impl SpecStats {
    pub fn of(tree: &SpecTree, size_bytes: usize) -> Self {
        Self {
            size_bytes: size_bytes as u64,
            endpoint_count: endpoints(tree).len() as u64,
            schema_count: schemas(tree).len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> SpecTree {
        json!({
            "openapi": "3.0.3",
            "paths": {
                "/invoices": {
                    "parameters": [{"name": "tenant", "in": "header"}],
                    "get": {"summary": "List"},
                    "POST": {"summary": "Create", "requestBody": {}},
                    "x-internal": true
                }
            },
            "components": {"schemas": {"Invoice": {"type": "object", "required": ["id"]}}}
        })
    }

    #[test]
    fn test_endpoints_are_ordered_and_lowercased() {
        let tree = sample();
        let keys: Vec<String> = endpoints(&tree).keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["get /invoices", "post /invoices"]);
    }

    #[test]
    fn test_path_level_parameters_fallback() {
        let tree = sample();
        let eps = endpoints(&tree);
        let get = eps.get(&EndpointKey::new("/invoices", "get")).unwrap();
        assert!(get.parameters().is_some());
        assert_eq!(get.summary(), Some(&json!("List")));
    }

    #[test]
    fn test_schema_view() {
        let tree = sample();
        let schemas = schemas(&tree);
        let invoice = schemas.get("Invoice").unwrap();
        assert_eq!(invoice.type_label().as_deref(), Some("object"));
        assert!(invoice.required().contains("id"));
    }

    #[test]
    fn test_swagger_definitions() {
        let tree = json!({"swagger": "2.0", "definitions": {"A": {}, "B": {}}});
        assert_eq!(schemas(&tree).len(), 2);
    }

    #[test]
    fn test_nullable_adds_null_type() {
        let node = json!({"type": "string", "nullable": true});
        let types = SchemaView::new(&node).types();
        assert!(types.contains("null"));
        assert!(types.contains("string"));
    }

    #[test]
    fn test_stats() {
        let stats = SpecStats::of(&sample(), 120);
        assert_eq!(stats.endpoint_count, 2);
        assert_eq!(stats.schema_count, 1);
        assert_eq!(stats.size_bytes, 120);
    }
}
