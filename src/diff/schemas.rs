//! Named-schema comparison

use std::collections::BTreeSet;

use serde_json::Value;

use super::policy::BreakingPolicy;
use super::result::{ModifiedSchema, SchemaDetail};
use crate::tree::{schemas, SchemaView, SpecTree};

/// Keys examined structurally; any other differing key is reported by name
const STRUCTURAL_KEYS: [&str; 8] = [
    "type",
    "nullable",
    "format",
    "enum",
    "required",
    "properties",
    "items",
    "$ref",
];

#[derive(Debug, Default)]
pub(super) struct SchemaDelta {
    pub added: Vec<SchemaDetail>,
    pub deleted: Vec<SchemaDetail>,
    pub modified: Vec<ModifiedSchema>,
    pub breaking: Vec<String>,
}

pub(super) fn compare_schemas(
    old: &SpecTree,
    new: &SpecTree,
    policy: &BreakingPolicy,
) -> SchemaDelta {
    let old_schemas = schemas(old);
    let new_schemas = schemas(new);
    let mut delta = SchemaDelta::default();

    for (name, view) in &new_schemas {
        if !old_schemas.contains_key(name) {
            delta.added.push(SchemaDetail {
                name: name.to_string(),
                schema_type: view.type_label(),
            });
        }
    }

    for (name, old_view) in &old_schemas {
        let Some(new_view) = new_schemas.get(name) else {
            delta.breaking.push(format!("Removed schema {}", name));
            delta.deleted.push(SchemaDetail {
                name: name.to_string(),
                schema_type: old_view.type_label(),
            });
            continue;
        };

        if old_view.raw() == new_view.raw() {
            continue;
        }

        let mut walker = SchemaWalker {
            schema: *name,
            policy,
            changes: BTreeSet::new(),
            breaking: Vec::new(),
        };
        walker.compare("", *old_view, *new_view);

        let breaking = !walker.breaking.is_empty();
        delta.breaking.extend(walker.breaking);
        delta.modified.push(ModifiedSchema {
            name: name.to_string(),
            schema_type: new_view.type_label(),
            changes: walker.changes.into_iter().collect(),
            breaking,
        });
    }

    delta
}

/// Old types not covered by the new types. `integer` is covered by
/// `number`; an empty set means unconstrained.
fn narrows(old: &BTreeSet<String>, new: &BTreeSet<String>) -> bool {
    if new.is_empty() {
        return false;
    }
    if old.is_empty() {
        return true;
    }
    old.iter()
        .any(|t| !(new.contains(t) || (t == "integer" && new.contains("number"))))
}

fn join_types(types: &BTreeSet<String>) -> String {
    if types.is_empty() {
        "any".to_string()
    } else {
        types.iter().cloned().collect::<Vec<_>>().join("|")
    }
}

struct SchemaWalker<'a> {
    schema: &'a str,
    policy: &'a BreakingPolicy,
    changes: BTreeSet<String>,
    breaking: Vec<String>,
}

impl SchemaWalker<'_> {
    fn at(path: &str, key: &str) -> String {
        if path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", path, key)
        }
    }

    fn field_name(path: &str, name: &str) -> String {
        let parent = path.replace("properties.", "");
        if parent.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", parent, name)
        }
    }

    fn location(&self, path: &str) -> String {
        if path.is_empty() {
            self.schema.to_string()
        } else {
            format!("{}.{}", self.schema, path.replace("properties.", ""))
        }
    }

    fn compare(&mut self, path: &str, old: SchemaView<'_>, new: SchemaView<'_>) {
        if old.raw() == new.raw() {
            return;
        }

        self.compare_types(path, old, new);
        self.compare_format(path, old, new);
        self.compare_enum(path, old, new);
        self.compare_required(path, old, new);
        self.compare_properties(path, old, new);

        match (old.items(), new.items()) {
            (Some(o), Some(n)) => self.compare(&Self::at(path, "items"), o, n),
            (None, None) => {}
            _ => {
                self.changes.insert(Self::at(path, "items"));
            }
        }

        if old.raw().get("$ref") != new.raw().get("$ref") {
            self.changes.insert(Self::at(path, "$ref"));
        }

        if let (Value::Object(o), Value::Object(n)) = (old.raw(), new.raw()) {
            let keys: BTreeSet<&String> = o.keys().chain(n.keys()).collect();
            for key in keys {
                if STRUCTURAL_KEYS.contains(&key.as_str()) {
                    continue;
                }
                if o.get(key) != n.get(key) {
                    self.changes.insert(Self::at(path, key));
                }
            }
        } else {
            self.changes.insert(Self::at(path, "definition"));
        }
    }

    fn compare_types(&mut self, path: &str, old: SchemaView<'_>, new: SchemaView<'_>) {
        let (old_types, new_types) = (old.types(), new.types());
        if old_types == new_types {
            return;
        }
        self.changes.insert(Self::at(path, "type"));
        if narrows(&old_types, &new_types) {
            self.breaking.push(format!(
                "Schema {}: type narrowed from {} to {}",
                self.location(path),
                join_types(&old_types),
                join_types(&new_types)
            ));
        }
    }

    fn compare_format(&mut self, path: &str, old: SchemaView<'_>, new: SchemaView<'_>) {
        if old.format() == new.format() {
            return;
        }
        self.changes.insert(Self::at(path, "format"));
        // Dropping a format only widens what is accepted
        if let (true, Some(new_format)) = (self.policy.format_change_breaking, new.format()) {
            self.breaking.push(format!(
                "Schema {}: format changed from {} to {}",
                self.location(path),
                old.format().unwrap_or("none"),
                new_format
            ));
        }
    }

    fn compare_enum(&mut self, path: &str, old: SchemaView<'_>, new: SchemaView<'_>) {
        match (old.enum_values(), new.enum_values()) {
            (None, None) => {}
            (Some(o), Some(n)) if o == n => {}
            (Some(o), Some(n)) => {
                self.changes.insert(Self::at(path, "enum"));
                let mut removed: Vec<String> = o
                    .iter()
                    .filter(|v| !n.contains(v))
                    .map(Value::to_string)
                    .collect();
                removed.sort();
                if !removed.is_empty() && self.policy.enum_value_removal_breaking {
                    self.breaking.push(format!(
                        "Schema {}: enum values removed: {}",
                        self.location(path),
                        removed.join(", ")
                    ));
                }
            }
            (None, Some(_)) => {
                self.changes.insert(Self::at(path, "enum"));
                if self.policy.enum_value_removal_breaking {
                    self.breaking.push(format!(
                        "Schema {}: values restricted to an enum",
                        self.location(path)
                    ));
                }
            }
            (Some(_), None) => {
                self.changes.insert(Self::at(path, "enum"));
            }
        }
    }

    fn compare_required(&mut self, path: &str, old: SchemaView<'_>, new: SchemaView<'_>) {
        let (old_required, new_required) = (old.required(), new.required());
        if old_required == new_required {
            return;
        }
        self.changes.insert(Self::at(path, "required"));

        let old_props = old.properties();
        for field in new_required.difference(&old_required) {
            let name = Self::field_name(path, field);
            if old_props.contains_key(field) {
                self.breaking.push(format!(
                    "Schema {}: field '{}' changed from optional to required",
                    self.schema, name
                ));
            } else {
                self.breaking.push(format!(
                    "Schema {}: new required field '{}'",
                    self.schema, name
                ));
            }
        }
    }

    fn compare_properties(&mut self, path: &str, old: SchemaView<'_>, new: SchemaView<'_>) {
        let old_props = old.properties();
        let new_props = new.properties();
        let old_required = old.required();

        for (name, old_prop) in &old_props {
            let prop_path = Self::at(path, &format!("properties.{}", name));
            match new_props.get(name) {
                Some(new_prop) => self.compare(&prop_path, *old_prop, *new_prop),
                None => {
                    self.changes.insert(prop_path);
                    if old_required.contains(name) {
                        self.breaking.push(format!(
                            "Schema {}: required field '{}' removed",
                            self.schema,
                            Self::field_name(path, name)
                        ));
                    }
                }
            }
        }

        for name in new_props.keys() {
            if !old_props.contains_key(name) {
                self.changes
                    .insert(Self::at(path, &format!("properties.{}", name)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(schema: Value) -> Value {
        json!({"components": {"schemas": {"Invoice": schema}}})
    }

    fn diff(old: Value, new: Value) -> SchemaDelta {
        compare_schemas(&doc(old), &doc(new), &BreakingPolicy::default())
    }

    #[test]
    fn test_optional_to_required_is_breaking() {
        let delta = diff(
            json!({"type": "object", "properties": {"memo": {"type": "string"}}}),
            json!({"type": "object", "required": ["memo"], "properties": {"memo": {"type": "string"}}}),
        );
        assert!(delta.modified[0].breaking);
        assert!(delta.breaking[0].contains("optional to required"));
    }

    #[test]
    fn test_new_required_field_is_breaking() {
        let delta = diff(
            json!({"type": "object"}),
            json!({"type": "object", "required": ["id"], "properties": {"id": {"type": "string"}}}),
        );
        assert!(delta.breaking.iter().any(|b| b.contains("new required field 'id'")));
    }

    #[test]
    fn test_type_narrowing_is_breaking_widening_is_not() {
        let narrowed = diff(
            json!({"properties": {"amount": {"type": "number"}}}),
            json!({"properties": {"amount": {"type": "integer"}}}),
        );
        assert_eq!(narrowed.breaking.len(), 1);
        assert!(narrowed.breaking[0].contains("Invoice.amount"));

        let widened = diff(
            json!({"properties": {"amount": {"type": "integer"}}}),
            json!({"properties": {"amount": {"type": "number"}}}),
        );
        assert!(widened.breaking.is_empty());
        assert_eq!(widened.modified[0].changes, vec!["properties.amount.type"]);
    }

    #[test]
    fn test_removing_nullable_narrows() {
        let delta = diff(
            json!({"type": "string", "nullable": true}),
            json!({"type": "string"}),
        );
        assert_eq!(delta.breaking.len(), 1);
    }

    #[test]
    fn test_removed_required_field_is_breaking() {
        let delta = diff(
            json!({"required": ["id"], "properties": {"id": {"type": "string"}, "memo": {}}}),
            json!({"properties": {"memo": {}}}),
        );
        assert!(delta.breaking.iter().any(|b| b.contains("required field 'id' removed")));
    }

    #[test]
    fn test_enum_and_format_follow_policy() {
        let old = doc(json!({"type": "string", "format": "date", "enum": ["a", "b"]}));
        let new = doc(json!({"type": "string", "format": "date-time", "enum": ["a"]}));

        let strict = compare_schemas(&old, &new, &BreakingPolicy::default());
        assert_eq!(strict.breaking.len(), 2);

        let lenient = compare_schemas(&old, &new, &BreakingPolicy::lenient());
        assert!(lenient.breaking.is_empty());
        assert_eq!(lenient.modified[0].changes, vec!["enum", "format"]);
    }

    #[test]
    fn test_description_change_is_not_breaking() {
        let delta = diff(
            json!({"type": "object", "description": "old"}),
            json!({"type": "object", "description": "new"}),
        );
        assert_eq!(delta.modified[0].changes, vec!["description"]);
        assert!(!delta.modified[0].breaking);
    }

    #[test]
    fn test_deleted_schema_is_breaking() {
        let old = json!({"components": {"schemas": {"A": {}, "B": {}}}});
        let new = json!({"components": {"schemas": {"A": {}}}});
        let delta = compare_schemas(&old, &new, &BreakingPolicy::default());
        assert_eq!(delta.deleted[0].name, "B");
        assert_eq!(delta.breaking, vec!["Removed schema B"]);
    }
}
