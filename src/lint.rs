//! Lint boundary.
//!
//! Rule definitions live in a [`Linter`]; the vault only loads a document,
//! forwards the tree and records the counts. [`BasicLinter`] is a small
//! default rule set.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::ValidationSnapshot;
use crate::tree::{endpoints, schemas, SpecTree};

/// Issue severity, serialized as 0 (error) to 3 (hint)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LintSeverity {
    Error = 0,
    Warning = 1,
    Info = 2,
    Hint = 3,
}

impl TryFrom<u8> for LintSeverity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(LintSeverity::Error),
            1 => Ok(LintSeverity::Warning),
            2 => Ok(LintSeverity::Info),
            3 => Ok(LintSeverity::Hint),
            other => Err(format!("severity must be 0-3, got {}", other)),
        }
    }
}

impl From<LintSeverity> for u8 {
    fn from(severity: LintSeverity) -> Self {
        severity as u8
    }
}

/// Source span, when the linter knows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintIssue {
    pub severity: LintSeverity,
    pub message: String,
    /// Structural path to the offending node
    pub path: Vec<String>,
    #[serde(default)]
    pub range: Option<SourceRange>,
}

impl LintIssue {
    fn new(severity: LintSeverity, message: impl Into<String>, path: &[&str]) -> Self {
        Self {
            severity,
            message: message.into(),
            path: path.iter().map(|s| s.to_string()).collect(),
            range: None,
        }
    }
}

/// External lint collaborator
pub trait Linter: Send + Sync {
    fn lint(&self, tree: &SpecTree) -> Vec<LintIssue>;
}

/// Counts per severity. Valid means no errors.
pub fn snapshot(issues: &[LintIssue]) -> ValidationSnapshot {
    let count = |s: LintSeverity| issues.iter().filter(|i| i.severity == s).count() as u32;
    let errors = count(LintSeverity::Error);
    ValidationSnapshot {
        validated_at: Utc::now(),
        valid: errors == 0,
        errors,
        warnings: count(LintSeverity::Warning),
        infos: count(LintSeverity::Info),
        hints: count(LintSeverity::Hint),
    }
}

/// Structural checks that need no dialect-specific rule set
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicLinter;

impl BasicLinter {
    fn check_info(tree: &SpecTree, issues: &mut Vec<LintIssue>) {
        for field in ["title", "version"] {
            let present = tree
                .get("info")
                .and_then(|info| info.get(field))
                .and_then(Value::as_str)
                .is_some_and(|s| !s.trim().is_empty());
            if !present {
                issues.push(LintIssue::new(
                    LintSeverity::Error,
                    format!("info.{} is required", field),
                    &["info", field],
                ));
            }
        }
    }

    fn check_operations(tree: &SpecTree, issues: &mut Vec<LintIssue>) {
        let mut operation_ids: BTreeMap<String, usize> = BTreeMap::new();

        for (key, view) in endpoints(tree) {
            let at = ["paths", key.path.as_str(), key.method.as_str()];

            match view.responses().and_then(Value::as_object) {
                Some(responses) if !responses.is_empty() => {}
                _ => issues.push(LintIssue::new(
                    LintSeverity::Error,
                    format!("{} declares no responses", key),
                    &at,
                )),
            }

            if view.summary().is_none() && view.description().is_none() {
                issues.push(LintIssue::new(
                    LintSeverity::Info,
                    format!("{} has no summary or description", key),
                    &at,
                ));
            }

            match view.field("operationId").and_then(Value::as_str) {
                Some(op) => *operation_ids.entry(op.to_string()).or_default() += 1,
                None => issues.push(LintIssue::new(
                    LintSeverity::Hint,
                    format!("{} has no operationId", key),
                    &at,
                )),
            }

            let declared: BTreeSet<&str> = view
                .parameters()
                .and_then(Value::as_array)
                .map(|params| {
                    params
                        .iter()
                        .filter(|p| p.get("in").and_then(Value::as_str) == Some("path"))
                        .filter_map(|p| p.get("name").and_then(Value::as_str))
                        .collect()
                })
                .unwrap_or_default();
            for template in path_templates(&key.path) {
                if !declared.contains(template) {
                    issues.push(LintIssue::new(
                        LintSeverity::Warning,
                        format!("{} does not declare path parameter '{}'", key, template),
                        &at,
                    ));
                }
            }
        }

        for (op, count) in operation_ids {
            if count > 1 {
                issues.push(LintIssue::new(
                    LintSeverity::Error,
                    format!("operationId '{}' is used {} times", op, count),
                    &["paths"],
                ));
            }
        }
    }

    fn check_refs(tree: &SpecTree, issues: &mut Vec<LintIssue>) {
        let known: BTreeSet<&str> = schemas(tree).keys().copied().collect();
        let mut refs = Vec::new();
        collect_refs(tree, &mut refs);
        for target in refs {
            let name = target
                .strip_prefix("#/components/schemas/")
                .or_else(|| target.strip_prefix("#/definitions/"));
            if let Some(name) = name {
                if !known.contains(name) {
                    issues.push(LintIssue::new(
                        LintSeverity::Error,
                        format!("unresolved reference '{}'", target),
                        &["$ref"],
                    ));
                }
            }
        }
    }
}

impl Linter for BasicLinter {
    fn lint(&self, tree: &SpecTree) -> Vec<LintIssue> {
        let mut issues = Vec::new();
        Self::check_info(tree, &mut issues);
        Self::check_operations(tree, &mut issues);
        Self::check_refs(tree, &mut issues);
        issues.sort_by(|a, b| (a.severity, &a.path).cmp(&(b.severity, &b.path)));
        issues
    }
}

/// `{id}` segments of a path template
fn path_templates(path: &str) -> Vec<&str> {
    path.split('/')
        .filter_map(|seg| seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .collect()
}

fn collect_refs<'a>(node: &'a Value, out: &mut Vec<&'a str>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                match (key.as_str(), value) {
                    ("$ref", Value::String(target)) => out.push(target),
                    _ => collect_refs(value, out),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_refs(item, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_document() {
        let tree = json!({
            "openapi": "3.0.3",
            "info": {"title": "Billing", "version": "1.0.0"},
            "paths": {
                "/invoices/{id}": {
                    "get": {
                        "operationId": "getInvoice",
                        "summary": "Fetch",
                        "parameters": [{"name": "id", "in": "path", "required": true}],
                        "responses": {"200": {"$ref": "#/components/schemas/Invoice"}}
                    }
                }
            },
            "components": {"schemas": {"Invoice": {"type": "object"}}}
        });
        let issues = BasicLinter.lint(&tree);
        assert!(issues.is_empty(), "{:?}", issues);
        assert!(snapshot(&issues).valid);
    }

    #[test]
    fn test_reports_problems() {
        let tree = json!({
            "openapi": "3.0.3",
            "info": {"title": "Billing"},
            "paths": {
                "/invoices/{id}": {"delete": {"operationId": "x", "responses": {}}},
                "/invoices": {"get": {"operationId": "x", "summary": "s",
                    "responses": {"200": {"$ref": "#/components/schemas/Missing"}}}}
            }
        });
        let issues = BasicLinter.lint(&tree);
        let snap = snapshot(&issues);
        assert!(!snap.valid);
        // info.version, no responses, duplicate operationId, unresolved ref
        assert_eq!(snap.errors, 4);
        assert_eq!(snap.warnings, 1);
        assert_eq!(snap.infos, 1);
        assert_eq!(issues[0].severity, LintSeverity::Error);
    }

    #[test]
    fn test_severity_is_numeric() {
        assert_eq!(serde_json::to_value(LintSeverity::Hint).unwrap(), json!(3));
        assert!(serde_json::from_value::<LintSeverity>(json!(7)).is_err());
    }
}
