//! Diff output.
//!
//! Every list is sorted before it is emitted, so the same pair of trees
//! always serializes to the same bytes.

use serde::{Deserialize, Serialize};

use crate::registry::ChangeSummary;

/// Endpoints sharing one path, e.g. for an "added" row in a UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointGroup {
    pub path: String,
    pub methods: Vec<String>,
}

/// One endpoint present in both trees whose fields differ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedEndpoint {
    pub path: String,
    pub method: String,
    /// Names of the differing fields (`summary`, `responses`, ...)
    pub changes: Vec<String>,
    pub breaking: bool,
}

/// A schema by name and declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDetail {
    pub name: String,
    pub schema_type: Option<String>,
}

/// A schema present in both trees whose definition differs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedSchema {
    pub name: String,
    pub schema_type: Option<String>,
    /// Dotted locations of the differences (`properties.email.type`, ...)
    pub changes: Vec<String>,
    pub breaking: bool,
}

/// Per-category detail lists for rendering
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffDetails {
    pub added_endpoints: Vec<EndpointGroup>,
    pub modified_endpoints: Vec<ModifiedEndpoint>,
    pub deleted_endpoints: Vec<EndpointGroup>,
    pub added_schemas: Vec<SchemaDetail>,
    pub modified_schemas: Vec<ModifiedSchema>,
    pub deleted_schemas: Vec<SchemaDetail>,
}

/// Structural delta between two document trees
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Endpoint names (`"get /invoices"`) only in the new tree
    pub added: Vec<String>,
    /// Endpoint names present in both with differing fields
    pub modified: Vec<String>,
    /// Endpoint names only in the old tree
    pub deleted: Vec<String>,
    pub added_schemas: Vec<String>,
    pub modified_schemas: Vec<String>,
    pub deleted_schemas: Vec<String>,
    pub details: DiffDetails,
    pub breaking_changes: Vec<String>,
}

impl DiffResult {
    /// True when nothing differs on any axis
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.added_schemas.is_empty()
            && self.modified_schemas.is_empty()
            && self.deleted_schemas.is_empty()
            && self.breaking_changes.is_empty()
    }

    pub fn has_breaking_changes(&self) -> bool {
        !self.breaking_changes.is_empty()
    }

    /// One-line summary, e.g. `"+1 added, ~0 modified, -2 deleted, 2 breaking"`
    pub fn summary_line(&self) -> String {
        format!(
            "+{} added, ~{} modified, -{} deleted, {} breaking",
            self.added.len() + self.added_schemas.len(),
            self.modified.len() + self.modified_schemas.len(),
            self.deleted.len() + self.deleted_schemas.len(),
            self.breaking_changes.len()
        )
    }

    /// Change summary stored on version metadata
    pub fn to_change_summary(&self) -> ChangeSummary {
        ChangeSummary {
            added_endpoints: self.added.clone(),
            modified_endpoints: self.modified.clone(),
            deleted_endpoints: self.deleted.clone(),
            added_schemas: self.added_schemas.clone(),
            modified_schemas: self.modified_schemas.clone(),
            deleted_schemas: self.deleted_schemas.clone(),
            breaking_changes: self.breaking_changes.clone(),
        }
    }
}
