//! Audit events

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ids::{ApiId, VersionTag};

/// Kind of change an audit event records
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuditEventKind {
    ApiCreated,
    VersionCreated,
    SpecUpdated,
    CurrentChanged,
    StablePromoted,
    VersionDeleted,
    VersionValidated,
    MetadataUpdated,
    /// Caller-defined kind
    Custom(String),
}

impl AuditEventKind {
    pub fn as_str(&self) -> &str {
        match self {
            AuditEventKind::ApiCreated => "api_created",
            AuditEventKind::VersionCreated => "version_created",
            AuditEventKind::SpecUpdated => "spec_updated",
            AuditEventKind::CurrentChanged => "current_changed",
            AuditEventKind::StablePromoted => "stable_promoted",
            AuditEventKind::VersionDeleted => "version_deleted",
            AuditEventKind::VersionValidated => "version_validated",
            AuditEventKind::MetadataUpdated => "metadata_updated",
            AuditEventKind::Custom(name) => name,
        }
    }
}

impl From<String> for AuditEventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "api_created" => AuditEventKind::ApiCreated,
            "version_created" => AuditEventKind::VersionCreated,
            "spec_updated" => AuditEventKind::SpecUpdated,
            "current_changed" => AuditEventKind::CurrentChanged,
            "stable_promoted" => AuditEventKind::StablePromoted,
            "version_deleted" => AuditEventKind::VersionDeleted,
            "version_validated" => AuditEventKind::VersionValidated,
            "metadata_updated" => AuditEventKind::MetadataUpdated,
            _ => AuditEventKind::Custom(value),
        }
    }
}

impl From<&str> for AuditEventKind {
    fn from(value: &str) -> Self {
        AuditEventKind::from(value.to_string())
    }
}

impl From<AuditEventKind> for String {
    fn from(kind: AuditEventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a document's audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: AuditEventKind,
    pub api_id: ApiId,
    #[serde(default)]
    pub version: Option<VersionTag>,
    pub actor: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub details: Value,
}

impl AuditEvent {
    pub fn new(kind: AuditEventKind, api_id: ApiId, actor: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            api_id,
            version: None,
            actor: actor.into(),
            reason: None,
            details: Value::Null,
        }
    }

    pub fn with_version(mut self, version: VersionTag) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
