//! Document and version metadata records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ApiId, VersionTag};
use crate::tree::SpecStats;

/// Per-document metadata.
///
/// Both pointers always reference a tag present in `versions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMetadata {
    pub id: ApiId,
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Newest first
    pub versions: Vec<VersionTag>,
    pub current: VersionTag,
    pub latest_stable: VersionTag,
}

impl ApiMetadata {
    /// Metadata for a document whose only version is `initial`
    pub fn new(
        id: ApiId,
        name: impl Into<String>,
        owner: impl Into<String>,
        initial: VersionTag,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            owner: owner.into(),
            description: None,
            created_at: now,
            updated_at: now,
            versions: vec![initial.clone()],
            current: initial.clone(),
            latest_stable: initial,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn has_version(&self, version: &VersionTag) -> bool {
        self.versions.contains(version)
    }

    /// True if `version` is referenced by `current` or `latest_stable`
    pub fn is_pinned(&self, version: &VersionTag) -> bool {
        &self.current == version || &self.latest_stable == version
    }

    /// Pointer invariant check, used when reading records back
    pub fn pointers_valid(&self) -> bool {
        self.has_version(&self.current) && self.has_version(&self.latest_stable)
    }
}

/// Partial update of document metadata.
///
/// `id` and `created_at` are accepted but ignored: both are immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMetadataPatch {
    #[serde(default)]
    pub id: Option<ApiId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ApiMetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.owner.is_none() && self.description.is_none()
    }

    /// Apply mutable fields to `metadata`
    pub fn apply_to(&self, metadata: &mut ApiMetadata) {
        if let Some(name) = &self.name {
            metadata.name = name.clone();
        }
        if let Some(owner) = &self.owner {
            metadata.owner = owner.clone();
        }
        if let Some(description) = &self.description {
            metadata.description = Some(description.clone());
        }
    }
}

/// What changed relative to the parent version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub added_endpoints: Vec<String>,
    pub modified_endpoints: Vec<String>,
    pub deleted_endpoints: Vec<String>,
    pub added_schemas: Vec<String>,
    pub modified_schemas: Vec<String>,
    pub deleted_schemas: Vec<String>,
    pub breaking_changes: Vec<String>,
}

impl ChangeSummary {
    pub fn is_breaking(&self) -> bool {
        !self.breaking_changes.is_empty()
    }
}

/// Result of the last lint run over a version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSnapshot {
    pub validated_at: DateTime<Utc>,
    pub valid: bool,
    pub errors: u32,
    pub warnings: u32,
    pub infos: u32,
    pub hints: u32,
}

/// Per-version metadata, written once at version creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    pub version: VersionTag,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    /// Version this one was derived from
    #[serde(default)]
    pub parent: Option<VersionTag>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub changes: ChangeSummary,
    #[serde(default)]
    pub validation: Option<ValidationSnapshot>,
    #[serde(default)]
    pub stats: SpecStats,
    /// `crc32:XXXXXXXX` of the serialized content
    #[serde(default)]
    pub checksum: Option<String>,
    /// Dialect tag reported by the parser (`openapi-3.0`, ...)
    #[serde(default)]
    pub dialect: Option<String>,
}

impl VersionMetadata {
    pub fn new(version: VersionTag, created_by: impl Into<String>) -> Self {
        Self {
            version,
            created_at: Utc::now(),
            created_by: created_by.into(),
            parent: None,
            description: String::new(),
            changes: ChangeSummary::default(),
            validation: None,
            stats: SpecStats::default(),
            checksum: None,
            dialect: None,
        }
    }

    pub fn with_parent(mut self, parent: Option<VersionTag>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_changes(mut self, changes: ChangeSummary) -> Self {
        self.changes = changes;
        self
    }
}
