//! Version registry
//!
//! Per-document state machine:
//!
//! ```text
//! Uninitialized --create_api_metadata--> Active(versions=[v0], current=v0, stable=v0)
//! ```
//!
//! From `Active`, versions are prepended (newest first), pointers moved
//! between registered tags, and unpinned versions deleted. Nothing is
//! cached: every call re-reads the record from storage.
//!
//! The registry does not lock. Callers hold the document lock across any
//! read-modify-write sequence.

use std::sync::Arc;

use chrono::Utc;

use super::metadata::{ApiMetadata, ApiMetadataPatch, VersionMetadata};
use crate::errors::{VaultError, VaultResult};
use crate::ids::{ApiId, VersionTag};
use crate::layout;
use crate::observability::{log_event_with_fields, Event};
use crate::records::{load_record, save_record};
use crate::storage::StorageBackend;

/// Registry of document and version metadata
#[derive(Debug, Clone)]
pub struct VersionRegistry {
    backend: Arc<dyn StorageBackend>,
}

impl VersionRegistry {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    async fn load_api(&self, id: &ApiId) -> VaultResult<Option<ApiMetadata>> {
        let key = layout::api_metadata_key(id);
        let metadata: Option<ApiMetadata> =
            load_record(self.backend.as_ref(), "get_api_metadata", &key).await?;
        match metadata {
            Some(m) if !m.pointers_valid() => Err(VaultError::corrupt(
                "get_api_metadata",
                &key,
                "current or latest_stable references an unregistered version",
            )),
            other => Ok(other),
        }
    }

    async fn save_api(&self, operation: &str, metadata: &ApiMetadata) -> VaultResult<()> {
        let key = layout::api_metadata_key(&metadata.id);
        save_record(self.backend.as_ref(), operation, &key, metadata).await
    }

    /// Create metadata for a new document. Fails with conflict if the
    /// identifier already exists.
    pub async fn create_api_metadata(&self, metadata: ApiMetadata) -> VaultResult<ApiMetadata> {
        if !metadata.pointers_valid() {
            return Err(VaultError::validation(
                "current and latest_stable must reference a listed version",
            ));
        }
        if self.api_exists(&metadata.id).await? {
            return Err(VaultError::conflict(format!(
                "api '{}' already exists",
                metadata.id
            )));
        }
        self.save_api("create_api_metadata", &metadata).await?;
        log_event_with_fields(
            Event::ApiCreated,
            &[("api", metadata.id.as_str()), ("version", metadata.current.as_str())],
        );
        Ok(metadata)
    }

    pub async fn api_exists(&self, id: &ApiId) -> VaultResult<bool> {
        self.backend
            .exists(&layout::api_metadata_key(id))
            .await
            .map_err(|e| VaultError::storage("api_exists", e))
    }

    pub async fn get_api_metadata(&self, id: &ApiId) -> VaultResult<ApiMetadata> {
        self.load_api(id)
            .await?
            .ok_or_else(|| VaultError::not_found(format!("api '{}'", id)))
    }

    /// Apply a partial update. Attempts to change `id` or `created_at` are
    /// ignored rather than rejected.
    pub async fn update_api_metadata(
        &self,
        id: &ApiId,
        patch: &ApiMetadataPatch,
    ) -> VaultResult<ApiMetadata> {
        let mut metadata = self.get_api_metadata(id).await?;
        patch.apply_to(&mut metadata);
        metadata.updated_at = Utc::now();
        self.save_api("update_api_metadata", &metadata).await?;
        Ok(metadata)
    }

    /// Identifiers of every registered document, sorted
    pub async fn list_apis(&self) -> VaultResult<Vec<ApiId>> {
        let keys = self
            .backend
            .list("")
            .await
            .map_err(|e| VaultError::storage("list_apis", e))?;
        let mut ids: Vec<ApiId> = keys
            .iter()
            .filter_map(|k| layout::api_id_from_metadata_key(k))
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Registered versions, newest first
    pub async fn list_versions(&self, id: &ApiId) -> VaultResult<Vec<VersionTag>> {
        Ok(self.get_api_metadata(id).await?.versions)
    }

    /// Register `version` as the newest version.
    pub async fn add_version(
        &self,
        id: &ApiId,
        version: &VersionTag,
        make_current: bool,
    ) -> VaultResult<ApiMetadata> {
        let mut metadata = self.get_api_metadata(id).await?;
        if metadata.has_version(version) {
            return Err(VaultError::conflict(format!(
                "version '{}' already exists for api '{}'",
                version, id
            )));
        }
        metadata.versions.insert(0, version.clone());
        if make_current {
            metadata.current = version.clone();
        }
        metadata.updated_at = Utc::now();
        self.save_api("add_version", &metadata).await?;
        Ok(metadata)
    }

    fn require_version(metadata: &ApiMetadata, version: &VersionTag) -> VaultResult<()> {
        if metadata.has_version(version) {
            Ok(())
        } else {
            Err(VaultError::not_found(format!(
                "version '{}' of api '{}'",
                version, metadata.id
            )))
        }
    }

    pub async fn set_current_version(
        &self,
        id: &ApiId,
        version: &VersionTag,
    ) -> VaultResult<ApiMetadata> {
        let mut metadata = self.get_api_metadata(id).await?;
        Self::require_version(&metadata, version)?;
        metadata.current = version.clone();
        metadata.updated_at = Utc::now();
        self.save_api("set_current_version", &metadata).await?;
        log_event_with_fields(
            Event::PointerMoved,
            &[("api", id.as_str()), ("pointer", "current"), ("version", version.as_str())],
        );
        Ok(metadata)
    }

    pub async fn set_latest_stable(
        &self,
        id: &ApiId,
        version: &VersionTag,
    ) -> VaultResult<ApiMetadata> {
        let mut metadata = self.get_api_metadata(id).await?;
        Self::require_version(&metadata, version)?;
        metadata.latest_stable = version.clone();
        metadata.updated_at = Utc::now();
        self.save_api("set_latest_stable", &metadata).await?;
        log_event_with_fields(
            Event::PointerMoved,
            &[
                ("api", id.as_str()),
                ("pointer", "latest_stable"),
                ("version", version.as_str()),
            ],
        );
        Ok(metadata)
    }

    /// Unregister `version` and remove its version metadata.
    ///
    /// Fails not-found if unregistered and conflict if it is `current` or
    /// `latest_stable`.
    pub async fn delete_version(
        &self,
        id: &ApiId,
        version: &VersionTag,
    ) -> VaultResult<ApiMetadata> {
        let mut metadata = self.get_api_metadata(id).await?;
        Self::require_version(&metadata, version)?;
        if metadata.is_pinned(version) {
            return Err(VaultError::conflict(format!(
                "version '{}' is current or latest stable for api '{}'",
                version, id
            )));
        }

        metadata.versions.retain(|v| v != version);
        metadata.updated_at = Utc::now();
        self.save_api("delete_version", &metadata).await?;

        match self
            .backend
            .delete(&layout::version_metadata_key(id, version))
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(VaultError::storage("delete_version", e)),
        }

        log_event_with_fields(
            Event::VersionDeleted,
            &[("api", id.as_str()), ("version", version.as_str())],
        );
        Ok(metadata)
    }

    /// Write version metadata. Write-once: fails with conflict if present.
    pub async fn create_version_metadata(
        &self,
        id: &ApiId,
        metadata: &VersionMetadata,
    ) -> VaultResult<()> {
        let key = layout::version_metadata_key(id, &metadata.version);
        let exists = self
            .backend
            .exists(&key)
            .await
            .map_err(|e| VaultError::storage("create_version_metadata", e))?;
        if exists {
            return Err(VaultError::conflict(format!(
                "metadata for version '{}' of api '{}' already exists",
                metadata.version, id
            )));
        }
        save_record(self.backend.as_ref(), "create_version_metadata", &key, metadata).await?;
        log_event_with_fields(
            Event::VersionCreated,
            &[("api", id.as_str()), ("version", metadata.version.as_str())],
        );
        Ok(())
    }

    pub async fn get_version_metadata(
        &self,
        id: &ApiId,
        version: &VersionTag,
    ) -> VaultResult<VersionMetadata> {
        let key = layout::version_metadata_key(id, version);
        load_record(self.backend.as_ref(), "get_version_metadata", &key)
            .await?
            .ok_or_else(|| {
                VaultError::not_found(format!("metadata for version '{}' of api '{}'", version, id))
            })
    }

    /// Remove version metadata left behind for a tag that never got
    /// registered. Returns whether anything was removed.
    pub(crate) async fn discard_orphan_metadata(
        &self,
        id: &ApiId,
        version: &VersionTag,
    ) -> VaultResult<bool> {
        if let Some(metadata) = self.load_api(id).await? {
            if metadata.has_version(version) {
                return Err(VaultError::conflict(format!(
                    "version '{}' of api '{}' is registered",
                    version, id
                )));
            }
        }
        match self
            .backend
            .delete(&layout::version_metadata_key(id, version))
            .await
        {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(VaultError::storage("discard_orphan_metadata", e)),
        }
    }

    /// Amend version metadata from the workflow that owns the version
    /// (stats backfill, validation snapshot). Not a general update API.
    pub(crate) async fn amend_version_metadata<F>(
        &self,
        id: &ApiId,
        version: &VersionTag,
        amend: F,
    ) -> VaultResult<VersionMetadata>
    where
        F: FnOnce(&mut VersionMetadata),
    {
        let mut metadata = self.get_version_metadata(id, version).await?;
        amend(&mut metadata);
        // The tag is the record's identity
        metadata.version = version.clone();
        let key = layout::version_metadata_key(id, version);
        save_record(self.backend.as_ref(), "amend_version_metadata", &key, &metadata).await?;
        Ok(metadata)
    }
}
