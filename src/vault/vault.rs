//! Vault facade
//!
//! Composes storage, locks, spec store, registry, diff engine and audit log
//! into the mutating workflows. Every workflow takes explicit `(id, version)`
//! parameters and follows the same shape:
//!
//! ```text
//! lock(document) -> lock(version) -> load -> mutate -> save
//!     -> registry update -> audit append -> release
//! ```
//!
//! Locks are always taken in that order (document before version) and the
//! audit log's own lock is innermost, so workflows cannot deadlock each
//! other.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use super::request::{CreateApi, CreateVersion, VaultRequest, VersionSource};
use crate::audit::{AuditEvent, AuditEventKind, AuditLog, AuditQuery};
use crate::config::VaultConfig;
use crate::diff::{BreakingPolicy, DiffEngine, DiffResult};
use crate::errors::{VaultError, VaultResult};
use crate::ids::{ApiId, VersionTag};
use crate::layout;
use crate::lint::{self, BasicLinter, LintIssue, Linter};
use crate::lock::LockManager;
use crate::registry::{
    ApiMetadata, ApiMetadataPatch, ChangeSummary, ValidationSnapshot, VersionMetadata,
    VersionRegistry,
};
use crate::spec::{DialectParser, LoadedSpec, SpecFormat, SpecStore};
use crate::storage::{LocalBackend, StorageBackend};
use crate::tree::{SpecStats, SpecTree};

/// Outcome of a validation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub snapshot: ValidationSnapshot,
    pub issues: Vec<LintIssue>,
}

/// Versioned document store
#[derive(Debug, Clone)]
pub struct ApiVault {
    backend: Arc<dyn StorageBackend>,
    locks: LockManager,
    specs: SpecStore,
    registry: VersionRegistry,
    audit: AuditLog,
    diff: DiffEngine,
}

impl ApiVault {
    /// Vault over `backend`, with lock files managed by `locks`.
    ///
    /// The audit log locks its own appends.
    pub fn new(backend: Arc<dyn StorageBackend>, locks: LockManager) -> Self {
        Self {
            specs: SpecStore::new(backend.clone()),
            registry: VersionRegistry::new(backend.clone()),
            audit: AuditLog::with_locks(backend.clone(), locks.clone()),
            diff: DiffEngine::default(),
            backend,
            locks,
        }
    }

    /// Filesystem vault rooted at `config.data_dir`
    pub fn open(config: &VaultConfig) -> Self {
        let backend: Arc<dyn StorageBackend> = Arc::new(LocalBackend::new(config.data_path()));
        let locks = LockManager::new(config.data_path(), config.lock_config());
        Self::new(backend, locks)
            .with_policy(config.breaking_policy)
            .with_default_format(config.default_format)
            .with_audit_locking(config.audit_locking)
    }

    pub fn with_policy(mut self, policy: BreakingPolicy) -> Self {
        self.diff = DiffEngine::new(policy);
        self
    }

    pub fn with_default_format(mut self, format: SpecFormat) -> Self {
        self.specs = self.specs.with_default_format(format);
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn DialectParser>) -> Self {
        self.specs = self.specs.with_parser(parser);
        self
    }

    /// Without audit locking, concurrent appends to one document's log
    /// race and may drop an entry.
    pub fn with_audit_locking(mut self, enabled: bool) -> Self {
        self.audit = if enabled {
            AuditLog::with_locks(self.backend.clone(), self.locks.clone())
        } else {
            AuditLog::new(self.backend.clone())
        };
        self
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn specs(&self) -> &SpecStore {
        &self.specs
    }

    pub fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn diff_engine(&self) -> &DiffEngine {
        &self.diff
    }

    // ==================== Reads ====================

    pub async fn list_apis(&self) -> VaultResult<Vec<ApiId>> {
        self.registry.list_apis().await
    }

    pub async fn get_api(&self, id: &ApiId) -> VaultResult<ApiMetadata> {
        self.registry.get_api_metadata(id).await
    }

    pub async fn list_versions(&self, id: &ApiId) -> VaultResult<Vec<VersionTag>> {
        self.registry.list_versions(id).await
    }

    pub async fn get_version(
        &self,
        id: &ApiId,
        version: &VersionTag,
    ) -> VaultResult<VersionMetadata> {
        self.registry.get_version_metadata(id, version).await
    }

    /// Content of `version`, or of the current version
    pub async fn get_spec(
        &self,
        id: &ApiId,
        version: Option<&VersionTag>,
    ) -> VaultResult<LoadedSpec> {
        match version {
            Some(version) => self.specs.load_spec(id, version).await,
            None => {
                let current = self.registry.get_api_metadata(id).await?.current;
                self.specs.load_spec(id, &current).await
            }
        }
    }

    /// Diff two versions of one document
    pub async fn compare(
        &self,
        id: &ApiId,
        from: &VersionTag,
        to: &VersionTag,
    ) -> VaultResult<DiffResult> {
        let old = self.specs.load_spec(id, from).await?;
        let new = self.specs.load_spec(id, to).await?;
        Ok(self.diff.compare(&old.tree, &new.tree))
    }

    /// `version` followed by its ancestors, nearest first.
    ///
    /// The walk stops at a root, at an ancestor whose metadata is gone, or
    /// on a repeated tag.
    pub async fn lineage(&self, id: &ApiId, version: &VersionTag) -> VaultResult<Vec<VersionTag>> {
        let mut chain = vec![version.clone()];
        let mut seen: HashSet<VersionTag> = HashSet::from([version.clone()]);
        let mut next = self.registry.get_version_metadata(id, version).await?.parent;

        while let Some(parent) = next {
            if !seen.insert(parent.clone()) {
                break;
            }
            chain.push(parent.clone());
            next = match self.registry.get_version_metadata(id, &parent).await {
                Ok(metadata) => metadata.parent,
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };
        }
        Ok(chain)
    }

    pub async fn audit_log(&self, id: &ApiId, query: &AuditQuery) -> VaultResult<Vec<AuditEvent>> {
        self.audit.query(id, query).await
    }

    // ==================== Workflows ====================

    /// Register a new document with its first version.
    pub async fn create_api(&self, request: &CreateApi) -> VaultResult<ApiMetadata> {
        let parsed = self.specs.check(request.spec.clone())?;
        let id = &request.api_id;
        let version = &request.version;

        self.locks
            .with_lock(&layout::document_resource(id), || async {
                self.locks
                    .with_lock(&layout::version_resource(id, version), || async {
                        if self.registry.api_exists(id).await? {
                            return Err(VaultError::conflict(format!(
                                "api '{}' already exists",
                                id
                            )));
                        }

                        let saved = self
                            .specs
                            .save_spec(id, version, &parsed.tree, request.format)
                            .await?;
                        let mut version_meta = VersionMetadata::new(version.clone(), &request.actor)
                            .with_description(request.description.clone().unwrap_or_default());
                        version_meta.stats = SpecStats::of(&parsed.tree, saved.size_bytes);
                        version_meta.checksum = Some(saved.checksum);
                        version_meta.dialect = Some(parsed.dialect.clone());

                        self.registry.discard_orphan_metadata(id, version).await?;
                        self.registry
                            .create_version_metadata(id, &version_meta)
                            .await?;

                        let mut api_meta = ApiMetadata::new(
                            id.clone(),
                            &request.name,
                            &request.owner,
                            version.clone(),
                        );
                        api_meta.description = request.description.clone();
                        let api_meta = self.registry.create_api_metadata(api_meta).await?;

                        self.audit
                            .log_event(
                                AuditEvent::new(AuditEventKind::ApiCreated, id.clone(), &request.actor)
                                    .with_version(version.clone())
                                    .with_details(json!({
                                        "name": request.name,
                                        "owner": request.owner,
                                        "dialect": parsed.dialect,
                                        "endpoints": version_meta.stats.endpoint_count,
                                        "schemas": version_meta.stats.schema_count,
                                    })),
                            )
                            .await?;
                        Ok(api_meta)
                    })
                    .await
            })
            .await
    }

    /// Add a version, either copied from an existing one or from supplied
    /// content. The change summary is computed against the parent.
    pub async fn create_version(&self, request: &CreateVersion) -> VaultResult<VersionMetadata> {
        let id = &request.api_id;
        let version = &request.version;

        self.locks
            .with_lock(&layout::document_resource(id), || async {
                self.locks
                    .with_lock(&layout::version_resource(id, version), || {
                        self.create_version_locked(request)
                    })
                    .await
            })
            .await
    }

    async fn create_version_locked(&self, request: &CreateVersion) -> VaultResult<VersionMetadata> {
        let id = &request.api_id;
        let version = &request.version;

        let api_meta = self.registry.get_api_metadata(id).await?;
        if api_meta.has_version(version) {
            return Err(VaultError::conflict(format!(
                "version '{}' already exists for api '{}'",
                version, id
            )));
        }
        if let Some(parent) = request.source.parent() {
            if !api_meta.has_version(parent) {
                return Err(VaultError::not_found(format!(
                    "parent version '{}' of api '{}'",
                    parent, id
                )));
            }
        }

        let (tree, dialect, stored_format, changes) = match &request.source {
            VersionSource::Copy { from } => {
                let source = self.specs.load_spec(id, from).await?;
                (source.tree, source.dialect, Some(source.format), ChangeSummary::default())
            }
            VersionSource::Content { spec, parent } => {
                let parsed = self.specs.check(spec.clone())?;
                let changes = match parent {
                    Some(parent) => {
                        let base = self.specs.load_spec(id, parent).await?;
                        self.diff.compare(&base.tree, &parsed.tree).to_change_summary()
                    }
                    None => ChangeSummary::default(),
                };
                (parsed.tree, parsed.dialect, None, changes)
            }
        };

        let format = request.format.or(stored_format);
        let saved = self.specs.save_spec(id, version, &tree, format).await?;

        let mut version_meta = VersionMetadata::new(version.clone(), &request.actor)
            .with_parent(request.source.parent().cloned())
            .with_description(request.description.clone())
            .with_changes(changes);
        version_meta.stats = SpecStats::of(&tree, saved.size_bytes);
        version_meta.checksum = Some(saved.checksum);
        version_meta.dialect = Some(dialect);

        self.registry.discard_orphan_metadata(id, version).await?;
        self.registry.create_version_metadata(id, &version_meta).await?;
        self.registry
            .add_version(id, version, request.make_current)
            .await?;

        self.audit
            .log_event(
                AuditEvent::new(AuditEventKind::VersionCreated, id.clone(), &request.actor)
                    .with_version(version.clone())
                    .with_details(json!({
                        "parent": version_meta.parent,
                        "make_current": request.make_current,
                        "breaking": version_meta.changes.is_breaking(),
                        "breaking_changes": version_meta.changes.breaking_changes,
                    })),
            )
            .await?;
        Ok(version_meta)
    }

    /// Load `id@version`, apply `mutate` to the tree and save it back.
    ///
    /// The mutated tree must still parse. Stats and checksum on the version
    /// metadata are refreshed.
    pub async fn update_spec<F>(
        &self,
        id: &ApiId,
        version: &VersionTag,
        actor: &str,
        reason: Option<String>,
        mutate: F,
    ) -> VaultResult<VersionMetadata>
    where
        F: FnOnce(&mut SpecTree) -> VaultResult<()>,
    {
        self.locks
            .with_lock(&layout::version_resource(id, version), || async {
                let api_meta = self.registry.get_api_metadata(id).await?;
                if !api_meta.has_version(version) {
                    return Err(VaultError::not_found(format!(
                        "version '{}' of api '{}'",
                        version, id
                    )));
                }

                let loaded = self.specs.load_spec(id, version).await?;
                let mut tree = loaded.tree.clone();
                mutate(&mut tree)?;
                let parsed = self.specs.check(tree)?;
                let delta = self.diff.compare(&loaded.tree, &parsed.tree);

                let saved = self
                    .specs
                    .save_spec(id, version, &parsed.tree, Some(loaded.format))
                    .await?;
                let stats = SpecStats::of(&parsed.tree, saved.size_bytes);
                let checksum = saved.checksum.clone();
                let dialect = parsed.dialect.clone();
                let version_meta = self
                    .registry
                    .amend_version_metadata(id, version, |meta| {
                        meta.stats = stats;
                        meta.checksum = Some(checksum);
                        meta.dialect = Some(dialect);
                    })
                    .await?;

                self.audit
                    .log_event(
                        AuditEvent::new(AuditEventKind::SpecUpdated, id.clone(), actor)
                            .with_version(version.clone())
                            .with_reason(reason)
                            .with_details(json!({
                                "summary": delta.summary_line(),
                                "breaking_changes": delta.breaking_changes,
                                "checksum": saved.checksum,
                            })),
                    )
                    .await?;
                Ok(version_meta)
            })
            .await
    }

    pub async fn update_api(
        &self,
        id: &ApiId,
        patch: &ApiMetadataPatch,
        actor: &str,
    ) -> VaultResult<ApiMetadata> {
        if patch.is_empty() {
            return Err(VaultError::validation("metadata patch changes nothing"));
        }
        self.locks
            .with_lock(&layout::document_resource(id), || async {
                let metadata = self.registry.update_api_metadata(id, patch).await?;
                self.audit
                    .log_event(
                        AuditEvent::new(AuditEventKind::MetadataUpdated, id.clone(), actor)
                            .with_details(json!({
                                "name": patch.name,
                                "owner": patch.owner,
                                "description": patch.description,
                            })),
                    )
                    .await?;
                Ok(metadata)
            })
            .await
    }

    pub async fn set_current(
        &self,
        id: &ApiId,
        version: &VersionTag,
        actor: &str,
        reason: Option<String>,
    ) -> VaultResult<ApiMetadata> {
        self.locks
            .with_lock(&layout::document_resource(id), || async {
                let previous = self.registry.get_api_metadata(id).await?.current;
                let metadata = self.registry.set_current_version(id, version).await?;
                self.audit
                    .log_event(
                        AuditEvent::new(AuditEventKind::CurrentChanged, id.clone(), actor)
                            .with_version(version.clone())
                            .with_reason(reason)
                            .with_details(json!({ "previous": previous })),
                    )
                    .await?;
                Ok(metadata)
            })
            .await
    }

    pub async fn set_stable(
        &self,
        id: &ApiId,
        version: &VersionTag,
        actor: &str,
        reason: Option<String>,
    ) -> VaultResult<ApiMetadata> {
        self.locks
            .with_lock(&layout::document_resource(id), || async {
                let previous = self.registry.get_api_metadata(id).await?.latest_stable;
                let metadata = self.registry.set_latest_stable(id, version).await?;
                self.audit
                    .log_event(
                        AuditEvent::new(AuditEventKind::StablePromoted, id.clone(), actor)
                            .with_version(version.clone())
                            .with_reason(reason)
                            .with_details(json!({ "previous": previous })),
                    )
                    .await?;
                Ok(metadata)
            })
            .await
    }

    /// Remove an unpinned version: registry entry, version metadata and
    /// content.
    pub async fn delete_version(
        &self,
        id: &ApiId,
        version: &VersionTag,
        actor: &str,
        reason: Option<String>,
    ) -> VaultResult<ApiMetadata> {
        self.locks
            .with_lock(&layout::document_resource(id), || async {
                self.locks
                    .with_lock(&layout::version_resource(id, version), || async {
                        let metadata = self.registry.delete_version(id, version).await?;
                        match self.specs.delete_spec(id, version).await {
                            Ok(()) => {}
                            Err(e) if e.is_not_found() => {}
                            Err(e) => return Err(e),
                        }
                        self.audit
                            .log_event(
                                AuditEvent::new(AuditEventKind::VersionDeleted, id.clone(), actor)
                                    .with_version(version.clone())
                                    .with_reason(reason),
                            )
                            .await?;
                        Ok(metadata)
                    })
                    .await
            })
            .await
    }

    /// Run `linter` over `id@version` and record the result on its metadata.
    pub async fn validate(
        &self,
        id: &ApiId,
        version: &VersionTag,
        actor: &str,
        linter: &dyn Linter,
    ) -> VaultResult<ValidationReport> {
        self.locks
            .with_lock(&layout::version_resource(id, version), || async {
                let loaded = self.specs.load_spec(id, version).await?;
                let issues = linter.lint(&loaded.tree);
                let snapshot = lint::snapshot(&issues);

                let recorded = snapshot.clone();
                self.registry
                    .amend_version_metadata(id, version, |meta| meta.validation = Some(recorded))
                    .await?;

                self.audit
                    .log_event(
                        AuditEvent::new(AuditEventKind::VersionValidated, id.clone(), actor)
                            .with_version(version.clone())
                            .with_details(serde_json::to_value(&snapshot).unwrap_or(Value::Null)),
                    )
                    .await?;
                Ok(ValidationReport { snapshot, issues })
            })
            .await
    }

    // ==================== Dispatch ====================

    /// Execute one boundary request, returning its JSON result
    pub async fn execute(&self, request: VaultRequest) -> VaultResult<Value> {
        match request {
            VaultRequest::ListApis => to_json(&self.list_apis().await?),
            VaultRequest::GetApi { api_id } => to_json(&self.get_api(&api_id).await?),
            VaultRequest::CreateApi(create) => to_json(&self.create_api(&create).await?),
            VaultRequest::UpdateApi {
                api_id,
                patch,
                actor,
            } => to_json(&self.update_api(&api_id, &patch, &actor).await?),
            VaultRequest::ListVersions { api_id } => to_json(&self.list_versions(&api_id).await?),
            VaultRequest::GetVersion { api_id, version } => {
                to_json(&self.get_version(&api_id, &version).await?)
            }
            VaultRequest::GetSpec { api_id, version } => {
                let loaded = self.get_spec(&api_id, version.as_ref()).await?;
                Ok(json!({
                    "dialect": loaded.dialect,
                    "format": loaded.format,
                    "stats": loaded.stats(),
                    "spec": loaded.tree,
                }))
            }
            VaultRequest::CreateVersion(create) => to_json(&self.create_version(&create).await?),
            VaultRequest::UpdateSpec {
                api_id,
                version,
                spec,
                actor,
                reason,
            } => {
                let updated = self
                    .update_spec(&api_id, &version, &actor, reason, |tree| {
                        *tree = spec;
                        Ok(())
                    })
                    .await?;
                to_json(&updated)
            }
            VaultRequest::SetCurrent {
                api_id,
                version,
                actor,
                reason,
            } => to_json(&self.set_current(&api_id, &version, &actor, reason).await?),
            VaultRequest::SetStable {
                api_id,
                version,
                actor,
                reason,
            } => to_json(&self.set_stable(&api_id, &version, &actor, reason).await?),
            VaultRequest::DeleteVersion {
                api_id,
                version,
                actor,
                reason,
            } => to_json(&self.delete_version(&api_id, &version, &actor, reason).await?),
            VaultRequest::Compare { api_id, from, to } => {
                let result = self.compare(&api_id, &from, &to).await?;
                let mut value = to_json(&result)?;
                if let Value::Object(map) = &mut value {
                    map.insert("summary".to_string(), Value::String(result.summary_line()));
                }
                Ok(value)
            }
            VaultRequest::Lineage { api_id, version } => {
                to_json(&self.lineage(&api_id, &version).await?)
            }
            VaultRequest::Validate {
                api_id,
                version,
                actor,
            } => to_json(&self.validate(&api_id, &version, &actor, &BasicLinter).await?),
            VaultRequest::AuditLog { api_id, query } => {
                to_json(&self.audit_log(&api_id, &query).await?)
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> VaultResult<Value> {
    serde_json::to_value(value).map_err(|e| VaultError::corrupt("execute", "response", e))
}
