//! Append-only audit log, one JSON array per document.
//!
//! Events are stored in append order and served newest first. Appends are a
//! read, append, rewrite cycle; when a [`LockManager`] is attached the cycle
//! runs under the document's audit lock so concurrent appends never drop
//! an entry.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::event::{AuditEvent, AuditEventKind};
use super::query::AuditQuery;
use crate::errors::{VaultError, VaultResult};
use crate::ids::{ApiId, VersionTag};
use crate::layout;
use crate::lock::LockManager;
use crate::observability::{log_event_with_fields, Event};
use crate::records::{load_record, save_record};
use crate::storage::StorageBackend;

#[derive(Debug, Clone)]
pub struct AuditLog {
    backend: Arc<dyn StorageBackend>,
    locks: Option<LockManager>,
}

impl AuditLog {
    /// Audit log without its own locking. Callers serialize appends.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            locks: None,
        }
    }

    /// Audit log that takes the audit lock around every append and clear
    pub fn with_locks(backend: Arc<dyn StorageBackend>, locks: LockManager) -> Self {
        Self {
            backend,
            locks: Some(locks),
        }
    }

    pub fn is_locking(&self) -> bool {
        self.locks.is_some()
    }

    async fn load(&self, id: &ApiId) -> VaultResult<Vec<AuditEvent>> {
        let events: Option<Vec<AuditEvent>> =
            load_record(self.backend.as_ref(), "get_audit_log", &layout::audit_key(id)).await?;
        Ok(events.unwrap_or_default())
    }

    async fn append(&self, event: &AuditEvent) -> VaultResult<usize> {
        let mut events = self.load(&event.api_id).await?;
        events.push(event.clone());
        save_record(
            self.backend.as_ref(),
            "log_event",
            &layout::audit_key(&event.api_id),
            &events,
        )
        .await?;
        Ok(events.len())
    }

    /// Append `event` to its document's log
    pub async fn log_event(&self, event: AuditEvent) -> VaultResult<()> {
        let len = match &self.locks {
            Some(locks) => {
                locks
                    .with_lock(&layout::audit_resource(&event.api_id), || self.append(&event))
                    .await?
            }
            None => self.append(&event).await?,
        };
        log_event_with_fields(
            Event::AuditAppended,
            &[
                ("api", event.api_id.as_str()),
                ("kind", event.kind.as_str()),
                ("length", &len.to_string()),
            ],
        );
        Ok(())
    }

    /// Events newest first, optionally truncated to `limit`.
    ///
    /// Events with equal timestamps are returned latest-appended first.
    pub async fn get_audit_log(
        &self,
        id: &ApiId,
        limit: Option<usize>,
    ) -> VaultResult<Vec<AuditEvent>> {
        let mut events = self.load(id).await?;
        events.reverse();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            events.truncate(limit);
        }
        Ok(events)
    }

    pub async fn query(&self, id: &ApiId, query: &AuditQuery) -> VaultResult<Vec<AuditEvent>> {
        Ok(query.apply(self.get_audit_log(id, None).await?))
    }

    pub async fn by_version(
        &self,
        id: &ApiId,
        version: &VersionTag,
    ) -> VaultResult<Vec<AuditEvent>> {
        self.query(id, &AuditQuery::new().version(version.clone())).await
    }

    pub async fn by_kind(
        &self,
        id: &ApiId,
        kind: AuditEventKind,
    ) -> VaultResult<Vec<AuditEvent>> {
        self.query(id, &AuditQuery::new().kind(kind)).await
    }

    pub async fn by_actor(&self, id: &ApiId, actor: &str) -> VaultResult<Vec<AuditEvent>> {
        self.query(id, &AuditQuery::new().actor(actor)).await
    }

    pub async fn in_range(
        &self,
        id: &ApiId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> VaultResult<Vec<AuditEvent>> {
        self.query(id, &AuditQuery::new().between(since, until)).await
    }

    async fn remove(&self, id: &ApiId) -> VaultResult<bool> {
        match self.backend.delete(&layout::audit_key(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(VaultError::storage("clear_audit_log", e)),
        }
    }

    /// Delete the whole log. Irreversible. Returns whether a log existed.
    pub async fn clear_audit_log(&self, id: &ApiId) -> VaultResult<bool> {
        let existed = match &self.locks {
            Some(locks) => {
                locks
                    .with_lock(&layout::audit_resource(id), || self.remove(id))
                    .await?
            }
            None => self.remove(id).await?,
        };
        if existed {
            log_event_with_fields(Event::AuditCleared, &[("api", id.as_str())]);
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use chrono::Duration;

    fn id() -> ApiId {
        ApiId::new("billing-api").unwrap()
    }

    fn event(kind: AuditEventKind, actor: &str) -> AuditEvent {
        AuditEvent::new(kind, id(), actor)
    }

    #[tokio::test]
    async fn test_empty_log() {
        let log = AuditLog::new(Arc::new(MemoryBackend::new()));
        assert!(log.get_audit_log(&id(), None).await.unwrap().is_empty());
        assert!(!log.clear_audit_log(&id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_reverse_append_order() {
        let log = AuditLog::new(Arc::new(MemoryBackend::new()));
        let at = Utc::now();
        for actor in ["first", "second", "third"] {
            log.log_event(event(AuditEventKind::SpecUpdated, actor).at(at))
                .await
                .unwrap();
        }
        let actors: Vec<String> = log
            .get_audit_log(&id(), None)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.actor)
            .collect();
        assert_eq!(actors, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_filters() {
        let log = AuditLog::new(Arc::new(MemoryBackend::new()));
        let t0 = Utc::now();
        let v1 = VersionTag::new("v1.0.0").unwrap();

        log.log_event(event(AuditEventKind::ApiCreated, "alice").with_version(v1.clone()).at(t0))
            .await
            .unwrap();
        log.log_event(event(AuditEventKind::SpecUpdated, "bob").at(t0 + Duration::seconds(10)))
            .await
            .unwrap();
        log.log_event(
            event(AuditEventKind::SpecUpdated, "alice")
                .with_version(v1.clone())
                .at(t0 + Duration::seconds(20)),
        )
        .await
        .unwrap();

        assert_eq!(log.by_version(&id(), &v1).await.unwrap().len(), 2);
        assert_eq!(log.by_kind(&id(), AuditEventKind::SpecUpdated).await.unwrap().len(), 2);
        assert_eq!(log.by_actor(&id(), "bob").await.unwrap().len(), 1);

        let ranged = log
            .in_range(&id(), t0 + Duration::seconds(5), t0 + Duration::seconds(20))
            .await
            .unwrap();
        assert_eq!(ranged.len(), 2);
        assert_eq!(ranged[0].actor, "alice");

        let query = AuditQuery::new().actor("alice").limit(1);
        let limited = log.query(&id(), &query).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].timestamp, t0 + Duration::seconds(20));
    }

    #[tokio::test]
    async fn test_clear() {
        let log = AuditLog::new(Arc::new(MemoryBackend::new()));
        log.log_event(event(AuditEventKind::ApiCreated, "alice")).await.unwrap();
        assert!(log.clear_audit_log(&id()).await.unwrap());
        assert!(log.get_audit_log(&id(), None).await.unwrap().is_empty());
    }
}
