//! Filters over a document's audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{AuditEvent, AuditEventKind};
use crate::ids::VersionTag;

/// Conjunction of optional filters. `since` and `until` are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub version: Option<VersionTag>,
    #[serde(default)]
    pub kind: Option<AuditEventKind>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: VersionTag) -> Self {
        self.version = Some(version);
        self
    }

    pub fn kind(mut self, kind: AuditEventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(version) = &self.version {
            if event.version.as_ref() != Some(version) {
                return false;
            }
        }
        if let Some(kind) = &self.kind {
            if &event.kind != kind {
                return false;
            }
        }
        if let Some(actor) = &self.actor {
            if &event.actor != actor {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp > until {
                return false;
            }
        }
        true
    }

    /// Filter an already newest-first trail, applying the limit last
    pub fn apply(&self, events: Vec<AuditEvent>) -> Vec<AuditEvent> {
        let filtered = events.into_iter().filter(|e| self.matches(e));
        match self.limit {
            Some(limit) => filtered.take(limit).collect(),
            None => filtered.collect(),
        }
    }
}
