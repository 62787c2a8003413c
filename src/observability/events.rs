//! Observable events emitted by the vault.
//!
//! Events are explicit and typed; the logger only ever sees their
//! SCREAMING_SNAKE names.

use std::fmt;

use super::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Storage
    /// Atomic write committed
    StorageWrite,
    /// Key deleted
    StorageDelete,
    /// Temp file could not be removed after a failed write
    TempCleanupFailed,
    /// Injected fault triggered
    FaultInjected,

    // Locking
    /// Lease acquired
    LockAcquired,
    /// Lease released
    LockReleased,
    /// Lease was held by someone else, retrying
    LockContended,
    /// Abandoned lease removed
    LockStaleBroken,
    /// Retry budget exhausted
    LockTimeout,
    /// Lease file could not be removed on release
    LockReleaseFailed,
    /// Administrative unlock
    LockForced,

    // Registry
    /// Document metadata created
    ApiCreated,
    /// Version registered
    VersionCreated,
    /// Version removed
    VersionDeleted,
    /// Pointer moved
    PointerMoved,

    // Audit
    /// Audit event appended
    AuditAppended,
    /// Audit log cleared
    AuditCleared,
}

impl Event {
    /// Returns the event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::StorageWrite => "STORAGE_WRITE",
            Event::StorageDelete => "STORAGE_DELETE",
            Event::TempCleanupFailed => "STORAGE_TEMP_CLEANUP_FAILED",
            Event::FaultInjected => "FAULT_INJECTED",
            Event::LockAcquired => "LOCK_ACQUIRED",
            Event::LockReleased => "LOCK_RELEASED",
            Event::LockContended => "LOCK_CONTENDED",
            Event::LockStaleBroken => "LOCK_STALE_BROKEN",
            Event::LockTimeout => "LOCK_TIMEOUT",
            Event::LockReleaseFailed => "LOCK_RELEASE_FAILED",
            Event::LockForced => "LOCK_FORCED",
            Event::ApiCreated => "API_CREATED",
            Event::VersionCreated => "VERSION_CREATED",
            Event::VersionDeleted => "VERSION_DELETED",
            Event::PointerMoved => "POINTER_MOVED",
            Event::AuditAppended => "AUDIT_APPENDED",
            Event::AuditCleared => "AUDIT_CLEARED",
        }
    }

    /// Whether this event reports a degraded condition
    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::StorageWrite
            | Event::StorageDelete
            | Event::LockAcquired
            | Event::LockReleased
            | Event::LockContended => Severity::Trace,
            Event::FaultInjected | Event::LockStaleBroken | Event::LockTimeout | Event::LockForced => {
                Severity::Warn
            }
            Event::TempCleanupFailed | Event::LockReleaseFailed => Severity::Error,
            _ => Severity::Info,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.severity() >= Severity::Warn
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_screaming_snake() {
        for event in [Event::StorageWrite, Event::LockStaleBroken, Event::AuditCleared] {
            assert!(event
                .as_str()
                .chars()
                .all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_warning_classification() {
        assert!(Event::LockTimeout.is_warning());
        assert!(!Event::LockAcquired.is_warning());
        assert_eq!(Event::LockAcquired.severity(), Severity::Trace);
        assert_eq!(Event::LockReleaseFailed.severity(), Severity::Error);
        assert_eq!(Event::ApiCreated.severity(), Severity::Info);
    }
}
