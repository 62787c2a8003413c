//! Audit log
//!
//! Append-only per-document event history. The log is never edited in
//! place: it is only appended to or cleared as a whole.

mod event;
mod log;
mod query;

pub use event::{AuditEvent, AuditEventKind};
pub use log::AuditLog;
pub use query::AuditQuery;
