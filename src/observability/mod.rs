//! Observability for apivault
//!
//! Structured JSON logging of lifecycle events. Observability is
//! read-only: it never changes the outcome of the operation it reports.
//!
//! ```ignore
//! use apivault::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::LockAcquired, &[("resource", "billing-api")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::ConfigLoaded);
        log_event_with_fields(Event::LockAcquired, &[("resource", "a/b")]);
    }
}
