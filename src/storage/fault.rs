//! Fault injection for testing write atomicity
//!
//! A fault point is a named step inside the atomic write path. When a point
//! is armed, reaching it fails the write with an injected I/O error, which
//! exercises the same cleanup path a real disk error would.
//!
//! Points can be armed per backend with [`FaultPoints::arm`], or for the
//! whole process through the `APIVAULT_FAULT_POINT` environment variable:
//!
//! ```bash
//! APIVAULT_FAULT_POINT=storage_before_rename apivault import ...
//! ```

use std::io;
use std::sync::{Mutex, OnceLock};

use crate::observability::{log_event_with_fields, Event};

/// Environment variable naming a process-wide fault point
pub const FAULT_POINT_ENV: &str = "APIVAULT_FAULT_POINT";

static ENV_FAULT_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn env_fault_point() -> Option<&'static str> {
    ENV_FAULT_POINT
        .get_or_init(|| std::env::var(FAULT_POINT_ENV).ok())
        .as_deref()
}

/// All defined fault point names
pub mod points {
    /// Before the temp file is created
    pub const STORAGE_BEFORE_TEMP_WRITE: &str = "storage_before_temp_write";
    /// After the temp file content is written, before fsync
    pub const STORAGE_AFTER_TEMP_WRITE: &str = "storage_after_temp_write";
    /// After fsync, before the rename onto the destination
    pub const STORAGE_BEFORE_RENAME: &str = "storage_before_rename";

    /// Get all fault point names
    pub fn all() -> &'static [&'static str] {
        &[
            STORAGE_BEFORE_TEMP_WRITE,
            STORAGE_AFTER_TEMP_WRITE,
            STORAGE_BEFORE_RENAME,
        ]
    }
}

/// Set of fault points armed on one backend
#[derive(Debug, Default)]
pub struct FaultPoints {
    armed: Mutex<Vec<String>>,
}

impl FaultPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a fault point. It stays armed until [`FaultPoints::disarm`].
    pub fn arm(&self, name: &str) {
        if let Ok(mut armed) = self.armed.lock() {
            if !armed.iter().any(|p| p == name) {
                armed.push(name.to_string());
            }
        }
    }

    /// Disarm a fault point
    pub fn disarm(&self, name: &str) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.retain(|p| p != name);
        }
    }

    /// Check if a fault point is armed here or through the environment
    pub fn is_armed(&self, name: &str) -> bool {
        if env_fault_point() == Some(name) {
            return true;
        }
        self.armed
            .lock()
            .map(|armed| armed.iter().any(|p| p == name))
            .unwrap_or(false)
    }

    /// Fail with an injected I/O error if the point is armed
    pub fn check(&self, name: &str) -> io::Result<()> {
        if self.is_armed(name) {
            log_event_with_fields(Event::FaultInjected, &[("point", name)]);
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected fault at {}", name),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_point_disabled_by_default() {
        let faults = FaultPoints::new();
        assert!(!faults.is_armed("storage_before_rename"));
        assert!(faults.check("storage_before_rename").is_ok());
    }

    #[test]
    fn test_arm_and_disarm() {
        let faults = FaultPoints::new();
        faults.arm(points::STORAGE_BEFORE_RENAME);
        assert!(faults.check(points::STORAGE_BEFORE_RENAME).is_err());
        assert!(faults.check(points::STORAGE_AFTER_TEMP_WRITE).is_ok());

        faults.disarm(points::STORAGE_BEFORE_RENAME);
        assert!(faults.check(points::STORAGE_BEFORE_RENAME).is_ok());
    }

    #[test]
    fn test_fault_point_names_are_lowercase_with_underscores() {
        for point in points::all() {
            assert!(point.chars().all(|c| c.is_lowercase() || c == '_'));
        }
    }
}
