//! Structured JSON logger for apivault
//!
//! - One log line = one event
//! - Keys sorted, so lines for the same event diff cleanly
//! - Synchronous, no buffering
//!
//! Lines go to stderr. Stdout carries CLI responses only.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use chrono::{SecondsFormat, Utc};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace,
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Logger;

impl Logger {
    /// Write one event line to stderr.
    ///
    /// `event`, `severity` and `ts` are reserved; a field with one of those
    /// names is dropped.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        Self::write_line(&mut io::stderr().lock(), &Self::render(severity, event, fields));
    }

    fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut line: BTreeMap<&str, &str> = fields
            .iter()
            .filter(|(key, _)| !matches!(*key, "event" | "severity" | "ts"))
            .map(|(key, value)| (*key, *value))
            .collect();
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        line.insert("event", event);
        line.insert("severity", severity.as_str());
        line.insert("ts", &ts);

        // A map of strings always serializes
        serde_json::to_string(&line).unwrap_or_default()
    }

    fn write_line<W: Write>(writer: &mut W, line: &str) {
        // Logging must never fail the caller
        let _ = writeln!(writer, "{}", line);
        let _ = writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut buffer = Vec::new();
        Logger::write_line(&mut buffer, &Logger::render(severity, event, fields));
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
    }

    #[test]
    fn test_line_is_json() {
        let output = capture(Severity::Info, "LOCK_ACQUIRED", &[("resource", "billing-api")]);

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "LOCK_ACQUIRED");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["resource"], "billing-api");
        assert!(parsed["ts"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_field_order_is_sorted() {
        let output = capture(Severity::Info, "TEST", &[("zebra", "1"), ("apple", "2")]);
        assert!(output.find("apple").unwrap() < output.find("zebra").unwrap());
    }

    #[test]
    fn test_reserved_fields_are_dropped() {
        let output = capture(Severity::Warn, "REAL", &[("event", "FAKE"), ("api_id", "x")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "REAL");
        assert_eq!(parsed["api_id"], "x");
    }

    #[test]
    fn test_special_chars_stay_on_one_line() {
        let output = capture(Severity::Warn, "TEST", &[("key", "a/\"b\"\nc")]);

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["key"], "a/\"b\"\nc");
        assert_eq!(output.matches('\n').count(), 1);
    }
}
