//! Breaking-change policy.
//!
//! A change is breaking when a previously valid client payload could now be
//! rejected, or a previously guaranteed response field could now be absent.
//! Deleted endpoints and schemas, new required fields, optional fields
//! becoming required and type narrowing are always breaking. The rules
//! below are the judgement calls, switchable per deployment.

use serde::{Deserialize, Serialize};

/// Configurable breaking-change rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakingPolicy {
    /// Removing a value from an `enum` is breaking
    #[serde(default = "default_true")]
    pub enum_value_removal_breaking: bool,

    /// Changing a field's `format` is breaking
    #[serde(default = "default_true")]
    pub format_change_breaking: bool,

    /// Removing a previously present request body is breaking
    #[serde(default = "default_true")]
    pub request_body_removal_breaking: bool,
}

fn default_true() -> bool {
    true
}

impl Default for BreakingPolicy {
    fn default() -> Self {
        Self {
            enum_value_removal_breaking: true,
            format_change_breaking: true,
            request_body_removal_breaking: true,
        }
    }
}

impl BreakingPolicy {
    /// Only the rules that are always breaking
    pub fn lenient() -> Self {
        Self {
            enum_value_removal_breaking: false,
            format_change_breaking: false,
            request_body_removal_breaking: false,
        }
    }
}
