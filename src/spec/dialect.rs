//! Dialect parsing boundary.
//!
//! The store only decodes bytes into a tree. Deciding whether the tree is a
//! syntactically valid document, and which dialect it is, belongs to a
//! [`DialectParser`].

use serde_json::{Map, Value};
use thiserror::Error;

use crate::tree::SpecTree;

#[derive(Debug, Error)]
pub enum DialectError {
    #[error("document root must be an object")]
    NotAnObject,

    #[error("unrecognised dialect: {0}")]
    Unrecognised(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

/// Normalized tree plus the detected dialect tag
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSpec {
    pub tree: SpecTree,
    /// e.g. `openapi-3.0`, `swagger-2.0`
    pub dialect: String,
}

/// External parsing/normalization collaborator
pub trait DialectParser: Send + Sync + std::fmt::Debug {
    fn parse(&self, tree: SpecTree) -> Result<ParsedSpec, DialectError>;
}

/// OpenAPI 3.x and Swagger 2.0
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenApiDialect;

impl OpenApiDialect {
    fn detect(root: &Map<String, Value>) -> Result<String, DialectError> {
        if let Some(version) = root.get("openapi") {
            let version = version.as_str().ok_or(DialectError::WrongType {
                field: "openapi",
                expected: "a string",
            })?;
            let mut parts = version.split('.');
            return match (parts.next(), parts.next()) {
                (Some("3"), Some(minor)) if minor.chars().all(|c| c.is_ascii_digit()) => {
                    Ok(format!("openapi-3.{}", minor))
                }
                _ => Err(DialectError::Unrecognised(format!("openapi {}", version))),
            };
        }
        match root.get("swagger") {
            Some(Value::String(v)) if v == "2.0" => Ok("swagger-2.0".to_string()),
            Some(other) => Err(DialectError::Unrecognised(format!("swagger {}", other))),
            None => Err(DialectError::Unrecognised(
                "neither 'openapi' nor 'swagger' is declared".to_string(),
            )),
        }
    }
}

impl DialectParser for OpenApiDialect {
    fn parse(&self, mut tree: SpecTree) -> Result<ParsedSpec, DialectError> {
        let root = tree.as_object_mut().ok_or(DialectError::NotAnObject)?;
        let dialect = Self::detect(root)?;

        match root.get("info") {
            Some(Value::Object(_)) => {}
            Some(_) => {
                return Err(DialectError::WrongType {
                    field: "info",
                    expected: "an object",
                })
            }
            None => return Err(DialectError::MissingField("info")),
        }

        match root.get("paths") {
            Some(Value::Object(_)) => {}
            Some(Value::Null) | None => {
                root.insert("paths".to_string(), Value::Object(Map::new()));
            }
            Some(_) => {
                return Err(DialectError::WrongType {
                    field: "paths",
                    expected: "an object",
                })
            }
        }

        Ok(ParsedSpec { tree, dialect })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_openapi_3() {
        let parsed = OpenApiDialect
            .parse(json!({"openapi": "3.1.0", "info": {"title": "x", "version": "1"}}))
            .unwrap();
        assert_eq!(parsed.dialect, "openapi-3.1");
        assert_eq!(parsed.tree["paths"], json!({}));
    }

    #[test]
    fn test_swagger_2() {
        let parsed = OpenApiDialect
            .parse(json!({"swagger": "2.0", "info": {}, "paths": {}}))
            .unwrap();
        assert_eq!(parsed.dialect, "swagger-2.0");
    }

    #[test]
    fn test_rejects() {
        assert!(OpenApiDialect.parse(json!([1, 2])).is_err());
        assert!(OpenApiDialect.parse(json!({"info": {}})).is_err());
        assert!(OpenApiDialect.parse(json!({"openapi": "2.0", "info": {}})).is_err());
        assert!(OpenApiDialect.parse(json!({"openapi": "3.0.0"})).is_err());
        assert!(OpenApiDialect
            .parse(json!({"openapi": "3.0.0", "info": {}, "paths": []}))
            .is_err());
    }
}
