//! Serialization formats for document content.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::tree::SpecTree;

/// Encoding failures
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported YAML value: {0}")]
    Unsupported(String),
}

/// On-disk serialization of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecFormat {
    /// Structured text (default)
    #[default]
    Yaml,
    /// Compact text
    Json,
}

impl SpecFormat {
    pub const ALL: [SpecFormat; 2] = [SpecFormat::Yaml, SpecFormat::Json];

    pub fn extension(&self) -> &'static str {
        match self {
            SpecFormat::Yaml => "yaml",
            SpecFormat::Json => "json",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(SpecFormat::Yaml),
            "json" => Some(SpecFormat::Json),
            _ => None,
        }
    }

    /// Guess from content: a leading `{` or `[` means JSON
    pub fn probe(bytes: &[u8]) -> Self {
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') | Some(b'[') => SpecFormat::Json,
            _ => SpecFormat::Yaml,
        }
    }

    /// Extension of `name` first, content probe otherwise
    pub fn detect(name: &str, bytes: &[u8]) -> Self {
        name.rsplit_once('.')
            .and_then(|(_, ext)| Self::from_extension(ext))
            .unwrap_or_else(|| Self::probe(bytes))
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<SpecTree, FormatError> {
        match self {
            SpecFormat::Json => Ok(serde_json::from_slice(bytes)?),
            SpecFormat::Yaml => {
                let value: serde_yaml::Value = serde_yaml::from_slice(bytes)?;
                yaml_to_tree(value)
            }
        }
    }

    pub fn encode(&self, tree: &SpecTree) -> Result<Vec<u8>, FormatError> {
        match self {
            SpecFormat::Json => {
                let mut bytes = serde_json::to_vec_pretty(tree)?;
                bytes.push(b'\n');
                Ok(bytes)
            }
            SpecFormat::Yaml => Ok(serde_yaml::to_string(tree)?.into_bytes()),
        }
    }
}

impl fmt::Display for SpecFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for SpecFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| format!("unknown format '{}'", s))
    }
}

/// YAML allows non-string mapping keys (`200:` under `responses`); the tree
/// only has string keys, so scalar keys are rendered as text.
fn yaml_to_tree(value: serde_yaml::Value) -> Result<SpecTree, FormatError> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| FormatError::Unsupported(format!("number {}", n)))?
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_tree)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                map.insert(yaml_key(key)?, yaml_to_tree(value)?);
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => yaml_to_tree(tagged.value)?,
    })
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, FormatError> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        other => Err(FormatError::Unsupported(format!(
            "non-scalar mapping key {:?}",
            other
        ))),
    }
}
