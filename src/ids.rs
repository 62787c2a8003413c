//! Document identifiers and version tags.
//!
//! Both are validated once at construction, so every key derived from them
//! is a safe single path segment.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{VaultError, VaultResult};

fn semantic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // At most 18 digits per component, so every component fits a u64
        Regex::new(
            r"^v(0|[1-9]\d{0,17})\.(0|[1-9]\d{0,17})\.(0|[1-9]\d{0,17})(?:-([0-9A-Za-z][0-9A-Za-z.-]*))?$",
        )
        .unwrap_or_else(|e| panic!("invalid semantic version pattern: {}", e))
    })
}

fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d{8}T\d{6}Z(?:-\d+)?$")
            .unwrap_or_else(|e| panic!("invalid timestamp version pattern: {}", e))
    })
}

/// Stable identifier of one logical document across all its versions
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiId(String);

impl ApiId {
    pub fn new(id: impl Into<String>) -> VaultResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(VaultError::validation("api id must not be empty"));
        }
        if id == "." || id == ".." || id.starts_with('.') {
            return Err(VaultError::validation(format!(
                "api id '{}' must not start with '.'",
                id
            )));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(VaultError::validation(format!(
                "api id '{}' may only contain letters, digits, '-', '_' and '.'",
                id
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ApiId {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ApiId {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApiId> for String {
    fn from(id: ApiId) -> Self {
        id.0
    }
}

/// Parsed form of a version tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionKind {
    /// `vMAJOR.MINOR.PATCH[-pre]`
    Semantic {
        major: u64,
        minor: u64,
        patch: u64,
        pre: Option<String>,
    },
    /// `YYYYMMDDTHHMMSSZ[-N]`
    Timestamp,
}

/// Immutable identifier of one snapshot within a document's history
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> VaultResult<Self> {
        let tag = tag.into();
        if semantic_pattern().is_match(&tag) || timestamp_pattern().is_match(&tag) {
            Ok(Self(tag))
        } else {
            Err(VaultError::validation(format!(
                "version tag '{}' must be vMAJOR.MINOR.PATCH or YYYYMMDDTHHMMSSZ",
                tag
            )))
        }
    }

    /// Timestamp-based tag for `at`
    pub fn timestamp(at: DateTime<Utc>) -> Self {
        Self(at.format("%Y%m%dT%H%M%SZ").to_string())
    }

    /// Timestamp-based tag for the current time
    pub fn timestamp_now() -> Self {
        Self::timestamp(Utc::now())
    }

    /// Disambiguated variant of a timestamp tag (`...Z-2`)
    pub fn with_sequence(&self, n: u32) -> VaultResult<Self> {
        let base = self.0.split('-').next().unwrap_or(&self.0);
        Self::new(format!("{}-{}", base, n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> VersionKind {
        match semantic_pattern().captures(&self.0) {
            Some(caps) => {
                let num = |i: usize| {
                    caps.get(i)
                        .and_then(|m| m.as_str().parse::<u64>().ok())
                        .unwrap_or(0)
                };
                VersionKind::Semantic {
                    major: num(1),
                    minor: num(2),
                    patch: num(3),
                    pre: caps.get(4).map(|m| m.as_str().to_string()),
                }
            }
            None => VersionKind::Timestamp,
        }
    }

    pub fn is_semantic(&self) -> bool {
        matches!(self.kind(), VersionKind::Semantic { .. })
    }

    /// `(major, minor, patch)` for semantic tags
    pub fn semver(&self) -> Option<(u64, u64, u64)> {
        match self.kind() {
            VersionKind::Semantic {
                major, minor, patch, ..
            } => Some((major, minor, patch)),
            VersionKind::Timestamp => None,
        }
    }

    /// Bumps return `None` for timestamp tags, or when the bumped component
    /// would no longer be a valid tag.
    pub fn next_patch(&self) -> Option<Self> {
        let (ma, mi, pa) = self.semver()?;
        Self::new(format!("v{}.{}.{}", ma, mi, pa.checked_add(1)?)).ok()
    }

    pub fn next_minor(&self) -> Option<Self> {
        let (ma, mi, _) = self.semver()?;
        Self::new(format!("v{}.{}.0", ma, mi.checked_add(1)?)).ok()
    }

    pub fn next_major(&self) -> Option<Self> {
        let (ma, _, _) = self.semver()?;
        Self::new(format!("v{}.0.0", ma.checked_add(1)?)).ok()
    }

    /// Precedence between two tags: semantic tags by number (a prerelease
    /// sorts before its release), timestamp tags lexically. Mixed kinds
    /// compare lexically.
    pub fn precedence(&self, other: &Self) -> Ordering {
        match (self.kind(), other.kind()) {
            (
                VersionKind::Semantic {
                    major: a1,
                    minor: b1,
                    patch: c1,
                    pre: p1,
                },
                VersionKind::Semantic {
                    major: a2,
                    minor: b2,
                    patch: c2,
                    pre: p2,
                },
            ) => (a1, b1, c1).cmp(&(a2, b2, c2)).then_with(|| match (p1, p2) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(x), Some(y)) => x.cmp(&y),
            }),
            _ => self.0.cmp(&other.0),
        }
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VersionTag {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for VersionTag {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VersionTag> for String {
    fn from(tag: VersionTag) -> Self {
        tag.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_semantic_tags() {
        let tag = VersionTag::new("v1.2.3").unwrap();
        assert_eq!(tag.semver(), Some((1, 2, 3)));
        assert!(VersionTag::new("v1.0.0-rc.1").unwrap().is_semantic());
    }

    #[test]
    fn test_timestamp_tags() {
        let at = Utc.with_ymd_and_hms(2026, 2, 4, 11, 30, 0).unwrap();
        let tag = VersionTag::timestamp(at);
        assert_eq!(tag.as_str(), "20260204T113000Z");
        assert_eq!(tag.kind(), VersionKind::Timestamp);
        assert_eq!(tag.with_sequence(2).unwrap().as_str(), "20260204T113000Z-2");
        assert!(VersionTag::new(tag.as_str()).is_ok());
    }

    #[test]
    fn test_rejects_malformed_tags() {
        for bad in ["", "1.0.0", "v1.0", "v1.0.0/..", "../v1.0.0", "v01.0.0", "latest"] {
            assert!(VersionTag::new(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_bumps() {
        let tag = VersionTag::new("v1.4.2").unwrap();
        assert_eq!(tag.next_patch().unwrap().as_str(), "v1.4.3");
        assert_eq!(tag.next_minor().unwrap().as_str(), "v1.5.0");
        assert_eq!(tag.next_major().unwrap().as_str(), "v2.0.0");
        assert!(VersionTag::timestamp_now().next_patch().is_none());
    }

    #[test]
    fn test_oversized_components_are_rejected() {
        assert!(VersionTag::new("v0.0.18446744073709551615").is_err());
        assert!(VersionTag::new("v99999999999999999999.0.0").is_err());

        let widest = VersionTag::new("v0.0.999999999999999999").unwrap();
        assert_eq!(widest.semver(), Some((0, 0, 999_999_999_999_999_999)));
        assert!(widest.next_patch().is_none());
        assert_eq!(widest.next_minor().unwrap().as_str(), "v0.1.0");
    }

    #[test]
    fn test_precedence() {
        let v = |s: &str| VersionTag::new(s).unwrap();
        assert_eq!(v("v1.10.0").precedence(&v("v1.9.0")), Ordering::Greater);
        assert_eq!(v("v1.0.0-rc.1").precedence(&v("v1.0.0")), Ordering::Less);
    }

    #[test]
    fn test_api_id_validation() {
        assert!(ApiId::new("billing-api").is_ok());
        assert!(ApiId::new("billing_api.v2").is_ok());
        for bad in ["", ".", "..", ".hidden", "a/b", "a b", "../etc"] {
            assert!(ApiId::new(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_serde_validates() {
        let tag: VersionTag = serde_json::from_str("\"v1.0.0\"").unwrap();
        assert_eq!(tag.as_str(), "v1.0.0");
        assert!(serde_json::from_str::<VersionTag>("\"../x\"").is_err());
    }
}
