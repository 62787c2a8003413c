//! Spec store: load and save one version's content.
//!
//! Mutual exclusion is the caller's job. Any load, mutate, save sequence
//! must hold the version lock for its whole duration.

use std::sync::Arc;

use crate::errors::{BoxedCause, VaultError, VaultResult};
use crate::ids::{ApiId, VersionTag};
use crate::layout;
use crate::storage::{StorageBackend, StorageError};
use crate::tree::{SpecStats, SpecTree};

use super::dialect::{DialectParser, OpenApiDialect, ParsedSpec};
use super::format::SpecFormat;

/// One loaded version
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSpec {
    pub tree: SpecTree,
    pub dialect: String,
    pub format: SpecFormat,
    pub size_bytes: usize,
}

impl LoadedSpec {
    pub fn stats(&self) -> SpecStats {
        SpecStats::of(&self.tree, self.size_bytes)
    }
}

/// Result of a save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSpec {
    pub format: SpecFormat,
    pub size_bytes: usize,
    /// `crc32:xxxxxxxx` of the written bytes
    pub checksum: String,
}

/// Checksum of serialized content
pub fn content_checksum(bytes: &[u8]) -> String {
    format!("crc32:{:08x}", crc32fast::hash(bytes))
}

#[derive(Debug, Clone)]
pub struct SpecStore {
    backend: Arc<dyn StorageBackend>,
    parser: Arc<dyn DialectParser>,
    default_format: SpecFormat,
}

impl SpecStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            parser: Arc::new(OpenApiDialect),
            default_format: SpecFormat::default(),
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn DialectParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_default_format(mut self, format: SpecFormat) -> Self {
        self.default_format = format;
        self
    }

    pub fn default_format(&self) -> SpecFormat {
        self.default_format
    }

    fn unavailable(
        id: &ApiId,
        version: &VersionTag,
        missing: bool,
        source: impl Into<BoxedCause>,
    ) -> VaultError {
        VaultError::DocumentUnavailable {
            api_id: id.to_string(),
            version: version.to_string(),
            missing,
            source: source.into(),
        }
    }

    /// Stored key and raw bytes, trying each format in turn
    async fn read_raw(&self, id: &ApiId, version: &VersionTag) -> VaultResult<(String, Vec<u8>)> {
        for format in SpecFormat::ALL {
            let key = layout::spec_key(id, version, format);
            match self.backend.read(&key).await {
                Ok(bytes) => return Ok((key, bytes)),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(Self::unavailable(id, version, false, e)),
            }
        }
        Err(Self::unavailable(
            id,
            version,
            true,
            StorageError::NotFound {
                operation: "load_spec",
                key: layout::version_dir(id, version),
            },
        ))
    }

    /// Load, decode and parse the content of `id@version`.
    ///
    /// Absence and parse failure both surface as
    /// [`VaultError::DocumentUnavailable`].
    pub async fn load_spec(&self, id: &ApiId, version: &VersionTag) -> VaultResult<LoadedSpec> {
        let (key, bytes) = self.read_raw(id, version).await?;
        let format = SpecFormat::detect(&key, &bytes);

        let tree = format
            .decode(&bytes)
            .map_err(|e| Self::unavailable(id, version, false, e))?;
        let ParsedSpec { tree, dialect } = self
            .parser
            .parse(tree)
            .map_err(|e| Self::unavailable(id, version, false, e))?;

        Ok(LoadedSpec {
            tree,
            dialect,
            format,
            size_bytes: bytes.len(),
        })
    }

    /// Run the dialect parser over an in-memory tree
    pub fn check(&self, tree: SpecTree) -> VaultResult<ParsedSpec> {
        self.parser
            .parse(tree)
            .map_err(|e| VaultError::validation(format!("invalid document: {}", e)))
    }

    /// Serialize `tree` and write it atomically. A copy stored in the other
    /// format is removed afterwards so a version never has two contents.
    pub async fn save_spec(
        &self,
        id: &ApiId,
        version: &VersionTag,
        tree: &SpecTree,
        format: Option<SpecFormat>,
    ) -> VaultResult<SavedSpec> {
        let format = format.unwrap_or(self.default_format);
        let key = layout::spec_key(id, version, format);

        self.backend
            .ensure_directory(&layout::version_dir(id, version))
            .await
            .map_err(|e| VaultError::storage("save_spec", e))?;

        let bytes = format
            .encode(tree)
            .map_err(|e| VaultError::validation(format!("cannot encode document: {}", e)))?;
        self.backend
            .write(&key, &bytes)
            .await
            .map_err(|e| VaultError::storage("save_spec", e))?;

        for other in SpecFormat::ALL.into_iter().filter(|f| *f != format) {
            match self.backend.delete(&layout::spec_key(id, version, other)).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(VaultError::storage("save_spec", e)),
            }
        }

        Ok(SavedSpec {
            format,
            size_bytes: bytes.len(),
            checksum: content_checksum(&bytes),
        })
    }

    pub async fn spec_exists(&self, id: &ApiId, version: &VersionTag) -> VaultResult<bool> {
        for format in SpecFormat::ALL {
            let exists = self
                .backend
                .exists(&layout::spec_key(id, version, format))
                .await
                .map_err(|e| VaultError::storage("spec_exists", e))?;
            if exists {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Delete the content of `id@version` in whichever format it is stored.
    pub async fn delete_spec(&self, id: &ApiId, version: &VersionTag) -> VaultResult<()> {
        let mut deleted = false;
        for format in SpecFormat::ALL {
            match self.backend.delete(&layout::spec_key(id, version, format)).await {
                Ok(()) => deleted = true,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(VaultError::storage("delete_spec", e)),
            }
        }
        if deleted {
            Ok(())
        } else {
            Err(VaultError::not_found(format!(
                "content of version '{}' of api '{}'",
                version, id
            )))
        }
    }
}
