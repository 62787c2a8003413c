//! Spec store
//!
//! Loads and saves document content, one `(id, version)` pair at a time.
//! Syntactic validation and dialect detection are delegated to a
//! [`DialectParser`].

mod dialect;
mod format;
mod store;

pub use dialect::{DialectError, DialectParser, OpenApiDialect, ParsedSpec};
pub use format::{FormatError, SpecFormat};
pub use store::{content_checksum, LoadedSpec, SavedSpec, SpecStore};
