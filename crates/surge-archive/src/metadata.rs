//! Archive metadata (`metadata.json`)
//!
//! The metadata entry carries the entry-point filename and pwd as written
//! by the archiving tool, plus the tool version. Key names are kept
//! verbatim for compatibility with archives already in the wild; legacy
//! archives predate the version field and store bare paths or shorthands
//! instead of URLs.

use serde::{Deserialize, Serialize};

/// The parsed `metadata.json` contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    /// Entry-point specifier as originally given.
    #[serde(default)]
    pub filename: String,

    /// Working directory the entry point was resolved from.
    #[serde(default)]
    pub pwd: String,

    /// Version of the tool that wrote the archive; empty for legacy
    /// archives, which also marks their filename/pwd as bare paths.
    #[serde(default, rename = "k6version")]
    pub version: String,
}

impl ArchiveMetadata {
    /// Whether this metadata predates URL-shaped filename/pwd fields.
    pub fn is_legacy(&self) -> bool {
        self.version.is_empty()
    }
}
