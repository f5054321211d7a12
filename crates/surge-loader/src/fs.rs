//! Scheme-partitioned in-memory filesystems
//!
//! The loader reads module bytes from one in-memory filesystem per URL
//! scheme and writes network responses back into the `https` one, so a
//! populated map is both the offline source and the write-through cache.
//! Keys are POSIX paths with a leading `/`; OS separators never appear here.

use crate::paths;
use std::collections::HashMap;
use thiserror::Error;

/// Scheme key for local files.
pub const FILE_SCHEME: &str = "file";

/// Scheme key for remote modules.
pub const HTTPS_SCHEME: &str = "https";

/// Errors reported by the in-memory filesystem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsError {
    /// Path missing from the filesystem.
    #[error("file does not exist: {0}")]
    NotFound(String),
}

/// A single in-memory filesystem: normalized path → content bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryFs {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryFs {
    /// Create an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the contents at `path`.
    pub fn read(&self, path: &str) -> Result<Vec<u8>, FsError> {
        self.entries
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    /// Write `data` at `path`, replacing any previous contents.
    pub fn write(&mut self, path: &str, data: &[u8]) -> Result<(), FsError> {
        self.entries.insert(normalize(path), data.to_vec());
        Ok(())
    }

    /// Check whether `path` is present.
    pub fn exists(&self, path: &str) -> bool {
        self.entries.contains_key(&normalize(path))
    }

    /// All `(path, data)` entries in sorted path order, for deterministic
    /// serialization.
    pub fn entries(&self) -> Vec<(&str, &[u8])> {
        let mut out: Vec<(&str, &[u8])> = self
            .entries
            .iter()
            .map(|(p, d)| (p.as_str(), d.as_slice()))
            .collect();
        out.sort_by_key(|(p, _)| *p);
        out
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the filesystem holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build a filesystem from `(path, data)` pairs.
impl<P: Into<String>, D: Into<Vec<u8>>> FromIterator<(P, D)> for MemoryFs {
    fn from_iter<I: IntoIterator<Item = (P, D)>>(iter: I) -> Self {
        let mut fs = MemoryFs::new();
        for (path, data) in iter {
            let _ = fs.write(&path.into(), &data.into());
        }
        fs
    }
}

/// Lexically clean a key and force the leading `/`.
fn normalize(path: &str) -> String {
    let cleaned = paths::clean(path);
    if cleaned == "." {
        "/".to_string()
    } else if cleaned.starts_with('/') {
        cleaned
    } else {
        format!("/{cleaned}")
    }
}

/// The scheme → filesystem map owned by the caller and shared with the
/// loader. Missing schemes read as not-found; writes create the scheme
/// entry on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FsMap {
    schemes: HashMap<String, MemoryFs>,
}

impl FsMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the filesystem for a scheme.
    pub fn insert(&mut self, scheme: &str, fs: MemoryFs) {
        self.schemes.insert(scheme.to_string(), fs);
    }

    /// The filesystem for `scheme`, if one is installed.
    pub fn get(&self, scheme: &str) -> Option<&MemoryFs> {
        self.schemes.get(scheme)
    }

    /// Mutable access to the filesystem for `scheme`.
    pub fn get_mut(&mut self, scheme: &str) -> Option<&mut MemoryFs> {
        self.schemes.get_mut(scheme)
    }

    /// Read `path` from the filesystem of `scheme`.
    pub fn read(&self, scheme: &str, path: &str) -> Result<Vec<u8>, FsError> {
        match self.schemes.get(scheme) {
            Some(fs) => fs.read(path),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    /// Write into the filesystem of `scheme`, creating it when absent.
    pub fn write(&mut self, scheme: &str, path: &str, data: &[u8]) -> Result<(), FsError> {
        self.schemes
            .entry(scheme.to_string())
            .or_default()
            .write(path, data)
    }

    /// Check whether `path` exists under `scheme`.
    pub fn exists(&self, scheme: &str, path: &str) -> bool {
        self.schemes.get(scheme).is_some_and(|fs| fs.exists(path))
    }

    /// Installed scheme names in sorted order.
    pub fn schemes(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.schemes.keys().map(|s| s.as_str()).collect();
        out.sort_unstable();
        out
    }
}
