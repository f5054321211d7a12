//! Surge script archives
//!
//! An archive is a plain tar stream snapshotting the scheme-partitioned
//! virtual filesystem of a test run, so the run replays offline and
//! byte-identically:
//!
//! - `metadata.json`: entry-point filename, pwd, and writer version
//! - `data`: the entry-point script bytes
//! - `files/...` (and `scripts/...` in older archives): the filesystems:
//!   `files/_/<path>` is the `file` scheme, with drive letters flattened
//!   (`files/_/C/x` ↔ `/C:/x`); any other path below the prefix is an
//!   `https` host path kept verbatim (`files/github.com/a` ↔
//!   `/github.com/a`)
//!
//! Reading re-resolves the metadata strings through the core resolver, so
//! filename and pwd come back as canonical module URLs.

use std::io::{Read, Write};

use surge_loader::paths;
use surge_loader::{
    resolve, FsError, FsMap, MemoryFs, ModuleUrl, ResolveError, FILE_SCHEME, HTTPS_SCHEME,
};
use thiserror::Error;

pub mod metadata;

pub use metadata::ArchiveMetadata;

/// Errors produced while reading or writing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// A top-level tar entry outside the known layout.
    #[error("unknown file prefix `{prefix}` for file `{file}`")]
    UnknownPrefix { prefix: String, file: String },

    /// The tar stream itself failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// `metadata.json` was not valid JSON.
    #[error("invalid metadata.json: {0}")]
    Metadata(#[from] serde_json::Error),

    /// The metadata filename/pwd did not resolve to a module URL.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The virtual filesystem rejected an entry.
    #[error(transparent)]
    Fs(#[from] FsError),

    /// The resolver base URL could not be built.
    #[error("invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A loaded (or to-be-written) script archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    /// Canonical URL of the entry-point module.
    pub filename_url: ModuleUrl,

    /// Canonical URL of the directory the entry point was resolved from.
    pub pwd_url: ModuleUrl,

    /// Raw metadata as stored in `metadata.json`.
    pub metadata: ArchiveMetadata,

    /// Entry-point script bytes (the root `data` entry), when present.
    pub data: Option<Vec<u8>>,

    /// The scheme-partitioned virtual filesystems.
    pub filesystems: FsMap,
}

impl Archive {
    /// Assemble an archive from metadata and filesystems, resolving the
    /// metadata strings into canonical URLs.
    pub fn new(
        metadata: ArchiveMetadata,
        data: Option<Vec<u8>>,
        filesystems: FsMap,
    ) -> Result<Self, ArchiveError> {
        let (filename_url, pwd_url) = resolve_metadata(&metadata)?;
        Ok(Self {
            filename_url,
            pwd_url,
            metadata,
            data,
            filesystems,
        })
    }

    /// Read an archive from a tar stream.
    pub fn read<R: Read>(reader: R) -> Result<Self, ArchiveError> {
        let mut tar = tar::Archive::new(reader);
        let mut metadata: Option<ArchiveMetadata> = None;
        let mut data: Option<Vec<u8>> = None;
        let mut filesystems = FsMap::new();
        filesystems.insert(FILE_SCHEME, MemoryFs::new());
        filesystems.insert(HTTPS_SCHEME, MemoryFs::new());

        for entry in tar.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;

            let cleaned = paths::clean(&format!("/{}", name.trim_start_matches('/')));
            match cleaned.as_str() {
                "/metadata.json" => metadata = Some(serde_json::from_slice(&contents)?),
                "/data" => data = Some(contents),
                _ => {
                    let trimmed = &cleaned[1..];
                    let (prefix, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));
                    match prefix {
                        "files" | "scripts" => {
                            route_entry(&mut filesystems, rest, &contents)?;
                        }
                        other => {
                            return Err(ArchiveError::UnknownPrefix {
                                prefix: other.to_string(),
                                file: name,
                            })
                        }
                    }
                }
            }
        }

        let metadata = metadata.unwrap_or_default();
        let (filename_url, pwd_url) = resolve_metadata(&metadata)?;

        Ok(Self {
            filename_url,
            pwd_url,
            metadata,
            data,
            filesystems,
        })
    }

    /// Write the archive as a tar stream, entries in deterministic order.
    pub fn write<W: Write>(&self, writer: W) -> Result<(), ArchiveError> {
        let mut builder = tar::Builder::new(writer);

        let metadata_bytes = serde_json::to_vec_pretty(&self.metadata)?;
        append_file(&mut builder, "metadata.json", &metadata_bytes)?;

        if let Some(data) = &self.data {
            append_file(&mut builder, "data", data)?;
        }

        for scheme in self.filesystems.schemes() {
            let Some(fs) = self.filesystems.get(scheme) else {
                continue;
            };
            for (path, bytes) in fs.entries() {
                append_file(&mut builder, &entry_name(scheme, path), bytes)?;
            }
        }

        builder.finish()?;
        Ok(())
    }
}

/// Place one `files/`-relative entry into the right scheme filesystem.
fn route_entry(filesystems: &mut FsMap, rest: &str, contents: &[u8]) -> Result<(), FsError> {
    if rest.is_empty() {
        return Ok(());
    }

    if let Some(local) = rest.strip_prefix("_/") {
        let path = decode_drive(&format!("/{local}"));
        return filesystems.write(FILE_SCHEME, &path, contents);
    }
    if rest == "_" {
        return Ok(());
    }

    filesystems.write(HTTPS_SCHEME, &format!("/{rest}"), contents)
}

/// `/C/x` → `/C:/x` when the first segment is a lone letter (a flattened
/// drive); anything else passes through.
fn decode_drive(path: &str) -> String {
    let bytes = path.as_bytes();
    if bytes.len() >= 2
        && bytes[0] == b'/'
        && bytes[1].is_ascii_alphabetic()
        && (bytes.len() == 2 || bytes[2] == b'/')
    {
        format!("/{}:{}", &path[1..2], &path[2..])
    } else {
        path.to_string()
    }
}

/// `/C:/x` → `/C/x`, the inverse of [`decode_drive`].
fn encode_drive(path: &str) -> String {
    let bytes = path.as_bytes();
    if bytes.len() >= 3
        && bytes[0] == b'/'
        && bytes[1].is_ascii_alphabetic()
        && bytes[2] == b':'
        && (bytes.len() == 3 || bytes[3] == b'/')
    {
        format!("/{}{}", &path[1..2], &path[3..])
    } else {
        path.to_string()
    }
}

/// The tar entry name for a filesystem path.
fn entry_name(scheme: &str, path: &str) -> String {
    if scheme == FILE_SCHEME {
        format!("files/_{}", encode_drive(path))
    } else {
        format!("files{path}")
    }
}

fn append_file<W: Write>(
    builder: &mut tar::Builder<W>,
    name: &str,
    data: &[u8],
) -> Result<(), ArchiveError> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    builder.append_data(&mut header, name, data)?;
    Ok(())
}

/// Resolve the metadata filename/pwd strings into canonical URLs. Legacy
/// metadata stores bare paths, which are POSIX-cleaned first; versioned
/// metadata stores URL-shaped strings that cleaning would corrupt.
fn resolve_metadata(
    metadata: &ArchiveMetadata,
) -> Result<(ModuleUrl, ModuleUrl), ArchiveError> {
    let base = ModuleUrl::parse("file:///")?;

    let filename_url = resolve(&base, &meta_path(&metadata.filename, metadata.is_legacy()))?;
    let pwd = meta_path(&metadata.pwd, metadata.is_legacy());
    let pwd_url = if pwd.is_empty() {
        filename_url.dir()
    } else {
        resolve(&base, &pwd)?
    };

    Ok((filename_url, pwd_url))
}

fn meta_path(raw: &str, legacy: bool) -> String {
    if !legacy || raw.is_empty() {
        return raw.to_string();
    }
    paths::clean(&raw.replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_drive() {
        assert_eq!(decode_drive("/C/something/path"), "/C:/something/path");
        assert_eq!(decode_drive("/c"), "/c:");
        assert_eq!(decode_drive("/absolute/path"), "/absolute/path");
        assert_eq!(decode_drive("/1/x"), "/1/x");
    }

    #[test]
    fn test_encode_drive() {
        assert_eq!(encode_drive("/C:/something/path"), "/C/something/path");
        assert_eq!(encode_drive("/c:"), "/c");
        assert_eq!(encode_drive("/absolute/path"), "/absolute/path");
        assert_eq!(encode_drive("/C:oops"), "/C:oops");
    }

    #[test]
    fn test_entry_name() {
        assert_eq!(
            entry_name(FILE_SCHEME, "/C:/something/path"),
            "files/_/C/something/path"
        );
        assert_eq!(entry_name(FILE_SCHEME, "/absolute/path"), "files/_/absolute/path");
        assert_eq!(
            entry_name(HTTPS_SCHEME, "/github.com/user/repo/a.js"),
            "files/github.com/user/repo/a.js"
        );
    }

    #[test]
    fn test_meta_path_cleans_only_legacy() {
        assert_eq!(meta_path("example.com/something/", true), "example.com/something");
        assert_eq!(
            meta_path("https://example.com/something", false),
            "https://example.com/something"
        );
        assert_eq!(meta_path("", true), "");
    }
}
