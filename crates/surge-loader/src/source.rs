//! Entry-point reading
//!
//! `read_source` is the façade callers hand a raw command-line specifier
//! to: `-` drains stdin into the virtual filesystem, anything else goes
//! through resolution and loading against a `file`-scheme pwd.

use crate::fetcher::Fetcher;
use crate::fs::{FsError, FsMap, FILE_SCHEME};
use crate::loader::{self, LoadError, SourceData};
use crate::paths;
use crate::resolver::{self, ResolveError};
use crate::url::ModuleUrl;
use std::io::Read;
use thiserror::Error;
use url::Url;

/// Errors produced while reading an entry-point source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The specifier could not be resolved.
    #[error(transparent)]
    Resolve(ResolveError),

    /// The resolved URL could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The virtual filesystem rejected the stdin write.
    #[error(transparent)]
    Fs(#[from] FsError),

    /// Reading stdin failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The pwd string could not be shaped into a base URL.
    #[error("invalid pwd: {0}")]
    InvalidPwd(#[from] url::ParseError),
}

/// Read the entry-point `specifier`.
///
/// `-` reads all of `stdin` and registers it in the `file` filesystem under
/// `/-` so archives capture it; any other specifier is resolved against
/// `pwd` (a local directory path) and loaded through `filesystems` and
/// `fetcher`.
pub fn read_source(
    specifier: &str,
    pwd: &str,
    filesystems: &mut FsMap,
    fetcher: &dyn Fetcher,
    stdin: &mut dyn Read,
) -> Result<SourceData, SourceError> {
    if specifier == "-" {
        let mut data = Vec::new();
        stdin.read_to_end(&mut data)?;
        filesystems.write(FILE_SCHEME, "/-", &data)?;
        return Ok(SourceData {
            url: ModuleUrl::parse("file:///-")?,
            data,
        });
    }

    let pwd_url = pwd_url(pwd)?;
    let resolved = match resolver::resolve(&pwd_url, &specifier.replace('\\', "/")) {
        Ok(url) => url,
        // A bare specifier that cannot be remote at all: report it the way
        // a missing local file is reported, naming the raw specifier.
        Err(ResolveError::NotHostPath { .. }) => {
            return Err(SourceError::Load(LoadError::FileNotFound {
                specifier: specifier.to_string(),
            }))
        }
        Err(err) => return Err(SourceError::Resolve(err)),
    };

    Ok(loader::load(filesystems, fetcher, &resolved, specifier)?)
}

/// Shape a local directory string into a `file` base URL with a trailing
/// slash, anchoring drive letters the same way the resolver does.
fn pwd_url(pwd: &str) -> Result<ModuleUrl, url::ParseError> {
    let cleaned = paths::clean(&pwd.replace('\\', "/"));
    let mut path = if cleaned == "." {
        "/".to_string()
    } else if paths::has_drive_letter(&cleaned) {
        format!("/{cleaned}")
    } else if cleaned.starts_with('/') {
        cleaned
    } else {
        format!("/{cleaned}")
    };
    if !path.ends_with('/') {
        path.push('/');
    }

    let mut base = Url::parse("file:///")?;
    base.set_path(&path);
    Ok(ModuleUrl::Url(base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pwd_url_shapes() {
        let cases = [
            ("/path/to/pwd", "file:///path/to/pwd/"),
            ("/path/to/pwd/", "file:///path/to/pwd/"),
            ("", "file:///"),
            ("C:\\something", "file:///C:/something/"),
            ("/", "file:///"),
        ];
        for (input, expected) in cases {
            assert_eq!(
                pwd_url(input).unwrap(),
                ModuleUrl::parse(expected).unwrap(),
                "for {input:?}"
            );
        }
    }
}
