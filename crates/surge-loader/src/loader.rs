//! Module loading
//!
//! Maps a canonical URL to a scheme and a path on that scheme's in-memory
//! filesystem and reads the bytes. Only an `https` miss goes further:
//! shorthands are expanded, the network is asked, and the response is
//! written back into the filesystem so later loads (and archive snapshots)
//! see it.

use crate::fetcher::{self, FetchError, Fetcher};
use crate::fs::{FsError, FsMap, HTTPS_SCHEME};
use crate::paths;
use crate::registry::{self, RegistryError};
use crate::url::ModuleUrl;
use percent_encoding::percent_decode_str;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// A loaded module: its canonical URL and raw bytes.
///
/// The URL is always the pre-expansion one: a shorthand module keeps its
/// shorthand identity so archives reproduce byte-identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceData {
    /// Canonical URL the module was requested as.
    pub url: ModuleUrl,
    /// Module contents.
    pub data: Vec<u8>,
}

/// Errors produced while loading a resolved module URL.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A `file`-scheme module was not present in the local filesystem.
    #[error(
        "The moduleSpecifier \"{specifier}\" couldn't be found on local disk. \
         Make sure that you've specified the right path to the file. If you're \
         running surge using the Docker image make sure you have mounted the \
         local directory (-v /local/path/:/inside/docker/path) containing your \
         script and modules so that they're accessible by surge from inside of \
         the container."
    )]
    FileNotFound { specifier: String },

    /// The network fetch for an `https`-scheme module failed.
    #[error(
        "The moduleSpecifier \"{specifier}\" couldn't be retrieved from the \
         resolved url \"{url}\". Error : \"{source}\""
    )]
    RemoteLoad {
        specifier: String,
        url: String,
        source: FetchError,
    },

    /// Shorthand expansion failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The filesystem path decoded from the URL was not valid UTF-8.
    #[error("invalid percent-encoding in module path \"{path}\": {source}")]
    PathDecode {
        path: String,
        source: std::str::Utf8Error,
    },

    /// A URL produced during loading did not parse.
    #[error("invalid module URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Load the module at `module_url` from `filesystems`, fetching and caching
/// on an `https` miss. `original_specifier` is the raw import string, used
/// only for error reporting.
pub fn load(
    filesystems: &mut FsMap,
    fetcher: &dyn Fetcher,
    module_url: &ModuleUrl,
    original_specifier: &str,
) -> Result<SourceData, LoadError> {
    debug!(module = %module_url, specifier = original_specifier, "loading module");

    let scheme = module_url.fetch_scheme().to_string();
    let path_on_fs = path_on_fs(module_url)?;

    match filesystems.read(&scheme, &path_on_fs) {
        Ok(data) => Ok(SourceData {
            url: module_url.clone(),
            data,
        }),
        Err(FsError::NotFound(_)) if scheme == HTTPS_SCHEME => {
            let final_url = final_fetch_url(fetcher, module_url)?;
            let data = fetcher::fetch_remote(fetcher, &final_url).map_err(|source| {
                LoadError::RemoteLoad {
                    specifier: original_specifier.to_string(),
                    url: final_url.to_string(),
                    source,
                }
            })?;

            // Cache fill is best effort; a failed write must not fail the
            // load that just succeeded.
            let _ = filesystems.write(HTTPS_SCHEME, &path_on_fs, &data);

            Ok(SourceData {
                url: module_url.clone(),
                data,
            })
        }
        Err(FsError::NotFound(_)) => Err(LoadError::FileNotFound {
            specifier: module_url.to_string(),
        }),
    }
}

/// The filesystem key for a canonical URL: a cleaned, percent-decoded POSIX
/// path with a leading `/`.
fn path_on_fs(module_url: &ModuleUrl) -> Result<String, LoadError> {
    let raw = match module_url {
        ModuleUrl::Shorthand(opaque) => paths::join(&["/", opaque]),
        ModuleUrl::Schemeless { host, path } => paths::clean(&format!("/{host}{path}")),
        // Strip `scheme:/` from the serialized form; the remaining
        // `/host/path` (or `//path` for file URLs) cleans to the key.
        ModuleUrl::Url(u) => paths::clean(&u.as_str()[u.scheme().len() + ":/".len()..]),
    };

    match percent_decode_str(&raw).decode_utf8() {
        Ok(decoded) => Ok(decoded.into_owned()),
        Err(source) => Err(LoadError::PathDecode { path: raw, source }),
    }
}

/// The URL actually handed to the fetcher on an `https` miss.
fn final_fetch_url(fetcher: &dyn Fetcher, module_url: &ModuleUrl) -> Result<Url, LoadError> {
    match module_url {
        ModuleUrl::Shorthand(opaque) => Ok(registry::expand(fetcher, opaque)?),
        ModuleUrl::Schemeless { host, path } => {
            warn!(
                url = %module_url,
                "a resolved url has no scheme; schemeless remote modules are \
                 deprecated and will need to explicitly use `https`"
            );
            Ok(Url::parse(&format!("https://{host}{path}"))?)
        }
        ModuleUrl::Url(u) => Ok(u.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{MemoryFs, FILE_SCHEME};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Map-backed fetcher that records every requested URL.
    struct MapFetcher {
        responses: HashMap<String, Vec<u8>>,
        calls: RefCell<Vec<String>>,
    }

    impl MapFetcher {
        fn new(responses: impl IntoIterator<Item = (&'static str, &'static str)>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|(u, b)| (u.to_string(), b.as_bytes().to_vec()))
                    .collect(),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn none() -> Self {
            Self::new([])
        }
    }

    impl Fetcher for MapFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.borrow_mut().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::NotFound(url.to_string()))
        }
    }

    #[test]
    fn test_path_on_fs() {
        let cases = [
            ("file:///a/b", "/a/b"),
            ("file:///C:/something/path.js", "/C:/something/path.js"),
            ("https://github.com/something", "/github.com/something"),
            ("https://example.com/with%20space.js", "/example.com/with space.js"),
        ];
        for (input, expected) in cases {
            let url = ModuleUrl::parse(input).unwrap();
            assert_eq!(path_on_fs(&url).unwrap(), expected, "for {input}");
        }

        let shorthand = ModuleUrl::shorthand("cdnjs.com/libraries/Faker");
        assert_eq!(path_on_fs(&shorthand).unwrap(), "/cdnjs.com/libraries/Faker");

        let schemeless = ModuleUrl::Schemeless {
            host: "example.com".to_string(),
            path: "/something/dot.js".to_string(),
        };
        assert_eq!(path_on_fs(&schemeless).unwrap(), "/example.com/something/dot.js");
    }

    #[test]
    fn test_load_file_from_fs() {
        let mut filesystems = FsMap::new();
        let fs: MemoryFs = [("/a/b", "file contents")].into_iter().collect();
        filesystems.insert(FILE_SCHEME, fs);

        let url = ModuleUrl::parse("file:///a/b").unwrap();
        let loaded = load(&mut filesystems, &MapFetcher::none(), &url, "/a/b").unwrap();

        assert_eq!(loaded.url, url);
        assert_eq!(loaded.data, b"file contents");
    }

    #[test]
    fn test_load_missing_file_reports_guidance() {
        let mut filesystems = FsMap::new();
        filesystems.insert(FILE_SCHEME, MemoryFs::new());

        let url = ModuleUrl::parse("file:///nope.js").unwrap();
        let err = load(&mut filesystems, &MapFetcher::none(), &url, "./nope.js").unwrap_err();

        assert!(err
            .to_string()
            .starts_with("The moduleSpecifier \"file:///nope.js\" couldn't be found on local disk."));
    }

    #[test]
    fn test_load_https_prefers_fs_over_network() {
        let mut filesystems = FsMap::new();
        let fs: MemoryFs = [("/github.com/something", "cached")].into_iter().collect();
        filesystems.insert(HTTPS_SCHEME, fs);

        let fetcher = MapFetcher::none();
        let url = ModuleUrl::parse("https://github.com/something").unwrap();
        let loaded = load(&mut filesystems, &fetcher, &url, "https://github.com/something").unwrap();

        assert_eq!(loaded.data, b"cached");
        assert!(fetcher.calls.into_inner().is_empty());
    }

    #[test]
    fn test_load_https_miss_fetches_and_caches() {
        let mut filesystems = FsMap::new();
        let fetcher = MapFetcher::new([("https://example.com/lib.js?_k6=1", "remote body")]);

        let url = ModuleUrl::parse("https://example.com/lib.js").unwrap();
        let loaded = load(&mut filesystems, &fetcher, &url, "https://example.com/lib.js").unwrap();

        assert_eq!(loaded.url, url);
        assert_eq!(loaded.data, b"remote body");
        assert_eq!(
            filesystems.read(HTTPS_SCHEME, "/example.com/lib.js").unwrap(),
            b"remote body"
        );
    }

    #[test]
    fn test_load_shorthand_keeps_original_url() {
        let mut filesystems = FsMap::new();
        let fetcher = MapFetcher::new([(
            "https://raw.githubusercontent.com/user/repo/master/samples/http2.js?_k6=1",
            "github body",
        )]);

        let url = ModuleUrl::shorthand("github.com/user/repo/samples/http2.js");
        let loaded = load(
            &mut filesystems,
            &fetcher,
            &url,
            "github.com/user/repo/samples/http2.js",
        )
        .unwrap();

        // Identity stays the shorthand, not the expanded URL.
        assert_eq!(loaded.url, url);
        assert_eq!(loaded.data, b"github body");
        assert_eq!(
            filesystems
                .read(HTTPS_SCHEME, "/github.com/user/repo/samples/http2.js")
                .unwrap(),
            b"github body"
        );
    }

    #[test]
    fn test_load_shorthand_from_fs_skips_expansion() {
        let mut filesystems = FsMap::new();
        let fs: MemoryFs = [("/cdnjs.com/libraries/Faker", "faker body")]
            .into_iter()
            .collect();
        filesystems.insert(HTTPS_SCHEME, fs);

        let fetcher = MapFetcher::none();
        let url = ModuleUrl::shorthand("cdnjs.com/libraries/Faker");
        let loaded = load(&mut filesystems, &fetcher, &url, "cdnjs.com/libraries/Faker").unwrap();

        assert_eq!(loaded.data, b"faker body");
        assert!(fetcher.calls.into_inner().is_empty());
    }

    #[test]
    fn test_load_schemeless_promotes_to_https() {
        let mut filesystems = FsMap::new();
        let fetcher = MapFetcher::new([("https://example.com/dot.js?_k6=1", "dot body")]);

        let url = ModuleUrl::Schemeless {
            host: "example.com".to_string(),
            path: "/dot.js".to_string(),
        };
        let loaded = load(&mut filesystems, &fetcher, &url, "example.com/dot.js").unwrap();

        assert_eq!(loaded.url, url);
        assert_eq!(loaded.data, b"dot body");
    }

    #[test]
    fn test_load_remote_failure_wraps_specifier_and_url() {
        let mut filesystems = FsMap::new();
        let fetcher = MapFetcher::none();

        let url = ModuleUrl::parse("https://example.com/gone.js").unwrap();
        let err = load(&mut filesystems, &fetcher, &url, "example.com/gone.js").unwrap_err();

        assert_eq!(
            err.to_string(),
            "The moduleSpecifier \"example.com/gone.js\" couldn't be retrieved \
             from the resolved url \"https://example.com/gone.js\". Error : \
             \"not found: https://example.com/gone.js\""
        );
    }
}
