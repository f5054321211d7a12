//! Shorthand loader registry
//!
//! Vanity specifiers like `github.com/user/repo/file.js` or
//! `cdnjs.com/libraries/Faker` are expanded into concrete `https` URLs by a
//! process-wide, ordered table of `{name, pattern, expander}` entries. The
//! first pattern that matches wins. Expansion is deferred until load time so
//! the shorthand itself stays the module's identity.

use crate::fetcher::{FetchError, Fetcher};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

/// Errors that can occur while expanding a shorthand specifier.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No registered pattern matched the specifier.
    #[error("no loader matched")]
    NoLoaderMatched,

    /// The cdnjs metadata service does not know the library.
    #[error("cdnjs: no such library: {0}")]
    UnknownLibrary(String),

    /// The cdnjs metadata offers no file for the requested version.
    #[error("cdnjs: no file found for library `{library}` version `{version}`")]
    NoFileForVersion { library: String, version: String },

    /// The metadata hop failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The metadata response was not the expected JSON.
    #[error("invalid metadata response: {0}")]
    Metadata(#[from] serde_json::Error),

    /// The expander produced a string that does not parse as a URL.
    #[error("invalid expanded URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Expansion function: `(fetcher, specifier, captures) → https URL string`.
/// Captures are the pattern's groups, in order, without the whole match.
type ExpandFn = fn(&dyn Fetcher, &str, &[Option<String>]) -> Result<String, RegistryError>;

struct Shorthand {
    name: &'static str,
    pattern: Regex,
    expander: ExpandFn,
}

static SHORTHANDS: LazyLock<Vec<Shorthand>> = LazyLock::new(|| {
    vec![
        Shorthand {
            name: "cdnjs",
            pattern: Regex::new(r"^cdnjs\.com/libraries/([^/]+)(?:/([\d.]+-?[^/]*))?(?:/(.*))?$")
                .expect("cdnjs pattern is valid"),
            expander: expand_cdnjs,
        },
        Shorthand {
            name: "github",
            pattern: Regex::new(r"^github\.com/([^/]+)/([^/]+)/(.*)$")
                .expect("github pattern is valid"),
            expander: expand_github,
        },
    ]
});

/// A shorthand specifier matched against the registry.
pub struct ShorthandMatch<'a> {
    /// Registry name of the matching entry (`cdnjs`, `github`).
    pub name: &'static str,
    expander: ExpandFn,
    specifier: &'a str,
    captures: Vec<Option<String>>,
}

impl ShorthandMatch<'_> {
    /// Run the matched expander, producing a concrete `https` URL string.
    pub fn expand(&self, fetcher: &dyn Fetcher) -> Result<String, RegistryError> {
        (self.expander)(fetcher, self.specifier, &self.captures)
    }

    /// The pattern's capture groups, without the whole-match group.
    pub fn captures(&self) -> &[Option<String>] {
        &self.captures
    }
}

/// Scan the registry in order and return the first entry matching
/// `specifier`, together with its capture groups.
pub fn pick(specifier: &str) -> Option<ShorthandMatch<'_>> {
    for entry in SHORTHANDS.iter() {
        if let Some(captures) = entry.pattern.captures(specifier) {
            let groups = captures
                .iter()
                .skip(1)
                .map(|g| g.map(|m| m.as_str().to_string()))
                .collect();
            return Some(ShorthandMatch {
                name: entry.name,
                expander: entry.expander,
                specifier,
                captures: groups,
            });
        }
    }
    None
}

/// Expand a shorthand specifier all the way to a parsed `https` URL.
pub fn expand(fetcher: &dyn Fetcher, specifier: &str) -> Result<Url, RegistryError> {
    match pick(specifier) {
        Some(matched) => Ok(Url::parse(&matched.expand(fetcher)?)?),
        None => Err(RegistryError::NoLoaderMatched),
    }
}

fn capture<'a>(captures: &'a [Option<String>], idx: usize) -> Option<&'a str> {
    captures
        .get(idx)
        .and_then(|c| c.as_deref())
        .filter(|c| !c.is_empty())
}

/// `github.com/<user>/<repo>/<path>` → raw.githubusercontent.com, default
/// branch. Pure.
fn expand_github(
    _fetcher: &dyn Fetcher,
    _specifier: &str,
    captures: &[Option<String>],
) -> Result<String, RegistryError> {
    let user = capture(captures, 0).unwrap_or_default();
    let repo = capture(captures, 1).unwrap_or_default();
    let path = capture(captures, 2).unwrap_or_default();
    Ok(format!(
        "https://raw.githubusercontent.com/{user}/{repo}/master/{path}"
    ))
}

/// Library description returned by `api.cdnjs.com/libraries/<name>`.
#[derive(Debug, Deserialize)]
struct CdnjsLibrary {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    assets: Vec<CdnjsAsset>,
}

#[derive(Debug, Deserialize)]
struct CdnjsAsset {
    #[serde(default)]
    version: String,
    #[serde(default)]
    files: Vec<String>,
}

/// `cdnjs.com/libraries/<name>[/<version>][/<file>]` → the concrete CDN
/// URL. The version and default file come from the cdnjs metadata service,
/// queried through the injected fetcher.
fn expand_cdnjs(
    fetcher: &dyn Fetcher,
    _specifier: &str,
    captures: &[Option<String>],
) -> Result<String, RegistryError> {
    let name = capture(captures, 0).unwrap_or_default();
    let requested_version = capture(captures, 1);
    let requested_file = capture(captures, 2);

    let body = fetcher.fetch(&format!("https://api.cdnjs.com/libraries/{name}"))?;
    let library: CdnjsLibrary = serde_json::from_slice(&body)?;

    let latest = library
        .version
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RegistryError::UnknownLibrary(name.to_string()))?;
    let version = requested_version.unwrap_or(latest);

    let file = match requested_file {
        Some(file) => file.to_string(),
        None => default_file(&library, latest, version).ok_or_else(|| {
            RegistryError::NoFileForVersion {
                library: name.to_string(),
                version: version.to_string(),
            }
        })?,
    };

    Ok(format!(
        "https://cdnjs.cloudflare.com/ajax/libs/{name}/{version}/{file}"
    ))
}

/// The file to serve when the specifier names none: the library default for
/// the latest version, otherwise a file listed for the requested version
/// (preferring the library default when that version still ships it).
fn default_file(library: &CdnjsLibrary, latest: &str, version: &str) -> Option<String> {
    let default = library.filename.as_deref().filter(|f| !f.is_empty());
    if version == latest {
        return default.map(str::to_string);
    }

    let asset = library.assets.iter().find(|a| a.version == version)?;
    match default {
        Some(f) if asset.files.iter().any(|candidate| candidate == f) => Some(f.to_string()),
        _ => asset.files.first().cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Map-backed fetcher: URL → body.
    struct MapFetcher(HashMap<String, Vec<u8>>);

    impl Fetcher for MapFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::NotFound(url.to_string()))
        }
    }

    fn cdnjs_fetcher(body: &str) -> MapFetcher {
        MapFetcher(HashMap::from([(
            "https://api.cdnjs.com/libraries/Faker".to_string(),
            body.as_bytes().to_vec(),
        )]))
    }

    #[test]
    fn test_pick_orders_and_captures() {
        let matched = pick("cdnjs.com/libraries/Faker/3.1.0/faker.min.js").unwrap();
        assert_eq!(matched.name, "cdnjs");
        assert_eq!(
            matched.captures(),
            &[
                Some("Faker".to_string()),
                Some("3.1.0".to_string()),
                Some("faker.min.js".to_string()),
            ]
        );

        let matched = pick("github.com/user/repo/samples/http2.js").unwrap();
        assert_eq!(matched.name, "github");

        assert!(pick("example.com/anything.js").is_none());
        // Bare repo references without a trailing path are not shorthands.
        assert!(pick("github.com/user/repo").is_none());
    }

    #[test]
    fn test_pick_cdnjs_without_version() {
        let matched = pick("cdnjs.com/libraries/Faker").unwrap();
        assert_eq!(matched.name, "cdnjs");
        assert_eq!(matched.captures()[0], Some("Faker".to_string()));
        assert_eq!(matched.captures()[1], None);
        assert_eq!(matched.captures()[2], None);
    }

    #[test]
    fn test_expand_github() {
        let fetcher = MapFetcher(HashMap::new());
        let url = expand(&fetcher, "github.com/user/repo/samples/http2.js").unwrap();
        assert_eq!(
            url.as_str(),
            "https://raw.githubusercontent.com/user/repo/master/samples/http2.js"
        );
    }

    #[test]
    fn test_expand_no_loader_matched() {
        let fetcher = MapFetcher(HashMap::new());
        let err = expand(&fetcher, "example.com/x.js").unwrap_err();
        assert_eq!(err.to_string(), "no loader matched");
    }

    #[test]
    fn test_expand_cdnjs_latest() {
        let fetcher = cdnjs_fetcher(
            r#"{"filename": "faker.min.js", "version": "3.1.0", "assets": []}"#,
        );
        let url = expand(&fetcher, "cdnjs.com/libraries/Faker").unwrap();
        assert_eq!(
            url.as_str(),
            "https://cdnjs.cloudflare.com/ajax/libs/Faker/3.1.0/faker.min.js"
        );
    }

    #[test]
    fn test_expand_cdnjs_pinned_version_and_file() {
        let fetcher = cdnjs_fetcher(
            r#"{"filename": "faker.min.js", "version": "3.1.0", "assets": []}"#,
        );
        let url = expand(&fetcher, "cdnjs.com/libraries/Faker/2.1.5/faker.js").unwrap();
        assert_eq!(
            url.as_str(),
            "https://cdnjs.cloudflare.com/ajax/libs/Faker/2.1.5/faker.js"
        );
    }

    #[test]
    fn test_expand_cdnjs_pinned_version_default_file() {
        let fetcher = cdnjs_fetcher(
            r#"{
                "filename": "faker.min.js",
                "version": "3.1.0",
                "assets": [
                    {"version": "2.1.5", "files": ["faker.js", "faker.min.js"]},
                    {"version": "3.1.0", "files": ["faker.min.js"]}
                ]
            }"#,
        );
        let url = expand(&fetcher, "cdnjs.com/libraries/Faker/2.1.5").unwrap();
        assert_eq!(
            url.as_str(),
            "https://cdnjs.cloudflare.com/ajax/libs/Faker/2.1.5/faker.min.js"
        );
    }

    #[test]
    fn test_expand_cdnjs_unknown_library() {
        let fetcher = cdnjs_fetcher(r#"{"error": true, "status": 404}"#);
        let err = expand(&fetcher, "cdnjs.com/libraries/Faker").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownLibrary(_)));
    }

    #[test]
    fn test_expand_cdnjs_unknown_version_without_files() {
        let fetcher = cdnjs_fetcher(
            r#"{"filename": "faker.min.js", "version": "3.1.0", "assets": []}"#,
        );
        let err = expand(&fetcher, "cdnjs.com/libraries/Faker/9.9.9").unwrap_err();
        assert!(matches!(err, RegistryError::NoFileForVersion { .. }));
    }
}
