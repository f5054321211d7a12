//! Canonical module URLs
//!
//! A resolved module location is one of three mutually exclusive shapes:
//!
//! - a scheme-bearing URL (`file` or `https`),
//! - a shorthand loader reference carried un-expanded (`github.com/a/b/c`),
//! - a schemeless host path (`example.com/lib.js`) that predates explicit
//!   schemes and is only promoted to `https` at fetch time.
//!
//! Modeling these as an enum makes the exclusivity invariant structural:
//! there is no value with both a scheme and an opaque body.

use crate::paths;
use std::fmt;
use url::Url;

/// A canonical, variant-tagged module URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleUrl {
    /// A URL with an explicit scheme. File URLs always carry an absolute
    /// path starting with `/`; drive-letter paths are kept as `/C:/...`.
    Url(Url),

    /// A host-rooted URL without a scheme. Fetched as `https`, but kept
    /// schemeless so archives written before schemes were mandatory
    /// round-trip byte-identically.
    Schemeless {
        /// Host, including the port when one was given.
        host: String,
        /// Absolute URL path.
        path: String,
    },

    /// An un-expanded shorthand loader reference. The body is the original
    /// specifier; expansion to a concrete `https` URL happens at load time.
    Shorthand(String),
}

impl ModuleUrl {
    /// Parse a fully qualified URL string into the scheme-bearing variant.
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        Url::parse(input).map(ModuleUrl::Url)
    }

    /// Build the schemeless variant from a vanity host path by parsing it
    /// with a synthetic `https` scheme and discarding the scheme again.
    pub fn parse_schemeless(host_path: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(&format!("https://{host_path}"))?;
        Ok(Self::schemeless_from(&parsed))
    }

    /// Shorthand variant from the original specifier.
    pub fn shorthand(specifier: impl Into<String>) -> Self {
        ModuleUrl::Shorthand(specifier.into())
    }

    /// Rebuild the schemeless variant from a scheme-bearing URL, keeping
    /// host, port, and path.
    pub(crate) fn schemeless_from(parsed: &Url) -> Self {
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            (None, _) => String::new(),
        };
        ModuleUrl::Schemeless {
            host,
            path: parsed.path().to_string(),
        }
    }

    /// The explicit scheme, when the URL has one.
    pub fn scheme(&self) -> Option<&str> {
        match self {
            ModuleUrl::Url(u) => Some(u.scheme()),
            _ => None,
        }
    }

    /// The scheme used for filesystem partitioning and fetching: shorthand
    /// and schemeless URLs both live under `https`.
    pub fn fetch_scheme(&self) -> &str {
        match self {
            ModuleUrl::Url(u) => u.scheme(),
            _ => "https",
        }
    }

    /// The directory containing this URL.
    ///
    /// For scheme-bearing and schemeless URLs this is the path up to and
    /// including the final `/`; for shorthand references it is the parent
    /// of the opaque body.
    pub fn dir(&self) -> Self {
        match self {
            ModuleUrl::Url(u) => {
                let mut d = u.clone();
                d.set_path(&dir_with_slash(u.path()));
                d.set_query(None);
                d.set_fragment(None);
                ModuleUrl::Url(d)
            }
            ModuleUrl::Schemeless { host, path } => ModuleUrl::Schemeless {
                host: host.clone(),
                path: dir_with_slash(path),
            },
            ModuleUrl::Shorthand(opaque) => {
                ModuleUrl::Shorthand(paths::join(&[opaque, ".."]))
            }
        }
    }
}

/// Path up to and including the last `/`; `/` when there is none.
fn dir_with_slash(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..=idx].to_string(),
        None => "/".to_string(),
    }
}

impl fmt::Display for ModuleUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleUrl::Url(u) => f.write_str(u.as_str()),
            // Protocol-relative form, the serialization of an authority
            // without a scheme.
            ModuleUrl::Schemeless { host, path } => write!(f, "//{host}{path}"),
            ModuleUrl::Shorthand(opaque) => f.write_str(opaque),
        }
    }
}
