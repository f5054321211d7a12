//! Specifier resolution
//!
//! Turns a raw import specifier plus the importing module's directory URL
//! (the "pwd") into a canonical [`ModuleUrl`]. The specifier grammar mixes
//! four namespaces, recognized in priority order:
//!
//! 1. `.`/`/`-prefixed or drive-letter paths → resolved against the pwd
//! 2. strings containing `://` → fully qualified URLs
//! 3. registered shorthands (`cdnjs.com/...`, `github.com/...`) → opaque
//!    references, expanded later at load time
//! 4. everything else → a schemeless `https` host path

use crate::paths;
use crate::registry;
use crate::url::ModuleUrl;
use thiserror::Error;
use url::Url;

/// Errors produced while resolving a specifier.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The specifier was empty.
    #[error("local or remote path required")]
    EmptySpecifier,

    /// A URL with a scheme other than `file` or `https`, either as the
    /// specifier or as the base.
    #[error("only supported schemes for imports are file and https, {specifier} has `{scheme}`")]
    UnsupportedScheme { specifier: String, scheme: String },

    /// A remote module attempted to import a local file.
    #[error("origin ({origin}) not allowed to load local file: {specifier}")]
    LocalImportFromRemote { origin: String, specifier: String },

    /// The specifier (or its resolution against the base) did not parse.
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),

    /// A bare specifier that no loader matched and that cannot be a host
    /// path either. The entry reader turns this into the local-file
    /// guidance message.
    #[error("not a valid remote module path \"{specifier}\": {source}")]
    NotHostPath {
        specifier: String,
        source: url::ParseError,
    },
}

/// Resolve `specifier` against the directory URL `pwd` into a canonical URL.
pub fn resolve(pwd: &ModuleUrl, specifier: &str) -> Result<ModuleUrl, ResolveError> {
    if specifier.is_empty() {
        return Err(ResolveError::EmptySpecifier);
    }

    if let ModuleUrl::Url(base) = pwd {
        let scheme = base.scheme();
        if scheme != "file" && scheme != "https" {
            return Err(ResolveError::UnsupportedScheme {
                specifier: pwd.to_string(),
                scheme: scheme.to_string(),
            });
        }
    }

    if specifier.starts_with('.')
        || specifier.starts_with('/')
        || paths::has_drive_letter(specifier)
    {
        return resolve_local(pwd, specifier);
    }

    if specifier.contains("://") {
        let parsed = Url::parse(specifier)?;
        if parsed.scheme() != "file" && parsed.scheme() != "https" {
            return Err(ResolveError::UnsupportedScheme {
                specifier: specifier.to_string(),
                scheme: parsed.scheme().to_string(),
            });
        }
        if parsed.scheme() == "file" && pwd.scheme() == Some("https") {
            return Err(ResolveError::LocalImportFromRemote {
                origin: pwd.to_string(),
                specifier: specifier.to_string(),
            });
        }
        return Ok(ModuleUrl::Url(parsed));
    }

    // Only pickability matters here: a loader that matches but later fails
    // to expand must not fall through to another interpretation.
    if registry::pick(specifier).is_some() {
        return Ok(ModuleUrl::shorthand(specifier));
    }

    match ModuleUrl::parse_schemeless(specifier) {
        Ok(url) => Ok(url),
        Err(source) => Err(ResolveError::NotHostPath {
            specifier: specifier.to_string(),
            source,
        }),
    }
}

/// Resolve a local path specifier against the base.
fn resolve_local(pwd: &ModuleUrl, specifier: &str) -> Result<ModuleUrl, ResolveError> {
    // A shorthand base keeps the join inside the shorthand's path space:
    // absolute specifiers attach to its host segment, relative ones to its
    // directory.
    if let ModuleUrl::Shorthand(opaque) = pwd {
        let (host, rest) = opaque.split_once('/').unwrap_or((opaque.as_str(), ""));
        if specifier.starts_with('/') {
            return Ok(ModuleUrl::shorthand(paths::join(&[host, specifier])));
        }
        let dir = paths::dir(&format!("{rest}/"));
        return Ok(ModuleUrl::shorthand(paths::join(&[
            host,
            &paths::join(&[&dir, specifier]),
        ])));
    }

    // A drive letter would otherwise parse as a URL scheme, so anchor it
    // with a leading slash: `C:/x` resolves as the path `/C:/x`.
    let specifier = if paths::has_drive_letter(specifier) {
        format!("/{specifier}")
    } else {
        specifier.to_string()
    };

    match pwd {
        ModuleUrl::Url(base) => {
            let base = ensure_dir(base);
            Ok(ModuleUrl::Url(base.join(&specifier)?))
        }
        ModuleUrl::Schemeless { host, path } => {
            let path = if path.ends_with('/') {
                path.clone()
            } else {
                format!("{path}/")
            };
            // Joins happen in an https context, but the result stays
            // schemeless until fetch time.
            let base = Url::parse(&format!("https://{host}{path}"))?;
            let joined = base.join(&specifier)?;
            Ok(ModuleUrl::schemeless_from(&joined))
        }
        ModuleUrl::Shorthand(_) => unreachable!("shorthand base handled above"),
    }
}

/// The base always acts as a directory: synthesize the trailing slash when
/// the URL path lacks one.
fn ensure_dir(base: &Url) -> Url {
    if base.path().ends_with('/') {
        return base.clone();
    }
    let mut dir = base.clone();
    dir.set_path(&format!("{}/", base.path()));
    dir
}
