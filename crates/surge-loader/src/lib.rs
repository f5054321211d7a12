//! Surge module resolution and loading core
//!
//! This crate turns script import specifiers into canonical module URLs and
//! materializes their bytes into an in-memory, scheme-partitioned virtual
//! filesystem, including:
//! - Canonical module URLs (scheme-bearing / shorthand / schemeless host)
//! - Specifier resolution against a base directory URL
//! - A shorthand loader registry (cdnjs, github vanity paths)
//! - Scheme-partitioned in-memory filesystems with write-through caching
//! - An injectable remote fetcher with the query-marker retry quirk
//! - The `read_source` entry-point façade (stdin or resolve+load)

pub mod fetcher;
pub mod fs;
pub mod loader;
pub mod paths;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod url;

pub use fetcher::{FetchError, Fetcher, HttpFetcher};
pub use fs::{FsError, FsMap, MemoryFs, FILE_SCHEME, HTTPS_SCHEME};
pub use loader::{load, LoadError, SourceData};
pub use registry::RegistryError;
pub use resolver::{resolve, ResolveError};
pub use source::{read_source, SourceError};
pub use crate::url::ModuleUrl;
