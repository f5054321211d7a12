//! Remote byte fetching
//!
//! The loader never talks HTTP directly: it goes through the [`Fetcher`]
//! trait so tests can substitute a map-backed fake and embedders can bring
//! their own transport. [`HttpFetcher`] is the production implementation.

use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Request timeout for the built-in HTTP fetcher.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while fetching remote bytes.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The origin answered 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// The origin answered something other than 200.
    #[error("wrong status code ({status}) for: {url}")]
    WrongStatusCode { status: u16, url: String },

    /// Transport-level failure.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The URL handed to the fetcher did not parse.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Injected byte retriever: URL string in, body bytes out.
pub trait Fetcher {
    /// Perform a GET for `url` and return the whole body.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// HTTP fetcher backed by a blocking `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Build a fetcher with the default timeout and user agent.
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("surge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url, "fetching remote module");

        let response = self.client.get(url).send()?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::WrongStatusCode {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let data = response.bytes()?.to_vec();
        debug!(url, len = data.len(), "fetched remote module");
        Ok(data)
    }
}

/// Fetch `url` with the `_k6=1` marker appended to its query string.
///
/// Some origins reject requests carrying unknown GET arguments, so any
/// failure is retried exactly once against the unmarked URL.
pub fn fetch_remote(fetcher: &dyn Fetcher, url: &Url) -> Result<Vec<u8>, FetchError> {
    let mut marked = url.clone();
    marked.query_pairs_mut().append_pair("_k6", "1");

    match fetcher.fetch(marked.as_str()) {
        Ok(data) => Ok(data),
        Err(_) => fetcher.fetch(url.as_str()),
    }
}
