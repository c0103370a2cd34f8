//! Text sources: local files, HTTP endpoints and ordered fallbacks.
//!
//! The pipeline only ever needs "the text of this document". A
//! [`TextSource`] hides where it came from so tests can substitute fixtures
//! and the local-then-remote ordering is a plain [`FallbackChain`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{HttpConfig, Location};

/// Errors from fetching a document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {url}: {reason}")]
    NetworkUnreachable { url: String, reason: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("no source configured")]
    NoSources,

    #[error("all sources failed: {}", .0.join("; "))]
    AllSourcesFailed(Vec<String>),
}

/// Anything that can produce the full text of a document.
pub trait TextSource: Send + Sync {
    /// Human-readable identifier, used in logs and errors.
    fn name(&self) -> String;

    fn fetch(&self) -> Result<String, FetchError>;
}

/// A document on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TextSource for FileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<String, FetchError> {
        std::fs::read_to_string(&self.path).map_err(|source| FetchError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Build the shared blocking HTTP client.
pub fn http_client(config: &HttpConfig) -> Result<reqwest::blocking::Client, FetchError> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| FetchError::Client(e.to_string()))
}

/// A document fetched with a GET request.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpSource {
    pub fn new(client: reqwest::blocking::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl TextSource for HttpSource {
    fn name(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self) -> Result<String, FetchError> {
        let resp = self.client.get(&self.url).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                FetchError::NetworkUnreachable {
                    url: self.url.clone(),
                    reason: e.to_string(),
                }
            } else {
                FetchError::Client(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        resp.text().map_err(|e| FetchError::Client(e.to_string()))
    }
}

/// Sources tried in order; the first success wins.
pub struct FallbackChain {
    sources: Vec<Box<dyn TextSource>>,
}

impl FallbackChain {
    pub fn new(sources: Vec<Box<dyn TextSource>>) -> Self {
        Self { sources }
    }

    /// Build a chain from configured locations.
    ///
    /// With `offline` set, HTTP locations are dropped.
    pub fn from_locations(
        locations: &[Location],
        client: &reqwest::blocking::Client,
        offline: bool,
    ) -> Self {
        let sources = locations
            .iter()
            .filter(|loc| {
                let keep = !(offline && loc.is_remote());
                if !keep {
                    debug!(location = %loc, "offline, skipping remote location");
                }
                keep
            })
            .map(|loc| -> Box<dyn TextSource> {
                match loc {
                    Location::File { path } => Box::new(FileSource::new(path.clone())),
                    Location::Http { url } => Box::new(HttpSource::new(client.clone(), url.clone())),
                }
            })
            .collect();
        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl TextSource for FallbackChain {
    fn name(&self) -> String {
        self.sources
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    fn fetch(&self) -> Result<String, FetchError> {
        if self.sources.is_empty() {
            return Err(FetchError::NoSources);
        }

        let mut failures = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.fetch() {
                Ok(text) => {
                    debug!(source = %source.name(), bytes = text.len(), "fetched");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(source = %source.name(), error = %e, "source failed, trying next");
                    failures.push(e.to_string());
                }
            }
        }
        Err(FetchError::AllSourcesFailed(failures))
    }
}
