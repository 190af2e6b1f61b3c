use std::path::PathBuf;

use thiserror::Error;

/// Transport-level failure for a single GET.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("GET {url}: {message}")]
    Request { url: String, message: String },
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("GET {url} timed out")]
    Timeout { url: String },
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("network: {0}")]
    Network(#[from] FetchError),
    #[error("unexpected {what} payload: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("remote error: {0}")]
    Remote(String),
    #[error("no OMDb API key configured")]
    MissingApiKey,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encode record: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("corrupt record {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid identifier `{0}`")]
    InvalidIdentifier(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
