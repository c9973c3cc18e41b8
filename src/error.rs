use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Invalid target URL `{url}`: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("Invalid URL `{reference}`: {reason}")]
    InvalidUrl { reference: String, reason: String },

    #[error("Failed to fetch {url}: {reason}")]
    DocumentFetch { url: String, reason: String },

    #[error("Failed to download {url}: {reason}")]
    AssetFetch { url: String, reason: String },

    #[error("Failed to decode proxied image reference `{0}`")]
    ProxyDecode(String),

    #[error("Filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index.html not found in directory: {}", .0.display())]
    MissingDocument(PathBuf),

    #[error("Failed to serialize document: {0}")]
    Serialize(#[source] std::io::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl MirrorError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;
