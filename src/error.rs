use thiserror::Error;

/// Why a data source produced no rows. Never escapes the source adapter's public contract.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid source URL: {0}")]
    InvalidUrl(String),

    #[error("response has no values")]
    MissingValues,
}

pub type Result<T> = std::result::Result<T, SourceError>;
