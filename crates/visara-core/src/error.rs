//! Error types for the Visara SDK.

use thiserror::Error;

/// Result type alias using the Visara SDK's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Visara API operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Client configuration problem (missing credentials, bad environment)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Token signing failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// HTTP/network request failed before a response arrived
    #[error("Request error: {0}")]
    Request(String),

    /// The API answered with a non-success status
    #[error("API returned {status}: {body}")]
    Http { status: u16, body: String },

    /// Dataset not found
    #[error("Dataset not found: {0}")]
    DatasetNotFound(uuid::Uuid),

    /// A search feature is not enabled for the dataset
    #[error("Feature disabled: {0}")]
    FeatureDisabled(String),

    /// Export submission or readiness gate failed
    #[error("Export error: {0}")]
    Export(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
