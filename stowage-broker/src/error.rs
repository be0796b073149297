//! Error types for the broker.

use thiserror::Error;

/// Main error type for broker operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unloadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Disk persistence failure.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// JSON encode/decode failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport endpoint failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for broker operations.
pub type Result<T> = std::result::Result<T, Error>;
