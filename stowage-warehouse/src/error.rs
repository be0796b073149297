//! Error types for the warehouse simulator.

use thiserror::Error;

/// Main error type for warehouse operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration value outside the supported range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The warehouse was already started and stopped; it cannot restart.
    #[error("warehouse cannot restart after stop")]
    Restarted,

    /// A worker thread could not be spawned.
    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        /// Name of the thread that failed to start.
        name: String,
        /// Underlying OS error.
        source: std::io::Error,
    },
}

/// Result type alias for warehouse operations.
pub type Result<T> = std::result::Result<T, Error>;
