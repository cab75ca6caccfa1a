//! Server error types

use thiserror::Error;

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] tally_config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Durable storage error
    #[error("Storage error: {0}")]
    Storage(#[from] tally_persistence::PersistenceError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
