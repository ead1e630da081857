//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid chapter status: {0}")]
    InvalidStatus(String),

    #[error("invalid scope: {0}")]
    InvalidScope(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
