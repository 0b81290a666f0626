//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unsafe identifier: {0:?}")]
    UnsafeIdentifier(String),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
