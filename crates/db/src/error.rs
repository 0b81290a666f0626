//! Relational store error types.

use thiserror::Error;

/// Relational store operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cannot decode column {column}: {message}")]
    Decode { column: String, message: String },

    #[error("statement returned no rows: {0}")]
    EmptyResult(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for relational store operations.
pub type DbResult<T> = std::result::Result<T, DbError>;
