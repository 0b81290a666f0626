//! Catalog error taxonomy.
//!
//! Validation failures are produced before any store is touched and map to
//! client errors; everything else is a server-side fault. Post-commit storage
//! cleanup failures never appear here at all; they are downgraded to warnings
//! on the success result.

use lathe_core::CoreError;
use lathe_db::DbError;
use lathe_storage::StorageError;
use serde_json::Value;
use thiserror::Error;

/// Coarse outcome class exposed to callers (thin controllers map these to
/// transport status codes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    BadRequest,
    NotFound,
    Internal,
}

/// A client-input violation, found before any resource acquisition.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub code: String,
    pub message: String,
    pub details: Value,
    pub status: StatusKind,
}

impl ValidationError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "bad_request".to_string(),
            message: message.into(),
            details: Value::Null,
            status: StatusKind::BadRequest,
        }
    }

    /// Attach a structured detail field.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        if !self.details.is_object() {
            self.details = Value::Object(serde_json::Map::new());
        }
        if let Value::Object(map) = &mut self.details {
            map.insert(key.to_string(), value.into());
        }
        self
    }
}

/// Errors surfaced by the coordinators and the purger.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Target row vanished between validation and the mutating statement.
    #[error("{message}")]
    NotFound { message: String, details: Value },

    /// Object store failure during a write/update attempt.
    #[error("storage failure: {message}")]
    Storage { message: String, details: Value },

    #[error(transparent)]
    Db(#[from] DbError),

    /// Missing planner registration or an unusable collaborator; an internal
    /// fault, never a client error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    pub fn status(&self) -> StatusKind {
        match self {
            Self::Validation(err) => err.status,
            Self::NotFound { .. } => StatusKind::NotFound,
            Self::Storage { .. } | Self::Db(_) | Self::Config(_) => StatusKind::Internal,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Validation(err) => &err.code,
            Self::NotFound { .. } => "not_found",
            Self::Storage { .. } => "storage_error",
            Self::Db(_) => "database_error",
            Self::Config(_) => "configuration_error",
        }
    }
}

impl From<CoreError> for CatalogError {
    fn from(err: CoreError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<StorageError> for CatalogError {
    fn from(err: StorageError) -> Self {
        Self::Storage {
            message: err.to_string(),
            details: Value::Null,
        }
    }
}

/// Result type for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_carries_details() {
        let err = ValidationError::bad_request("Invalid attachment role")
            .with_detail("role", "thumbnail")
            .with_detail("column", "image_photo");
        assert_eq!(err.code, "bad_request");
        assert_eq!(err.details["role"], "thumbnail");
        assert_eq!(err.details["column"], "image_photo");
        assert_eq!(err.status, StatusKind::BadRequest);
    }

    #[test]
    fn status_mapping() {
        let validation: CatalogError = ValidationError::bad_request("bad").into();
        assert_eq!(validation.status(), StatusKind::BadRequest);
        assert_eq!(validation.code(), "bad_request");

        let not_found = CatalogError::NotFound {
            message: "row not found".into(),
            details: Value::Null,
        };
        assert_eq!(not_found.status(), StatusKind::NotFound);

        let config = CatalogError::Config("no planner".into());
        assert_eq!(config.status(), StatusKind::Internal);
        assert_eq!(config.code(), "configuration_error");
    }
}
