//! Relational store boundary for Lathe.
//!
//! This crate defines the transaction, schema-introspection, and advisory
//! lock traits the catalog engine depends on, plus their PostgreSQL
//! implementations. Statements carry bound parameter values as data
//! (`Statement` + `SqlValue`); identifiers are validated separately before
//! they ever reach SQL text.

pub mod error;
pub mod postgres;
pub mod traits;
pub mod value;

pub use error::{DbError, DbResult};
pub use postgres::PostgresDatabase;
pub use traits::{AdvisoryLocks, Database, DbTransaction, SchemaColumn, SchemaSource};
pub use value::{Row, SqlValue, Statement};

use lathe_core::config::DatabaseConfig;
use std::sync::Arc;

/// Create a database handle from configuration.
pub async fn from_config(config: &DatabaseConfig) -> DbResult<Arc<PostgresDatabase>> {
    config.validate().map_err(DbError::Config)?;

    let db = if let Some(url) = &config.url {
        tracing::info!("Connecting to PostgreSQL using connection URL");
        PostgresDatabase::from_url(url, config.max_connections, config.statement_timeout_ms).await?
    } else {
        let host = config
            .host
            .as_deref()
            .ok_or_else(|| DbError::Config("missing database host".to_string()))?;
        let database = config
            .database
            .as_deref()
            .ok_or_else(|| DbError::Config("missing database name".to_string()))?;
        PostgresDatabase::from_params(
            host,
            config.port.unwrap_or(5432),
            config.username.as_deref(),
            config.password.as_deref(),
            database,
            config.max_connections,
            config.statement_timeout_ms,
        )
        .await?
    };
    Ok(Arc::new(db))
}
