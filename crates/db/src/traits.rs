//! Relational collaborator trait definitions.

use crate::error::DbResult;
use crate::value::{Row, Statement};
use async_trait::async_trait;

/// A scoped unit of relational work with explicit commit/rollback.
///
/// Dropping a transaction without committing discards its work (the
/// implementation rolls back on drop), but callers should still roll back
/// explicitly so failures are surfaced.
#[async_trait]
pub trait DbTransaction: Send {
    /// Execute a statement and fetch its result rows (SELECT / RETURNING).
    async fn query(&mut self, stmt: Statement) -> DbResult<Vec<Row>>;

    /// Execute a statement and return the affected row count.
    async fn execute(&mut self, stmt: Statement) -> DbResult<u64>;

    async fn commit(self: Box<Self>) -> DbResult<()>;

    async fn rollback(self: Box<Self>) -> DbResult<()>;
}

/// Handle to the relational store.
#[async_trait]
pub trait Database: Send + Sync {
    /// Begin a transaction.
    async fn begin(&self) -> DbResult<Box<dyn DbTransaction>>;

    /// Run a standalone query outside any transaction.
    async fn query(&self, stmt: Statement) -> DbResult<Vec<Row>>;

    /// Run a standalone statement outside any transaction.
    async fn execute(&self, stmt: Statement) -> DbResult<u64>;

    /// Check connectivity.
    async fn health_check(&self) -> DbResult<()> {
        self.query(Statement::new("SELECT 1")).await.map(|_| ())
    }
}

/// Column metadata as reported by the schema source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaColumn {
    pub name: String,
    pub data_type: String,
    pub udt_name: String,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
}

/// Source of table column metadata (`information_schema` or equivalent).
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// List the columns of a physical table, in ordinal order.
    /// An unknown table yields an empty list.
    async fn list_columns(&self, schema: &str, table: &str) -> DbResult<Vec<SchemaColumn>>;
}

/// Cluster-wide, non-blocking mutual exclusion keyed by an integer.
#[async_trait]
pub trait AdvisoryLocks: Send + Sync {
    /// Try to acquire the lock; false means another holder has it.
    async fn try_lock(&self, key: i64) -> DbResult<bool>;

    /// Release a previously acquired lock.
    async fn unlock(&self, key: i64) -> DbResult<()>;
}
