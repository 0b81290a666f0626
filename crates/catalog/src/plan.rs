//! Plan types: ordered, not-yet-executed descriptions of relational and
//! object-store work for one request.
//!
//! Deferred relational operations are command values ([`DbOp`]) holding SQL
//! text plus bound parameters; the coordinator interprets them against the
//! transaction it owns. No closures cross the async boundary.

use crate::error::{CatalogError, CatalogResult};
use lathe_db::traits::DbTransaction;
use lathe_db::value::Statement;
use serde_json::Value;

/// A deferred object-store upload. `attachment_id` correlates back to the
/// request attachment that carries the bytes.
#[derive(Clone, Debug)]
pub struct UploadOp {
    pub attachment_id: String,
    pub bucket: String,
    pub object_key: String,
    pub mime_type: String,
}

/// How a deferred statement's outcome is interpreted.
#[derive(Clone, Debug)]
pub enum DbOpKind {
    /// Execute and ignore the affected-row count.
    Execute { statement: Statement },
    /// Execute; zero affected rows means the target row is gone.
    ExecuteExpectRow {
        statement: Statement,
        missing: String,
    },
}

/// One deferred unit of relational work.
#[derive(Clone, Debug)]
pub struct DbOp {
    pub debug_name: &'static str,
    pub kind: DbOpKind,
}

/// Run a single deferred operation against a live transaction.
pub(crate) async fn run_db_op(op: &DbOp, tx: &mut dyn DbTransaction) -> CatalogResult<()> {
    match &op.kind {
        DbOpKind::Execute { statement } => {
            tx.execute(statement.clone()).await?;
            Ok(())
        }
        DbOpKind::ExecuteExpectRow { statement, missing } => {
            let affected = tx.execute(statement.clone()).await?;
            if affected == 0 {
                return Err(CatalogError::NotFound {
                    message: missing.clone(),
                    details: serde_json::json!({ "op": op.debug_name }),
                });
            }
            Ok(())
        }
    }
}

/// Plan for one write or cell-update request.
///
/// Invariant: `pre_upload_ops` must not depend on uploads having occurred;
/// `post_upload_ops` may reference uploaded object keys.
#[derive(Clone, Debug, Default)]
pub struct WritePlan {
    pub pre_upload_ops: Vec<DbOp>,
    pub uploads: Vec<UploadOp>,
    pub post_upload_ops: Vec<DbOp>,
    /// Planner-specific payload merged into the success result.
    pub success_extra: Option<Value>,
}

/// Reference to one stored object.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub bucket: String,
    pub object_key: String,
}

/// A non-fatal problem recorded on an otherwise-successful delete.
#[derive(Clone, Debug)]
pub struct DeleteWarning {
    pub bucket: String,
    pub object_key: String,
    pub message: String,
}

/// Plan for one delete request. `db_ops` run inside the transaction;
/// `storage_deletes` run only after it commits.
#[derive(Clone, Debug, Default)]
pub struct DeletePlan {
    pub db_ops: Vec<DbOp>,
    pub storage_deletes: Vec<ObjectRef>,
    pub warnings: Vec<DeleteWarning>,
}
