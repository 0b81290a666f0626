//! Delete coordinator: hard-deletes a row and its attachment objects.
//!
//! Deleting the relational rows is the point of no return. Storage deletes
//! run only after the transaction commits; a failed storage delete leaves an
//! orphaned object and is reported as a warning on an otherwise-successful
//! result, never as an error.

use crate::error::{CatalogError, CatalogResult};
use crate::plan::{run_db_op, DeleteWarning};
use crate::planner::{EntityPlanner, PlannerRegistry};
use lathe_core::request::DeleteRequest;
use lathe_db::traits::{Database, DbTransaction};
use lathe_storage::ObjectStore;
use std::sync::Arc;
use tracing::{error, warn};

/// Success result of a delete.
#[derive(Clone, Debug)]
pub struct DeleteOutcome {
    pub row_id: i64,
    pub warnings: Vec<DeleteWarning>,
}

/// Orchestrates row deletion across both stores.
pub struct DeleteCoordinator {
    db: Arc<dyn Database>,
    store: Arc<dyn ObjectStore>,
    registry: Arc<PlannerRegistry>,
    bucket: String,
}

impl DeleteCoordinator {
    pub fn new(
        db: Arc<dyn Database>,
        store: Arc<dyn ObjectStore>,
        registry: Arc<PlannerRegistry>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            db,
            store,
            registry,
            bucket: bucket.into(),
        }
    }

    fn planner(&self, table: &str) -> CatalogResult<Arc<dyn EntityPlanner>> {
        self.registry
            .get(table)
            .ok_or_else(|| CatalogError::Config(format!("no planner registered for table '{table}'")))
    }

    /// Delete one row and, after commit, its stored objects.
    pub async fn delete(&self, req: &DeleteRequest) -> CatalogResult<DeleteOutcome> {
        let planner = self.planner(&req.table)?;
        planner.validate_delete(req)?;

        let mut tx = self.db.begin().await?;
        let plan = match planner.build_delete_plan(req, tx.as_mut(), &self.bucket).await {
            Ok(plan) => plan,
            Err(err) => {
                rollback(tx).await;
                return Err(err);
            }
        };

        for op in &plan.db_ops {
            if let Err(err) = run_db_op(op, tx.as_mut()).await {
                rollback(tx).await;
                return Err(err);
            }
        }
        tx.commit().await.map_err(CatalogError::from)?;

        let mut warnings = plan.warnings;
        for obj in &plan.storage_deletes {
            if let Err(err) = self.store.delete(&obj.bucket, &obj.object_key).await {
                warn!(
                    bucket = %obj.bucket,
                    object_key = %obj.object_key,
                    row_id = req.row_id,
                    error = %err,
                    "storage delete failed after commit"
                );
                warnings.push(DeleteWarning {
                    bucket: obj.bucket.clone(),
                    object_key: obj.object_key.clone(),
                    message: err.to_string(),
                });
            }
        }

        Ok(DeleteOutcome {
            row_id: req.row_id,
            warnings,
        })
    }
}

async fn rollback(tx: Box<dyn DbTransaction>) {
    if let Err(err) = tx.rollback().await {
        error!(error = %err, "transaction rollback failed");
    }
}
