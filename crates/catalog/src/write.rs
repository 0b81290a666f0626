//! Write/update coordinator: executes plans atomically across the relational
//! store and the object store.
//!
//! The relational transaction is authoritative. On any failure after `begin`
//! the transaction is rolled back and every object uploaded in this attempt
//! gets a best-effort compensating delete; cleanup failures are logged and
//! the original error is returned. A leaked object is an accepted failure
//! mode, never a correctness violation of the relational state.

use crate::error::{CatalogError, CatalogResult};
use crate::plan::{run_db_op, ObjectRef, WritePlan};
use crate::planner::{EntityPlanner, PlannerRegistry};
use crate::schema_cache::SchemaCache;
use lathe_core::request::{AttachmentInput, CellUpdateRequest, WriteRequest};
use lathe_db::traits::{Database, DbTransaction};
use lathe_storage::ObjectStore;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

/// Success result of a write or update.
#[derive(Clone, Debug)]
pub struct WriteOutcome {
    pub row_id: i64,
    /// Attachment-id to object-key map plus any planner-specific payload.
    pub extra: Value,
}

/// Assign object keys before plan construction so uploads and the slot
/// upsert agree on them. Key shape:
/// `<table>/<row_id>/<column>_<role>_<unique-suffix>[.ext]`.
pub fn assign_object_keys(
    table: &str,
    row_id: i64,
    attachments: &[AttachmentInput],
) -> HashMap<String, String> {
    attachments
        .iter()
        .map(|att| {
            let suffix = Uuid::new_v4().simple().to_string();
            let ext = att
                .extension()
                .map(|e| format!(".{e}"))
                .unwrap_or_default();
            let key = format!(
                "{table}/{row_id}/{}_{}_{suffix}{ext}",
                att.target_column,
                att.role.as_str()
            );
            (att.id.clone(), key)
        })
        .collect()
}

/// Orchestrates write and cell-update requests.
pub struct WriteCoordinator {
    db: Arc<dyn Database>,
    store: Arc<dyn ObjectStore>,
    registry: Arc<PlannerRegistry>,
    schema: Arc<SchemaCache>,
    bucket: String,
}

impl WriteCoordinator {
    pub fn new(
        db: Arc<dyn Database>,
        store: Arc<dyn ObjectStore>,
        registry: Arc<PlannerRegistry>,
        schema: Arc<SchemaCache>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            db,
            store,
            registry,
            schema,
            bucket: bucket.into(),
        }
    }

    fn planner(&self, table: &str) -> CatalogResult<Arc<dyn EntityPlanner>> {
        self.registry
            .get(table)
            .ok_or_else(|| CatalogError::Config(format!("no planner registered for table '{table}'")))
    }

    /// Create one row plus its attachments as a single atomic unit.
    pub async fn write(&self, req: &WriteRequest) -> CatalogResult<WriteOutcome> {
        let planner = self.planner(&req.table)?;
        planner.validate_write(req, &self.schema).await?;

        let mut tx = self.db.begin().await?;
        let row_id = match planner.insert_base_row(req, tx.as_mut()).await {
            Ok(id) => id,
            Err(err) => {
                rollback(tx).await;
                return Err(err);
            }
        };

        let object_keys = assign_object_keys(&req.table, row_id, &req.attachments);
        let plan = match planner.build_write_plan(row_id, req, &object_keys, &self.bucket) {
            Ok(plan) => plan,
            Err(err) => {
                rollback(tx).await;
                return Err(err);
            }
        };

        self.execute_plan(tx, plan, row_id, &req.attachments, object_keys)
            .await
    }

    /// Update one cell (and optionally its image slot) atomically.
    pub async fn update(&self, req: &CellUpdateRequest) -> CatalogResult<WriteOutcome> {
        let planner = self.planner(&req.table)?;
        planner.validate_update(req, &self.schema).await?;

        let object_keys = assign_object_keys(&req.table, req.row_id, &req.attachments);
        let plan = planner.build_update_plan(req, &object_keys, &self.bucket)?;

        let tx = self.db.begin().await?;
        self.execute_plan(tx, plan, req.row_id, &req.attachments, object_keys)
            .await
    }

    async fn execute_plan(
        &self,
        mut tx: Box<dyn DbTransaction>,
        plan: WritePlan,
        row_id: i64,
        attachments: &[AttachmentInput],
        object_keys: HashMap<String, String>,
    ) -> CatalogResult<WriteOutcome> {
        let mut uploaded: Vec<ObjectRef> = Vec::new();
        let result = self
            .run_plan(tx.as_mut(), &plan, attachments, &mut uploaded)
            .await;

        match result {
            Ok(()) => match tx.commit().await {
                Ok(()) => Ok(WriteOutcome {
                    row_id,
                    extra: outcome_extra(&object_keys, plan.success_extra),
                }),
                Err(err) => {
                    // The transaction handle is gone; only object cleanup is left.
                    self.cleanup_uploads(&uploaded).await;
                    Err(err.into())
                }
            },
            Err(err) => {
                rollback(tx).await;
                self.cleanup_uploads(&uploaded).await;
                Err(err)
            }
        }
    }

    async fn run_plan(
        &self,
        tx: &mut dyn DbTransaction,
        plan: &WritePlan,
        attachments: &[AttachmentInput],
        uploaded: &mut Vec<ObjectRef>,
    ) -> CatalogResult<()> {
        for op in &plan.pre_upload_ops {
            run_db_op(op, tx).await?;
        }

        let bytes_by_id: HashMap<&str, &AttachmentInput> =
            attachments.iter().map(|att| (att.id.as_str(), att)).collect();
        for upload in &plan.uploads {
            let att = bytes_by_id.get(upload.attachment_id.as_str()).ok_or_else(|| {
                CatalogError::Config(format!(
                    "plan references unknown attachment '{}'",
                    upload.attachment_id
                ))
            })?;
            self.store
                .put(
                    &upload.bucket,
                    &upload.object_key,
                    att.bytes.clone(),
                    Some(&upload.mime_type),
                )
                .await?;
            uploaded.push(ObjectRef {
                bucket: upload.bucket.clone(),
                object_key: upload.object_key.clone(),
            });
        }

        for op in &plan.post_upload_ops {
            run_db_op(op, tx).await?;
        }
        Ok(())
    }

    /// Best-effort compensating deletes for objects uploaded in this attempt.
    async fn cleanup_uploads(&self, uploaded: &[ObjectRef]) {
        for obj in uploaded {
            if let Err(err) = self.store.delete(&obj.bucket, &obj.object_key).await {
                warn!(
                    bucket = %obj.bucket,
                    object_key = %obj.object_key,
                    error = %err,
                    "failed to clean up uploaded object after rollback"
                );
            }
        }
    }
}

async fn rollback(tx: Box<dyn DbTransaction>) {
    if let Err(err) = tx.rollback().await {
        error!(error = %err, "transaction rollback failed");
    }
}

fn outcome_extra(object_keys: &HashMap<String, String>, success_extra: Option<Value>) -> Value {
    let mut extra = serde_json::Map::new();
    if !object_keys.is_empty() {
        extra.insert("attachments".to_string(), json!(object_keys));
    }
    if let Some(Value::Object(map)) = success_extra {
        extra.extend(map);
    }
    Value::Object(extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use lathe_core::request::AttachmentRole;

    #[test]
    fn object_keys_follow_the_layout() {
        let attachments = vec![AttachmentInput {
            id: "f1".into(),
            target_column: "image_photo".into(),
            role: AttachmentRole::Image,
            filename: "drill.png".into(),
            mime_type: "image/png".into(),
            bytes: Bytes::from_static(b"x"),
        }];
        let keys = assign_object_keys("catalog", 42, &attachments);
        let key = keys.get("f1").unwrap();
        assert!(key.starts_with("catalog/42/image_photo_image_"));
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn object_keys_omit_missing_extension() {
        let attachments = vec![AttachmentInput {
            id: "f1".into(),
            target_column: "image_photo".into(),
            role: AttachmentRole::ImageSmall,
            filename: "thumb".into(),
            mime_type: "image/png".into(),
            bytes: Bytes::from_static(b"x"),
        }];
        let keys = assign_object_keys("catalog", 7, &attachments);
        let key = keys.get("f1").unwrap();
        assert!(key.starts_with("catalog/7/image_photo_image_small_"));
        assert!(!key.contains('.'));
    }
}
