//! Default planner for catalog tables with image-slot columns.
//!
//! An image slot is one `image_*` column on the base table, backed by a row
//! in a side table keyed by (fk, slot). Each slot holds an optional full
//! image and an optional thumbnail; the post-upload upsert only overwrites
//! the variants actually supplied in the current request (COALESCE per
//! column), so updating one variant never clobbers the other.

use crate::error::{CatalogError, CatalogResult, ValidationError};
use crate::plan::{DbOp, DbOpKind, DeletePlan, ObjectRef, UploadOp, WritePlan};
use crate::planner::EntityPlanner;
use crate::schema_cache::SchemaCache;
use async_trait::async_trait;
use lathe_core::ident::{is_safe_identifier, quote_ident, quote_qualified};
use lathe_core::request::{
    is_image_type, AttachmentInput, AttachmentRole, CellUpdateRequest, DeleteRequest, FieldValue,
    ImageLinkMeta, WriteRequest, IMAGE_COLUMN_PREFIX,
};
use lathe_core::tables::{TableAliases, CHILD_TYPE_ID_COLUMN};
use lathe_db::value::{SqlValue, Statement};
use lathe_db::traits::DbTransaction;
use lathe_db::DbError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Planner for one logical table whose attachments live in image slots.
pub struct ImageSlotsPlanner {
    table: String,
    base_table: String,
    images_table: String,
    fk_column: String,
    schema: String,
    aliases: Arc<TableAliases>,
}

impl ImageSlotsPlanner {
    /// Build a planner for a logical table name. The name must resolve to a
    /// registered base table carrying an images side table.
    pub fn new(
        table: impl Into<String>,
        schema: impl Into<String>,
        aliases: Arc<TableAliases>,
    ) -> CatalogResult<Self> {
        let table = table.into();
        let base_table = aliases.base_table(&table);
        let entry = aliases.entry(&base_table).ok_or_else(|| {
            CatalogError::Config(format!("no table entry registered for '{base_table}'"))
        })?;
        Ok(Self {
            table,
            base_table,
            images_table: entry.images_table.clone(),
            fk_column: entry.fk_column.clone(),
            schema: schema.into(),
            aliases,
        })
    }

    /// Column whitelist for a logical table: its schema columns plus `id`.
    async fn allowed_columns(
        &self,
        table: &str,
        schema: &SchemaCache,
    ) -> CatalogResult<HashSet<String>> {
        let cols = schema.columns(table).await?;
        if cols.is_empty() {
            return Err(ValidationError::bad_request(
                "Invalid payload: unknown table or empty schema",
            )
            .into());
        }
        let mut allowed: HashSet<String> = cols.iter().map(|c| c.name.clone()).collect();
        allowed.insert("id".to_string());
        Ok(allowed)
    }

    fn check_table(&self, table: &str) -> CatalogResult<()> {
        if self.aliases.base_table(table) != self.base_table {
            return Err(ValidationError::bad_request("Invalid payload: unexpected table")
                .with_detail("table", table)
                .into());
        }
        Ok(())
    }

    fn check_attachment(
        &self,
        att: &AttachmentInput,
        allowed: &HashSet<String>,
        declared_types: &std::collections::BTreeMap<String, String>,
    ) -> CatalogResult<()> {
        if !is_safe_identifier(&att.target_column) {
            return Err(ValidationError::bad_request("Invalid attachment column")
                .with_detail("column", att.target_column.as_str())
                .into());
        }
        if !att.target_column.starts_with(IMAGE_COLUMN_PREFIX) {
            return Err(
                ValidationError::bad_request("Invalid attachment column: expected image_*")
                    .with_detail("column", att.target_column.as_str())
                    .into(),
            );
        }
        if !allowed.contains(&att.target_column) {
            return Err(
                ValidationError::bad_request("Invalid attachment column: column not found")
                    .with_detail("column", att.target_column.as_str())
                    .into(),
            );
        }
        match declared_types.get(&att.target_column) {
            None => Err(
                ValidationError::bad_request("Invalid payload: types missing attachment column")
                    .with_detail("column", att.target_column.as_str())
                    .into(),
            ),
            Some(type_name) if !is_image_type(type_name) => Err(ValidationError::bad_request(
                "Invalid attachment type for column",
            )
            .with_detail("column", att.target_column.as_str())
            .with_detail("type", type_name.as_str())
            .into()),
            Some(_) => Ok(()),
        }
    }

    /// Upload ops plus the slot upsert for one image column.
    fn append_image_slot(
        &self,
        plan: &mut WritePlan,
        row_id: i64,
        column: &str,
        big: Option<&AttachmentInput>,
        small: Option<&AttachmentInput>,
        object_keys: &HashMap<String, String>,
        bucket: &str,
        meta: Option<&ImageLinkMeta>,
    ) -> CatalogResult<()> {
        for att in [big, small].into_iter().flatten() {
            if let Some(key) = object_keys.get(&att.id) {
                plan.uploads.push(UploadOp {
                    attachment_id: att.id.clone(),
                    bucket: bucket.to_string(),
                    object_key: key.clone(),
                    mime_type: att.mime_type.clone(),
                });
            }
        }

        let images_table = quote_qualified(&self.schema, &self.images_table)?;
        let fk_col = quote_ident(&self.fk_column)?;
        let sql = format!(
            "INSERT INTO {images_table} \
             ({fk_col}, slot, big_bucket, big_object_key, big_mime_type, big_size_bytes, \
             small_bucket, small_object_key, small_mime_type, small_size_bytes, link_name, link_url) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12) \
             ON CONFLICT ({fk_col}, slot) DO UPDATE SET \
             big_bucket = COALESCE(EXCLUDED.big_bucket, {images_table}.big_bucket), \
             big_object_key = COALESCE(EXCLUDED.big_object_key, {images_table}.big_object_key), \
             big_mime_type = COALESCE(EXCLUDED.big_mime_type, {images_table}.big_mime_type), \
             big_size_bytes = COALESCE(EXCLUDED.big_size_bytes, {images_table}.big_size_bytes), \
             small_bucket = COALESCE(EXCLUDED.small_bucket, {images_table}.small_bucket), \
             small_object_key = COALESCE(EXCLUDED.small_object_key, {images_table}.small_object_key), \
             small_mime_type = COALESCE(EXCLUDED.small_mime_type, {images_table}.small_mime_type), \
             small_size_bytes = COALESCE(EXCLUDED.small_size_bytes, {images_table}.small_size_bytes), \
             link_name = COALESCE(EXCLUDED.link_name, {images_table}.link_name), \
             link_url = COALESCE(EXCLUDED.link_url, {images_table}.link_url), \
             updated_at = now()"
        );

        let variant_params = |att: Option<&AttachmentInput>| -> [SqlValue; 4] {
            match att {
                Some(att) => [
                    SqlValue::Text(bucket.to_string()),
                    object_keys
                        .get(&att.id)
                        .map(|k| SqlValue::Text(k.clone()))
                        .unwrap_or(SqlValue::Null),
                    SqlValue::Text(att.mime_type.clone()),
                    SqlValue::Int(att.bytes.len() as i64),
                ],
                None => [SqlValue::Null, SqlValue::Null, SqlValue::Null, SqlValue::Null],
            }
        };

        let mut stmt = Statement::new(sql).bind(row_id).bind(column);
        for value in variant_params(big) {
            stmt = stmt.bind(value);
        }
        for value in variant_params(small) {
            stmt = stmt.bind(value);
        }
        stmt = stmt
            .bind(meta.and_then(|m| m.name.clone()))
            .bind(meta.and_then(|m| m.link.clone()));

        plan.post_upload_ops.push(DbOp {
            debug_name: "upsert_image_slot",
            kind: DbOpKind::Execute { statement: stmt },
        });
        Ok(())
    }
}

fn split_roles<'a>(
    attachments: impl IntoIterator<Item = &'a AttachmentInput>,
) -> (Option<&'a AttachmentInput>, Option<&'a AttachmentInput>) {
    let mut big = None;
    let mut small = None;
    for att in attachments {
        match att.role {
            AttachmentRole::Image => big = Some(att),
            AttachmentRole::ImageSmall => small = Some(att),
        }
    }
    (big, small)
}

#[async_trait]
impl EntityPlanner for ImageSlotsPlanner {
    fn table(&self) -> &str {
        &self.table
    }

    async fn validate_write(&self, req: &WriteRequest, schema: &SchemaCache) -> CatalogResult<()> {
        self.check_table(&req.table)?;
        let allowed = self.allowed_columns(&req.table, schema).await?;

        for key in req.fields.keys() {
            if !allowed.contains(key) {
                return Err(
                    ValidationError::bad_request("Invalid payload: unknown column in 'fields'")
                        .with_detail("column", key.as_str())
                        .into(),
                );
            }
        }
        for key in req.types.keys() {
            if !allowed.contains(key) {
                return Err(
                    ValidationError::bad_request("Invalid payload: unknown column in 'types'")
                        .with_detail("column", key.as_str())
                        .into(),
                );
            }
        }
        for key in req.fields.keys() {
            if key != "id" && !req.types.contains_key(key) {
                return Err(
                    ValidationError::bad_request("Invalid payload: types missing key for field")
                        .with_detail("column", key.as_str())
                        .into(),
                );
            }
        }

        let mut role_seen: HashMap<&str, HashSet<AttachmentRole>> = HashMap::new();
        for att in &req.attachments {
            self.check_attachment(att, &allowed, &req.types)?;
            if !role_seen
                .entry(att.target_column.as_str())
                .or_default()
                .insert(att.role)
            {
                return Err(
                    ValidationError::bad_request("Duplicate attachment role for column")
                        .with_detail("column", att.target_column.as_str())
                        .with_detail("role", att.role.as_str())
                        .into(),
                );
            }
        }
        Ok(())
    }

    async fn insert_base_row(
        &self,
        req: &WriteRequest,
        tx: &mut dyn DbTransaction,
    ) -> CatalogResult<i64> {
        let mut fields: Vec<(&str, SqlValue)> = req
            .fields
            .iter()
            .filter(|(name, _)| name.as_str() != "id")
            .map(|(name, value)| (name.as_str(), SqlValue::from(value)))
            .collect();

        // Writes through a virtual child record which logical table the row
        // belongs to.
        let child_type_id = self.aliases.table_id(&req.table);
        let has_type_column = req
            .fields
            .get(CHILD_TYPE_ID_COLUMN)
            .map(|v| !v.is_null())
            .unwrap_or(false);
        if !has_type_column {
            if let Some(table_id) = child_type_id {
                fields.retain(|(name, _)| *name != CHILD_TYPE_ID_COLUMN);
                fields.push((CHILD_TYPE_ID_COLUMN, SqlValue::Int(table_id as i64)));
            }
        }

        let base = quote_qualified(&self.schema, &self.base_table)?;
        let stmt = if fields.is_empty() {
            Statement::new(format!("INSERT INTO {base} DEFAULT VALUES RETURNING id"))
        } else {
            let mut columns = Vec::with_capacity(fields.len());
            let mut placeholders = Vec::with_capacity(fields.len());
            for (i, (name, _)) in fields.iter().enumerate() {
                columns.push(quote_ident(name)?);
                placeholders.push(format!("${}", i + 1));
            }
            let mut stmt = Statement::new(format!(
                "INSERT INTO {base} ({}) VALUES ({}) RETURNING id",
                columns.join(", "),
                placeholders.join(",")
            ));
            for (_, value) in fields {
                stmt = stmt.bind(value);
            }
            stmt
        };

        let rows = tx.query(stmt).await?;
        let row = rows
            .first()
            .ok_or_else(|| DbError::EmptyResult("insert did not return id".to_string()))?;
        row.get_i64("id")
            .ok_or_else(|| DbError::Decode {
                column: "id".to_string(),
                message: "insert returned a non-integer id".to_string(),
            })
            .map_err(CatalogError::from)
    }

    fn build_write_plan(
        &self,
        row_id: i64,
        req: &WriteRequest,
        object_keys: &HashMap<String, String>,
        bucket: &str,
    ) -> CatalogResult<WritePlan> {
        let mut plan = WritePlan::default();

        let mut by_column: HashMap<&str, Vec<&AttachmentInput>> = HashMap::new();
        for att in &req.attachments {
            by_column.entry(att.target_column.as_str()).or_default().push(att);
        }
        // Deterministic slot order keeps plans reproducible.
        let mut columns: Vec<&str> = by_column.keys().copied().collect();
        columns.sort_unstable();

        for column in columns {
            let Some(type_name) = req.types.get(column) else {
                continue;
            };
            if !is_image_type(type_name) {
                continue;
            }
            let (big, small) = split_roles(by_column[column].iter().copied());
            let meta = (type_name.as_str() == lathe_core::request::TYPE_IMAGE_WITH_LINK)
                .then(|| req.image_meta.get(column))
                .flatten();
            self.append_image_slot(&mut plan, row_id, column, big, small, object_keys, bucket, meta)?;
        }
        Ok(plan)
    }

    async fn validate_update(
        &self,
        req: &CellUpdateRequest,
        schema: &SchemaCache,
    ) -> CatalogResult<()> {
        self.check_table(&req.table)?;
        if req.row_id <= 0 {
            return Err(
                ValidationError::bad_request("Invalid payload: missing or invalid rowId").into(),
            );
        }
        let Some(type_name) = req.types.get(&req.column) else {
            return Err(
                ValidationError::bad_request("Invalid payload: types missing column")
                    .with_detail("column", req.column.as_str())
                    .into(),
            );
        };

        let allowed = self.allowed_columns(&req.table, schema).await?;
        if !allowed.contains(&req.column) {
            return Err(ValidationError::bad_request("Invalid payload: unknown column")
                .with_detail("column", req.column.as_str())
                .into());
        }

        if !req.fields.is_empty() {
            if req.fields.len() != 1 || !req.fields.contains_key(&req.column) {
                return Err(ValidationError::bad_request(
                    "Invalid payload: fields must contain only the target column",
                )
                .with_detail("column", req.column.as_str())
                .into());
            }
        } else if !is_image_type(type_name) && req.attachments.is_empty() {
            return Err(
                ValidationError::bad_request("Invalid payload: empty fields for non-image type")
                    .with_detail("column", req.column.as_str())
                    .into(),
            );
        }

        if !req.attachments.is_empty() {
            if !is_image_type(type_name) {
                return Err(ValidationError::bad_request(
                    "Invalid payload: attachments only allowed for Image types",
                )
                .into());
            }
            let mut role_seen: HashSet<AttachmentRole> = HashSet::new();
            for att in &req.attachments {
                if att.target_column != req.column {
                    return Err(ValidationError::bad_request(
                        "Invalid attachment column: expected target column",
                    )
                    .with_detail("column", att.target_column.as_str())
                    .into());
                }
                self.check_attachment(att, &allowed, &req.types)?;
                if !role_seen.insert(att.role) {
                    return Err(
                        ValidationError::bad_request("Duplicate attachment role for column")
                            .with_detail("column", att.target_column.as_str())
                            .with_detail("role", att.role.as_str())
                            .into(),
                    );
                }
            }
        }
        Ok(())
    }

    fn build_update_plan(
        &self,
        req: &CellUpdateRequest,
        object_keys: &HashMap<String, String>,
        bucket: &str,
    ) -> CatalogResult<WritePlan> {
        let mut plan = WritePlan::default();
        let is_child = self.aliases.base_table(&req.table) != req.table;

        if let Some(value) = req.fields.get(&req.column) {
            let base = quote_qualified(&self.schema, &self.base_table)?;
            let column = quote_ident(&req.column)?;
            let mut sql = format!("UPDATE {base} SET {column} = $1 WHERE id = $2");
            let mut stmt_params: Vec<SqlValue> = vec![SqlValue::from(value), SqlValue::Int(req.row_id)];
            if is_child {
                let child_type_id = self.aliases.table_id(&req.table).ok_or_else(|| {
                    CatalogError::from(
                        ValidationError::bad_request("Unknown child table")
                            .with_detail("table", req.table.as_str()),
                    )
                })?;
                sql.push_str(&format!(" AND {} = $3", quote_ident(CHILD_TYPE_ID_COLUMN)?));
                stmt_params.push(SqlValue::Int(child_type_id as i64));
            }
            let mut stmt = Statement::new(sql);
            for param in stmt_params {
                stmt = stmt.bind(param);
            }
            plan.pre_upload_ops.push(DbOp {
                debug_name: "update_cell",
                kind: DbOpKind::ExecuteExpectRow {
                    statement: stmt,
                    missing: "Row not found for update".to_string(),
                },
            });
        }

        let Some(type_name) = req.types.get(&req.column) else {
            return Ok(plan);
        };
        if !is_image_type(type_name) {
            return Ok(plan);
        }

        let (big, small) = split_roles(&req.attachments);
        let meta = (type_name.as_str() == lathe_core::request::TYPE_IMAGE_WITH_LINK)
            .then(|| req.image_meta.get(&req.column))
            .flatten();
        if big.is_some() || small.is_some() || meta.is_some() {
            self.append_image_slot(
                &mut plan,
                req.row_id,
                &req.column,
                big,
                small,
                object_keys,
                bucket,
                meta,
            )?;
        }
        Ok(plan)
    }

    fn validate_delete(&self, req: &DeleteRequest) -> CatalogResult<()> {
        self.check_table(&req.table)?;
        if req.row_id <= 0 {
            return Err(
                ValidationError::bad_request("Invalid payload: missing or invalid rowId").into(),
            );
        }
        Ok(())
    }

    async fn build_delete_plan(
        &self,
        req: &DeleteRequest,
        tx: &mut dyn DbTransaction,
        bucket: &str,
    ) -> CatalogResult<DeletePlan> {
        let mut plan = DeletePlan::default();
        let images_table = quote_qualified(&self.schema, &self.images_table)?;
        let fk_col = quote_ident(&self.fk_column)?;

        let select = Statement::new(format!(
            "SELECT big_bucket, big_object_key, small_bucket, small_object_key \
             FROM {images_table} WHERE {fk_col} = $1"
        ))
        .bind(req.row_id);
        let rows = tx.query(select).await?;

        let mut seen: HashSet<ObjectRef> = HashSet::new();
        for row in &rows {
            for (bucket_col, key_col) in [
                ("big_bucket", "big_object_key"),
                ("small_bucket", "small_object_key"),
            ] {
                let Some(object_key) = row.get_str(key_col) else {
                    continue;
                };
                if object_key.is_empty() {
                    continue;
                }
                let object_bucket = row.get_str(bucket_col).unwrap_or(bucket);
                let reference = ObjectRef {
                    bucket: object_bucket.to_string(),
                    object_key: object_key.to_string(),
                };
                if seen.insert(reference.clone()) {
                    plan.storage_deletes.push(reference);
                }
            }
        }

        plan.db_ops.push(DbOp {
            debug_name: "delete_images_by_fk",
            kind: DbOpKind::Execute {
                statement: Statement::new(format!(
                    "DELETE FROM {images_table} WHERE {fk_col} = $1"
                ))
                .bind(req.row_id),
            },
        });

        let base = quote_qualified(&self.schema, &self.base_table)?;
        plan.db_ops.push(DbOp {
            debug_name: "delete_base_row",
            kind: DbOpKind::ExecuteExpectRow {
                statement: Statement::new(format!("DELETE FROM {base} WHERE id = $1"))
                    .bind(req.row_id),
                missing: "Row not found for delete".to_string(),
            },
        });

        Ok(plan)
    }
}
