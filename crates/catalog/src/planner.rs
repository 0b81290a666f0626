//! Per-table planning contract and the registry that selects planners.

use crate::error::CatalogResult;
use crate::plan::{DeletePlan, WritePlan};
use crate::schema_cache::SchemaCache;
use async_trait::async_trait;
use lathe_core::request::{CellUpdateRequest, DeleteRequest, WriteRequest};
use lathe_core::tables::TableAliases;
use lathe_db::traits::DbTransaction;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Plans the relational and object-store work for one table family.
///
/// `validate_*` never touch a store beyond the schema cache. `build_*_plan`
/// are pure apart from `build_delete_plan`, which reads current object keys
/// inside the caller's transaction.
#[async_trait]
pub trait EntityPlanner: Send + Sync {
    /// Logical table name this planner serves.
    fn table(&self) -> &str;

    async fn validate_write(&self, req: &WriteRequest, schema: &SchemaCache) -> CatalogResult<()>;

    /// Insert the base row for non-attachment fields and return its id.
    async fn insert_base_row(
        &self,
        req: &WriteRequest,
        tx: &mut dyn DbTransaction,
    ) -> CatalogResult<i64>;

    /// Build the write plan given the already-allocated row id and the
    /// pre-assigned attachment-id to object-key map.
    fn build_write_plan(
        &self,
        row_id: i64,
        req: &WriteRequest,
        object_keys: &HashMap<String, String>,
        bucket: &str,
    ) -> CatalogResult<WritePlan>;

    async fn validate_update(
        &self,
        req: &CellUpdateRequest,
        schema: &SchemaCache,
    ) -> CatalogResult<()>;

    fn build_update_plan(
        &self,
        req: &CellUpdateRequest,
        object_keys: &HashMap<String, String>,
        bucket: &str,
    ) -> CatalogResult<WritePlan>;

    fn validate_delete(&self, req: &DeleteRequest) -> CatalogResult<()>;

    /// Build the delete plan, selecting the row's current object keys inside
    /// the transaction so post-commit storage deletes see a consistent set.
    async fn build_delete_plan(
        &self,
        req: &DeleteRequest,
        tx: &mut dyn DbTransaction,
        bucket: &str,
    ) -> CatalogResult<DeletePlan>;
}

/// Maps logical table names to their planners.
pub struct PlannerRegistry {
    aliases: Arc<TableAliases>,
    planners: HashMap<String, Arc<dyn EntityPlanner>>,
}

impl PlannerRegistry {
    pub fn new(aliases: Arc<TableAliases>) -> Self {
        Self {
            aliases,
            planners: HashMap::new(),
        }
    }

    /// Register a planner under a logical table name. Re-registering the same
    /// name replaces the previous planner.
    pub fn register(&mut self, table: impl Into<String>, planner: Arc<dyn EntityPlanner>) {
        let table = table.into();
        if self.planners.insert(table.clone(), planner).is_some() {
            warn!(table = %table, "replacing previously registered planner");
        }
    }

    /// Look up a planner: exact name first, then the virtual-child chain's
    /// base table.
    pub fn get(&self, table: &str) -> Option<Arc<dyn EntityPlanner>> {
        if let Some(planner) = self.planners.get(table) {
            return Some(Arc::clone(planner));
        }
        let base = self.aliases.base_table(table);
        if base != table {
            if let Some(planner) = self.planners.get(&base) {
                return Some(Arc::clone(planner));
            }
        }
        None
    }
}
