//! Retention purger: hard-deletes aged soft-deleted rows.
//!
//! One purge batch runs at a time across the whole deployment, enforced by a
//! non-blocking advisory lock. Row deletion goes through the delete
//! coordinator; a single row's failure never aborts the batch.

use crate::delete::DeleteCoordinator;
use crate::error::CatalogResult;
use lathe_core::config::PurgeConfig;
use lathe_core::ident::quote_qualified;
use lathe_core::request::DeleteRequest;
use lathe_core::tables::TableAliases;
use lathe_db::traits::{AdvisoryLocks, Database};
use lathe_db::value::Statement;
use std::sync::Arc;
use tracing::{error, info};

pub struct RetentionPurger {
    config: PurgeConfig,
    schema: String,
    db: Arc<dyn Database>,
    locks: Arc<dyn AdvisoryLocks>,
    deleter: Arc<DeleteCoordinator>,
    aliases: Arc<TableAliases>,
}

impl RetentionPurger {
    pub fn new(
        config: PurgeConfig,
        schema: impl Into<String>,
        db: Arc<dyn Database>,
        locks: Arc<dyn AdvisoryLocks>,
        deleter: Arc<DeleteCoordinator>,
        aliases: Arc<TableAliases>,
    ) -> Self {
        Self {
            config,
            schema: schema.into(),
            db,
            locks,
            deleter,
            aliases,
        }
    }

    /// Run one purge pass. Returns the number of rows hard-deleted; 0 when
    /// another instance holds the lock.
    pub async fn run_once(&self) -> CatalogResult<u64> {
        let base_table = self.aliases.base_table(&self.config.table);
        // Resolve the quoted table reference up front so an unsafe name fails
        // before the lock is taken.
        let qualified = quote_qualified(&self.schema, &base_table)?;

        let mut locked = false;
        if self.config.use_advisory_lock {
            match self.locks.try_lock(self.config.advisory_lock_key).await? {
                true => locked = true,
                false => return Ok(0),
            }
        }

        let purged = self.purge_batch(&base_table, &qualified).await;
        if purged > 0 {
            info!(table = %base_table, purged, "purge pass complete");
        }

        if locked {
            if let Err(err) = self.locks.unlock(self.config.advisory_lock_key).await {
                error!(error = %err, "advisory unlock failed");
            }
        }
        Ok(purged)
    }

    async fn purge_batch(&self, base_table: &str, qualified: &str) -> u64 {
        let select = Statement::new(format!(
            "SELECT id FROM {qualified} \
             WHERE is_deleted = TRUE \
             AND deleted_at IS NOT NULL \
             AND deleted_at <= now() - ($1::int * interval '1 day') \
             ORDER BY deleted_at ASC \
             LIMIT $2"
        ))
        .bind(self.config.retention_days)
        .bind(self.config.batch_size);

        let rows = match self.db.query(select).await {
            Ok(rows) => rows,
            Err(err) => {
                error!(error = %err, "purge row selection failed");
                return 0;
            }
        };

        let mut purged = 0u64;
        for row in &rows {
            let Some(row_id) = row.get_i64("id") else {
                continue;
            };
            let req = DeleteRequest {
                table: base_table.to_string(),
                row_id,
            };
            match self.deleter.delete(&req).await {
                Ok(_) => purged += 1,
                Err(err) => {
                    error!(row_id, error = %err, "hard delete failed during purge");
                }
            }
        }
        purged
    }
}
