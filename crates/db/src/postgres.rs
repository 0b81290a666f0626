//! PostgreSQL implementation of the relational collaborator traits.

use crate::error::{DbError, DbResult};
use crate::traits::{AdvisoryLocks, Database, DbTransaction, SchemaColumn, SchemaSource};
use crate::value::{Row, SqlValue, Statement};
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgColumn, PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Pool, Postgres, Row as _, TypeInfo, ValueRef};
use std::str::FromStr;

/// PostgreSQL-backed database handle.
///
/// One value serves all three collaborator roles (transactions, schema
/// introspection, advisory locks) over a shared connection pool.
pub struct PostgresDatabase {
    pool: Pool<Postgres>,
}

impl PostgresDatabase {
    /// Create a handle from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> DbResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a handle from individual connection parameters, enabling
    /// passwords to come from the environment rather than a URL.
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> DbResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }
        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> DbResult<Self> {
        // Server-side statement timeout prevents hung queries from pinning
        // pool connections during long plan executions.
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

fn bind_statement(stmt: &Statement) -> Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(&stmt.sql);
    for param in &stmt.params {
        query = match param {
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
        };
    }
    query
}

fn decode_value(row: &PgRow, column: &PgColumn) -> DbResult<SqlValue> {
    let idx = column.ordinal();
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }

    let type_name = column.type_info().name();
    let value = match type_name {
        "BOOL" => SqlValue::Bool(row.try_get(idx)?),
        "INT2" => SqlValue::Int(row.try_get::<i16, _>(idx)? as i64),
        "INT4" => SqlValue::Int(row.try_get::<i32, _>(idx)? as i64),
        "INT8" => SqlValue::Int(row.try_get::<i64, _>(idx)?),
        "FLOAT4" => SqlValue::Float(row.try_get::<f32, _>(idx)? as f64),
        "FLOAT8" => SqlValue::Float(row.try_get::<f64, _>(idx)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
            SqlValue::Text(row.try_get::<String, _>(idx)?)
        }
        other => row
            .try_get::<String, _>(idx)
            .map(SqlValue::Text)
            .map_err(|e| DbError::Decode {
                column: column.name().to_string(),
                message: format!("unsupported type {other}: {e}"),
            })?,
    };
    Ok(value)
}

fn decode_row(row: &PgRow) -> DbResult<Row> {
    let mut pairs = Vec::with_capacity(row.len());
    for column in row.columns() {
        pairs.push((column.name().to_string(), decode_value(row, column)?));
    }
    Ok(Row::from_pairs(pairs))
}

/// A live PostgreSQL transaction.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl DbTransaction for PgTransaction {
    async fn query(&mut self, stmt: Statement) -> DbResult<Vec<Row>> {
        let rows = bind_statement(&stmt).fetch_all(&mut *self.tx).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&mut self, stmt: Statement) -> DbResult<u64> {
        let result = bind_statement(&stmt).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn begin(&self) -> DbResult<Box<dyn DbTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn query(&self, stmt: Statement) -> DbResult<Vec<Row>> {
        let rows = bind_statement(&stmt).fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, stmt: Statement) -> DbResult<u64> {
        let result = bind_statement(&stmt).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SchemaSource for PostgresDatabase {
    async fn list_columns(&self, schema: &str, table: &str) -> DbResult<Vec<SchemaColumn>> {
        let stmt = Statement::new(
            "SELECT \
               column_name, \
               data_type, \
               udt_name, \
               numeric_precision, \
               numeric_scale \
             FROM information_schema.columns \
             WHERE table_schema = $1 \
               AND table_name   = $2 \
             ORDER BY ordinal_position",
        )
        .bind(schema)
        .bind(table);

        let rows = Database::query(self, stmt).await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row
                .get_str("column_name")
                .ok_or_else(|| DbError::Decode {
                    column: "column_name".to_string(),
                    message: "expected text".to_string(),
                })?
                .to_string();
            columns.push(SchemaColumn {
                name,
                data_type: row.get_str("data_type").unwrap_or_default().to_string(),
                udt_name: row.get_str("udt_name").unwrap_or_default().to_string(),
                numeric_precision: row.get_i64("numeric_precision").map(|v| v as i32),
                numeric_scale: row.get_i64("numeric_scale").map(|v| v as i32),
            });
        }
        Ok(columns)
    }
}

#[async_trait]
impl AdvisoryLocks for PostgresDatabase {
    async fn try_lock(&self, key: i64) -> DbResult<bool> {
        let rows = Database::query(
            self,
            Statement::new("SELECT pg_try_advisory_lock($1) AS locked").bind(key),
        )
        .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get_bool("locked"))
            .unwrap_or(false))
    }

    async fn unlock(&self, key: i64) -> DbResult<()> {
        Database::query(
            self,
            Statement::new("SELECT pg_advisory_unlock($1)").bind(key),
        )
        .await
        .map(|_| ())
    }
}
