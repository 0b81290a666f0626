//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub purge: PurgeConfig,
    /// Token cache TTL in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

/// Relational store connection configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL. Takes precedence over individual parameters.
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Server-side statement timeout; unset means no timeout.
    pub statement_timeout_ms: Option<u64>,
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_none() && (self.host.is_none() || self.database.is_none()) {
            return Err("database config requires either 'url' or 'host' + 'database'".to_string());
        }
        Ok(())
    }
}

/// Object storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// S3-compatible storage (MinIO, AWS S3).
    S3 {
        /// Default bucket for attachment objects.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Access key id. Falls back to the ambient AWS credential chain if unset.
        access_key_id: Option<String>,
        /// Secret access key. Falls back to the ambient AWS credential chain if unset.
        secret_access_key: Option<String>,
        /// Path-style URLs, required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
    /// In-memory storage for tests and local development.
    Memory { bucket: String },
}

impl StorageConfig {
    /// Default bucket objects are written to.
    pub fn bucket(&self) -> &str {
        match self {
            Self::S3 { bucket, .. } => bucket,
            Self::Memory { bucket } => bucket,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.is_empty() {
                    return Err("s3 config requires a bucket".to_string());
                }
                if access_key_id.is_some() != secret_access_key.is_some() {
                    return Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    );
                }
                Ok(())
            }
            Self::Memory { bucket } => {
                if bucket.is_empty() {
                    return Err("memory config requires a bucket".to_string());
                }
                Ok(())
            }
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Memory {
            bucket: "lathe".to_string(),
        }
    }
}

/// One logical table exposed by the catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    pub id: i32,
    pub name: String,
    /// Side table holding image slots for this table's rows.
    pub images_table: String,
    /// Foreign-key column in the side table.
    pub fk_column: String,
}

/// Virtual child table: maps onto a parent while hiding some columns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChildTableConfig {
    pub name: String,
    pub parent: String,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Catalog table layout configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Database schema the catalog tables live in.
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_tables")]
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub children: Vec<ChildTableConfig>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            tables: default_tables(),
            children: Vec::new(),
        }
    }
}

/// Soft-delete retention purge configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurgeConfig {
    /// Logical table the purger sweeps.
    #[serde(default = "default_purge_table")]
    pub table: String,
    /// Rows soft-deleted at least this many days ago are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: i32,
    /// Maximum rows hard-deleted per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: i32,
    /// Serialize purge passes across the deployment with an advisory lock.
    #[serde(default = "default_use_advisory_lock")]
    pub use_advisory_lock: bool,
    /// Cluster-wide advisory lock key.
    #[serde(default = "default_advisory_lock_key")]
    pub advisory_lock_key: i64,
    /// Minutes between scheduled passes (0 disables scheduling).
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            table: default_purge_table(),
            retention_days: default_retention_days(),
            batch_size: default_batch_size(),
            use_advisory_lock: default_use_advisory_lock(),
            advisory_lock_key: default_advisory_lock_key(),
            interval_minutes: default_interval_minutes(),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_tables() -> Vec<TableConfig> {
    vec![TableConfig {
        id: 1,
        name: "milling_tool_catalog".to_string(),
        images_table: "milling_tool_images".to_string(),
        fk_column: "tool_id".to_string(),
    }]
}

fn default_purge_table() -> String {
    "milling_tool_catalog".to_string()
}

fn default_retention_days() -> i32 {
    30
}

fn default_batch_size() -> i32 {
    100
}

fn default_use_advisory_lock() -> bool {
    true
}

fn default_advisory_lock_key() -> i64 {
    739001
}

fn default_interval_minutes() -> u32 {
    60
}

fn default_token_ttl_secs() -> u64 {
    3600
}

fn default_max_connections() -> u32 {
    10
}
