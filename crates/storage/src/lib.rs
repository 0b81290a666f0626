//! Object storage abstraction for attachment blobs.
//!
//! Provides the [`ObjectStore`] trait plus two backends: an S3-compatible
//! client (AWS S3, MinIO) and an in-memory store for tests and local
//! development. Backends are selected from [`StorageConfig`] via
//! [`from_config`].

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{MemoryBackend, S3Backend};
pub use error::{StorageError, StorageResult};
pub use traits::ObjectStore;

use lathe_core::config::StorageConfig;
use std::sync::Arc;
use tracing::info;

/// Build an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            info!(
                backend = "s3",
                bucket = %bucket,
                endpoint = endpoint.as_deref().unwrap_or("default"),
                "initializing object store"
            );
            let backend = S3Backend::new(
                endpoint.clone(),
                region.clone(),
                access_key_id.clone(),
                secret_access_key.clone(),
                *force_path_style,
            )
            .await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::Memory { bucket } => {
            info!(backend = "memory", bucket = %bucket, "initializing object store");
            Ok(Arc::new(MemoryBackend::new()))
        }
    }
}
