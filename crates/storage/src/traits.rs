//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Object store abstraction for attachment blobs.
///
/// Keys are produced by the catalog engine and are always plain
/// slash-separated paths; backends must not interpret them further.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Store an object. Overwrites any existing object at the same key.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()>;

    /// Fetch an object's content.
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Check if an object exists.
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    /// Static identifier for the backend type, used in logs.
    fn backend_name(&self) -> &'static str;

    /// Verify backend connectivity. The default is a no-op, suitable for
    /// backends without a remote endpoint.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
