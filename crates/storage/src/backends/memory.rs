//! In-memory object store for tests and local development.

use crate::error::{StorageError, StorageResult};
use crate::traits::ObjectStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::RwLock;

#[derive(Clone, Debug)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
}

/// Object store keeping everything in process memory.
///
/// Plays the role for storage that an embedded database plays for metadata:
/// zero-dependency deployments and deterministic tests.
#[derive(Default)]
pub struct MemoryBackend {
    objects: RwLock<BTreeMap<(String, String), StoredObject>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys currently stored in a bucket, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .read()
            .expect("memory store lock poisoned")
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Number of stored objects across all buckets.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .expect("memory store lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored content type of an object, if present.
    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.objects
            .read()
            .expect("memory store lock poisoned")
            .get(&(bucket.to_string(), key.to_string()))
            .and_then(|obj| obj.content_type.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        let mut objects = self.objects.write().expect("memory store lock poisoned");
        objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let objects = self.objects.read().expect("memory store lock poisoned");
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|obj| obj.data.clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let mut objects = self.objects.write().expect("memory store lock poisoned");
        objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        let objects = self.objects.read().expect("memory store lock poisoned");
        Ok(objects.contains_key(&(bucket.to_string(), key.to_string())))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
