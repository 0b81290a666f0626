//! S3-compatible storage backend using the AWS SDK.

use crate::error::{StorageError, StorageResult};
use crate::traits::ObjectStore;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::instrument;

fn map_sdk_error<E>(err: aws_sdk_s3::error::SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::S3(Box::new(err))
}

/// S3-compatible object store (AWS S3, MinIO).
pub struct S3Backend {
    client: Client,
    /// Stored endpoint for logging/identity (normalized).
    endpoint: String,
    region: String,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// # Arguments
    /// * `force_path_style` - Use path-style URLs (`endpoint/bucket/key`)
    ///   instead of virtual-hosted style. Required for MinIO and some
    ///   S3-compatible services.
    pub async fn new(
        endpoint: Option<String>,
        region: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(StorageError::Config(
                "s3 config requires both access_key_id and secret_access_key when either is set"
                    .to_string(),
            ));
        }

        let resolved_region = region.unwrap_or_else(|| "us-east-1".to_string());
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new(resolved_region.clone()));

        // Explicit credentials from config, or the ambient AWS chain.
        if let (Some(key_id), Some(secret)) = (access_key_id, secret_access_key) {
            let credentials = aws_credential_types::Credentials::new(
                key_id,
                secret,
                None,
                None,
                "lathe-config",
            );
            builder = builder.credentials_provider(credentials);
        } else {
            let base = aws_config::defaults(BehaviorVersion::latest())
                .region(aws_config::Region::new(resolved_region.clone()))
                .load()
                .await;
            if let Some(provider) = base.credentials_provider() {
                builder = builder.credentials_provider(provider);
            }
        }

        // Handle bare host:port endpoints (e.g. "minio:9000") by prepending http://
        let normalized_endpoint = endpoint.map(|endpoint_url| {
            let lower = endpoint_url.to_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") {
                endpoint_url
            } else {
                format!("http://{}", endpoint_url)
            }
        });

        if let Some(endpoint_url) = &normalized_endpoint {
            builder = builder.endpoint_url(endpoint_url);
        }

        if force_path_style {
            builder = builder.force_path_style(true);
        }

        let client = Client::from_conf(builder.build());
        let endpoint = normalized_endpoint
            .unwrap_or_else(|| format!("s3.{}.amazonaws.com", resolved_region));

        Ok(Self {
            client,
            endpoint,
            region: resolved_region,
        })
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(data.into());
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }
        request.send().await.map_err(map_sdk_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if matches!(
                    &err,
                    aws_sdk_s3::error::SdkError::ServiceError(service_err)
                        if service_err.err().is_no_such_key()
                ) {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    map_sdk_error(err)
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?
            .into_bytes();
        Ok(bytes)
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        // S3 delete_object succeeds on missing keys, matching the trait contract.
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err {
                    if service_err.raw().status().as_u16() == 404 {
                        return Ok(false);
                    }
                }
                Err(map_sdk_error(err))
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.client
            .list_buckets()
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(())
    }
}
