// OpenDAL-backed object storage
//
// Supports:
// - MinIO / AWS S3 / any S3-compatible storage
// - In-memory backend for tests

use async_trait::async_trait;
use opendal::{
    services::{Memory, S3},
    Operator,
};
use std::time::Duration;

use super::{ObjectStat, ObjectStorage};
use crate::config::StorageConfig;

/// Object storage backend over an OpenDAL operator
#[derive(Clone)]
pub struct OpendalStorage {
    operator: Operator,
}

impl std::fmt::Debug for OpendalStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpendalStorage")
            .field("scheme", &self.operator.info().scheme())
            .field("name", &self.operator.info().name())
            .finish()
    }
}

impl OpendalStorage {
    /// Create S3 storage from configuration
    pub fn s3(config: &StorageConfig) -> opendal::Result<Self> {
        tracing::info!(
            "Initializing object storage: bucket={}, endpoint={}",
            config.bucket,
            config.endpoint
        );

        let builder = S3::default()
            .root(&config.root)
            .bucket(&config.bucket)
            .endpoint(&config.endpoint)
            .region(&config.region)
            .access_key_id(&config.access_key_id)
            .secret_access_key(&config.secret_access_key);

        let operator = Operator::new(builder)?.finish();
        Ok(Self { operator })
    }

    /// In-memory storage, presigning is unsupported
    pub fn memory() -> opendal::Result<Self> {
        let operator = Operator::new(Memory::default())?.finish();
        Ok(Self { operator })
    }

    #[must_use]
    pub const fn from_operator(operator: Operator) -> Self {
        Self { operator }
    }

    #[must_use]
    pub const fn operator(&self) -> &Operator {
        &self.operator
    }
}

#[async_trait]
impl ObjectStorage for OpendalStorage {
    async fn exists(&self, key: &str) -> opendal::Result<bool> {
        self.operator.exists(key).await
    }

    async fn stat(&self, key: &str) -> opendal::Result<ObjectStat> {
        let metadata = self.operator.stat(key).await?;
        Ok(ObjectStat {
            size: metadata.content_length(),
        })
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> opendal::Result<String> {
        let presigned = self.operator.presign_read(key, expires_in).await?;

        tracing::trace!(
            "Generated presigned URL for key '{}': expires in {}s",
            key,
            expires_in.as_secs()
        );

        Ok(presigned.uri().to_string())
    }

    async fn delete(&self, key: &str) -> opendal::Result<()> {
        self.operator.delete(key).await?;
        tracing::debug!("Deleted object: {}", key);
        Ok(())
    }
}
