// Object storage gateway
//
// Recordings are written by the conferencing service's egress workers
// straight into the bucket; this side only stats, signs and deletes.

pub mod object;

use async_trait::async_trait;
use std::time::Duration;

pub use object::OpendalStorage;

/// Object metadata the lifecycle cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
}

/// Storage trait keyed by object name
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Check if an object exists
    async fn exists(&self, key: &str) -> opendal::Result<bool>;

    /// Stat an object. Missing objects are an `ErrorKind::NotFound` error.
    async fn stat(&self, key: &str) -> opendal::Result<ObjectStat>;

    /// Time-limited GET URL for one object
    async fn presigned_url(&self, key: &str, expires_in: Duration) -> opendal::Result<String>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> opendal::Result<()>;
}
