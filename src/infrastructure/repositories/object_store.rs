use crate::domain::audio::error::{GenerationError, SigningError};
use async_trait::async_trait;
use std::time::Duration;

/// Content store boundary for generated audio blobs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Idempotent overwrite.
    async fn put(&self, bytes: &[u8], key: &str) -> Result<(), GenerationError>;

    /// Idempotent; deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), GenerationError>;

    /// Time-limited direct-access URL for the object.
    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, SigningError>;
}
