use super::aws_error::classify_aws_code;
use super::object_store::ObjectStore;
use crate::domain::audio::error::{GenerationError, SigningError};
use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::sync::Arc;
use std::time::Duration;

/// S3 implementation of the object store boundary.
pub struct S3ObjectStore {
    s3_client: Arc<S3Client>,
    bucket: String,
    cache_seconds: u64,
    call_timeout: Duration,
}

impl S3ObjectStore {
    pub fn new(
        s3_client: Arc<S3Client>,
        bucket: String,
        cache_seconds: u64,
        call_timeout: Duration,
    ) -> Self {
        Self {
            s3_client,
            bucket,
            cache_seconds,
            call_timeout,
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, bytes: &[u8], key: &str) -> Result<(), GenerationError> {
        let request = self
            .s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type("audio/mpeg")
            .cache_control(format!("public, max-age={}", self.cache_seconds))
            .send();

        tokio::time::timeout(self.call_timeout, request)
            .await
            .map_err(|_| {
                tracing::warn!(key, "S3 put_object timed out");
                GenerationError::Timeout
            })?
            .map_err(|err| classify_s3_error(&err, key))?;

        tracing::info!(key, size = bytes.len(), "audio uploaded to S3");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), GenerationError> {
        // S3 delete_object succeeds for missing keys, which matches the
        // idempotent contract.
        let request = self
            .s3_client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send();

        tokio::time::timeout(self.call_timeout, request)
            .await
            .map_err(|_| {
                tracing::warn!(key, "S3 delete_object timed out");
                GenerationError::Timeout
            })?
            .map_err(|err| classify_s3_error(&err, key))?;

        tracing::info!(key, "audio deleted from S3");
        Ok(())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, SigningError> {
        let config = PresigningConfig::expires_in(ttl)
            .map_err(|err| SigningError::Presign(err.to_string()))?;

        let presigned = self
            .s3_client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, key, "S3 presign failed");
                SigningError::Presign("presigned request generation failed".to_string())
            })?;

        Ok(presigned.uri().to_string())
    }
}

fn classify_s3_error<E>(err: &SdkError<E>, key: &str) -> GenerationError
where
    E: aws_sdk_s3::error::ProvideErrorMetadata + std::fmt::Debug,
{
    use aws_sdk_s3::error::ProvideErrorMetadata;

    let classified = match err {
        SdkError::TimeoutError(_) => GenerationError::Timeout,
        SdkError::DispatchFailure(_) => GenerationError::Connection,
        SdkError::ServiceError(_) => match classify_aws_code(err.meta().code().unwrap_or_default())
        {
            // A generic S3 service error means the blob was not saved; that
            // is a storage failure, not an unknown provider condition.
            GenerationError::Unknown => GenerationError::Storage,
            other => other,
        },
        _ => GenerationError::Storage,
    };

    tracing::error!(error = ?err, key, classified = ?classified, "S3 request failed");
    classified
}
