use super::error::SigningError;
use super::model::Audio;
use crate::infrastructure::repositories::ObjectStore;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// One way of producing a time-limited playback URL for a stored object.
#[async_trait::async_trait]
pub trait UrlSigner: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    async fn sign(&self, key: &str, ttl: Duration) -> Result<String, SigningError>;
}

/// Fallback signer backed by the object store's own presigning (S3 presigned
/// GET). Always available when the store is.
pub struct ObjectStoreSigner {
    objects: Arc<dyn ObjectStore>,
}

impl ObjectStoreSigner {
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        Self { objects }
    }
}

#[async_trait::async_trait]
impl UrlSigner for ObjectStoreSigner {
    fn name(&self) -> &'static str {
        "s3-presign"
    }

    async fn sign(&self, key: &str, ttl: Duration) -> Result<String, SigningError> {
        self.objects.presign(key, ttl).await
    }
}

/// Issues playback URLs by walking an ordered list of signing strategies,
/// first success wins. URLs are cached per audio for slightly less than their
/// lifetime so a cached URL is never handed out already expired.
pub struct SignedUrlIssuer {
    signers: Vec<Arc<dyn UrlSigner>>,
    ttl: Duration,
    cache: Option<Cache<Uuid, String>>,
}

/// Margin subtracted from the URL ttl for the cache entry lifetime.
const CACHE_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Below this ttl the margin would dominate; caching is skipped entirely.
const MIN_CACHEABLE_TTL: Duration = Duration::from_secs(120);

impl SignedUrlIssuer {
    pub fn new(signers: Vec<Arc<dyn UrlSigner>>, ttl: Duration, cache_enabled: bool) -> Self {
        let cache = (cache_enabled && ttl > MIN_CACHEABLE_TTL).then(|| {
            Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl - CACHE_EXPIRY_MARGIN)
                .build()
        });
        Self { signers, ttl, cache }
    }

    /// Produce a playback URL for a completed audio, or `None` when no
    /// strategy can sign (the caller turns that into a service error).
    pub async fn issue(&self, audio: &Audio) -> Option<String> {
        if audio.s3_key.is_empty() {
            tracing::warn!(audio_id = %audio.id, "audio has no stored object key");
            return None;
        }

        if let Some(cache) = &self.cache {
            if let Some(url) = cache.get(&audio.id).await {
                tracing::debug!(audio_id = %audio.id, "signed url cache hit");
                return Some(url);
            }
        }

        for signer in &self.signers {
            match signer.sign(&audio.s3_key, self.ttl).await {
                Ok(url) => {
                    tracing::debug!(
                        audio_id = %audio.id,
                        strategy = signer.name(),
                        "signed playback url issued"
                    );
                    if let Some(cache) = &self.cache {
                        cache.insert(audio.id, url.clone()).await;
                    }
                    return Some(url);
                }
                Err(err) => {
                    tracing::warn!(
                        audio_id = %audio.id,
                        strategy = signer.name(),
                        error = %err,
                        "signing strategy failed, trying next"
                    );
                }
            }
        }

        tracing::error!(audio_id = %audio.id, "all url signing strategies failed");
        None
    }

    /// Drop any cached URL for the audio, used on delete.
    pub async fn invalidate(&self, audio_id: Uuid) {
        if let Some(cache) = &self.cache {
            cache.invalidate(&audio_id).await;
        }
    }
}
