use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Capability checks provided by the document sharing subsystem. The
/// permission model itself (ownership, grant levels) lives there; the audio
/// pipeline only consults it.
#[async_trait]
pub trait SharingPermissions: Send + Sync {
    /// Whether a non-owner may generate audio for the document.
    async fn can_generate_audio(&self, actor: Uuid, document_id: Uuid) -> AppResult<bool>;

    /// Whether a non-owner may see the document's audios at all.
    async fn can_view(&self, actor: Uuid, document_id: Uuid) -> AppResult<bool>;
}

pub struct PgSharingRepository {
    pool: Arc<DbPool>,
}

impl PgSharingRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SharingPermissions for PgSharingRepository {
    async fn can_generate_audio(&self, actor: Uuid, document_id: Uuid) -> AppResult<bool> {
        let (granted,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM document_shares \
             WHERE document_id = $1 AND shared_with = $2 \
             AND permission IN ('COLLABORATOR', 'CAN_SHARE'))",
        )
        .bind(document_id)
        .bind(actor)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(granted)
    }

    async fn can_view(&self, actor: Uuid, document_id: Uuid) -> AppResult<bool> {
        let (granted,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM document_shares \
             WHERE document_id = $1 AND shared_with = $2)",
        )
        .bind(document_id)
        .bind(actor)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(granted)
    }
}
