use crate::domain::audio::error::AllocationError;
use crate::domain::audio::model::{Audio, GenerationStatus, LifetimeStatus, VoiceId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::db::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Storage contract for audio generation records.
///
/// `reserve` is the critical section of the allocation protocol: an
/// implementation must guarantee that no two concurrent reservations for the
/// same page observe each other's uncommitted state. The Postgres
/// implementation takes a row lock on the page; tests use an in-memory store
/// with a per-page async mutex.
#[async_trait]
pub trait AudioStore: Send + Sync {
    async fn find_by_id(&self, audio_id: Uuid) -> AppResult<Option<Audio>>;

    /// Lifetime count: every row ever created for the page, any status.
    async fn count_for_page(&self, page_id: Uuid) -> AppResult<i64>;

    async fn active_voice_exists(&self, page_id: Uuid, voice: VoiceId) -> AppResult<bool>;

    /// Lock the page, recheck voice uniqueness and the lifetime quota, then
    /// create the PENDING row. The lock spans only the recheck and the
    /// insert, never a network call.
    async fn reserve(
        &self,
        page_id: Uuid,
        voice: VoiceId,
        actor: Uuid,
        max_per_page: u32,
    ) -> Result<Audio, AllocationError>;

    async fn set_status(&self, audio_id: Uuid, status: GenerationStatus) -> AppResult<()>;

    async fn complete(&self, audio_id: Uuid, s3_key: &str) -> AppResult<()>;

    async fn fail(&self, audio_id: Uuid, error_message: &str) -> AppResult<()>;

    /// FAILED -> PENDING, conditionally; returns false when the row was not
    /// in FAILED status (the reset fires at most once per retry action).
    async fn reset_failed(&self, audio_id: Uuid) -> AppResult<bool>;

    async fn soft_delete(&self, audio_id: Uuid) -> AppResult<()>;

    async fn touch_played(&self, audio_id: Uuid) -> AppResult<()>;

    async fn list_for_page(&self, page_id: Uuid) -> AppResult<Vec<Audio>>;

    /// ACTIVE completed rows whose reference time (last played, else created)
    /// is older than the cutoff.
    async fn list_expirable(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Audio>>;

    async fn mark_expired(&self, audio_id: Uuid) -> AppResult<()>;
}

#[derive(Debug, FromRow)]
struct AudioRow {
    id: Uuid,
    page_id: Uuid,
    voice: String,
    generated_by: Uuid,
    s3_key: String,
    status: String,
    lifetime_status: String,
    created_at: DateTime<Utc>,
    last_played_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

impl TryFrom<AudioRow> for Audio {
    type Error = AppError;

    fn try_from(row: AudioRow) -> Result<Self, Self::Error> {
        Ok(Audio {
            id: row.id,
            page_id: row.page_id,
            voice: VoiceId::from_str(&row.voice).map_err(AppError::Internal)?,
            generated_by: row.generated_by,
            s3_key: row.s3_key,
            status: GenerationStatus::from_str(&row.status).map_err(AppError::Internal)?,
            lifetime_status: LifetimeStatus::from_str(&row.lifetime_status)
                .map_err(AppError::Internal)?,
            created_at: row.created_at,
            last_played_at: row.last_played_at,
            deleted_at: row.deleted_at,
            error_message: row.error_message,
        })
    }
}

const AUDIO_COLUMNS: &str = "id, page_id, voice, generated_by, s3_key, status, \
     lifetime_status, created_at, last_played_at, deleted_at, error_message";

pub struct PgAudioRepository {
    pool: Arc<DbPool>,
}

impl PgAudioRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AudioStore for PgAudioRepository {
    async fn find_by_id(&self, audio_id: Uuid) -> AppResult<Option<Audio>> {
        let row = sqlx::query_as::<_, AudioRow>(&format!(
            "SELECT {AUDIO_COLUMNS} FROM audios WHERE id = $1"
        ))
        .bind(audio_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(Audio::try_from).transpose()
    }

    async fn count_for_page(&self, page_id: Uuid) -> AppResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM audios WHERE page_id = $1")
                .bind(page_id)
                .fetch_one(self.pool.as_ref())
                .await?;
        Ok(count)
    }

    async fn active_voice_exists(&self, page_id: Uuid, voice: VoiceId) -> AppResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM audios \
             WHERE page_id = $1 AND voice = $2 AND lifetime_status = 'ACTIVE')",
        )
        .bind(page_id)
        .bind(voice.as_str())
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(exists)
    }

    async fn reserve(
        &self,
        page_id: Uuid,
        voice: VoiceId,
        actor: Uuid,
        max_per_page: u32,
    ) -> Result<Audio, AllocationError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AllocationError::Dependency(anyhow::Error::new(e)))?;

        // Row lock on the page serializes concurrent reservations for it.
        // Reservations for different pages never contend.
        let locked: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM pages WHERE id = $1 FOR UPDATE")
                .bind(page_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| AllocationError::Dependency(anyhow::Error::new(e)))?;
        if locked.is_none() {
            return Err(AllocationError::NotFound);
        }

        // Recheck under the lock. The optimistic checks upstream are an
        // optimization; these are the correctness guarantee.
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM audios WHERE page_id = $1")
                .bind(page_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| AllocationError::Dependency(anyhow::Error::new(e)))?;
        if total >= max_per_page as i64 {
            return Err(AllocationError::QuotaExceeded(max_per_page));
        }

        let (duplicate,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM audios \
             WHERE page_id = $1 AND voice = $2 AND lifetime_status = 'ACTIVE')",
        )
        .bind(page_id)
        .bind(voice.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AllocationError::Dependency(anyhow::Error::new(e)))?;
        if duplicate {
            return Err(AllocationError::DuplicateVoice(voice));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO audios \
             (id, page_id, voice, generated_by, s3_key, status, lifetime_status, created_at) \
             VALUES ($1, $2, $3, $4, '', 'PENDING', 'ACTIVE', $5)",
        )
        .bind(id)
        .bind(page_id)
        .bind(voice.as_str())
        .bind(actor)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            // The partial unique index backs the locked recheck up; hitting it
            // still reads as a duplicate voice, not an internal error.
            sqlx::Error::Database(db)
                if db.constraint() == Some("unique_active_voice_per_page") =>
            {
                AllocationError::DuplicateVoice(voice)
            }
            _ => AllocationError::Dependency(anyhow::Error::new(e)),
        })?;

        tx.commit()
            .await
            .map_err(|e| AllocationError::Dependency(anyhow::Error::new(e)))?;

        Ok(Audio {
            id,
            page_id,
            voice,
            generated_by: actor,
            s3_key: String::new(),
            status: GenerationStatus::Pending,
            lifetime_status: LifetimeStatus::Active,
            created_at: now,
            last_played_at: None,
            deleted_at: None,
            error_message: None,
        })
    }

    async fn set_status(&self, audio_id: Uuid, status: GenerationStatus) -> AppResult<()> {
        sqlx::query("UPDATE audios SET status = $2 WHERE id = $1")
            .bind(audio_id)
            .bind(status.as_str())
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn complete(&self, audio_id: Uuid, s3_key: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE audios SET status = 'COMPLETED', s3_key = $2, error_message = NULL \
             WHERE id = $1",
        )
        .bind(audio_id)
        .bind(s3_key)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn fail(&self, audio_id: Uuid, error_message: &str) -> AppResult<()> {
        sqlx::query("UPDATE audios SET status = 'FAILED', error_message = $2 WHERE id = $1")
            .bind(audio_id)
            .bind(error_message)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn reset_failed(&self, audio_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE audios SET status = 'PENDING', error_message = NULL \
             WHERE id = $1 AND status = 'FAILED'",
        )
        .bind(audio_id)
        .execute(self.pool.as_ref())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete(&self, audio_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE audios SET lifetime_status = 'DELETED', deleted_at = $2 WHERE id = $1",
        )
        .bind(audio_id)
        .bind(Utc::now())
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn touch_played(&self, audio_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE audios SET last_played_at = $2 WHERE id = $1")
            .bind(audio_id)
            .bind(Utc::now())
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn list_for_page(&self, page_id: Uuid) -> AppResult<Vec<Audio>> {
        let rows = sqlx::query_as::<_, AudioRow>(&format!(
            "SELECT {AUDIO_COLUMNS} FROM audios WHERE page_id = $1 ORDER BY created_at DESC"
        ))
        .bind(page_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(Audio::try_from).collect()
    }

    async fn list_expirable(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Audio>> {
        let rows = sqlx::query_as::<_, AudioRow>(&format!(
            "SELECT {AUDIO_COLUMNS} FROM audios \
             WHERE lifetime_status = 'ACTIVE' AND status = 'COMPLETED' \
             AND COALESCE(last_played_at, created_at) < $1"
        ))
        .bind(cutoff)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(Audio::try_from).collect()
    }

    async fn mark_expired(&self, audio_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE audios SET lifetime_status = 'EXPIRED' WHERE id = $1")
            .bind(audio_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}
