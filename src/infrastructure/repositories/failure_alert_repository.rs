use crate::infrastructure::db::DbPool;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Structured record of a terminal generation failure, persisted for the
/// admin alerting dashboard.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub task_name: &'static str,
    pub audio_id: Uuid,
    pub page_id: Uuid,
    pub actor_id: Uuid,
    /// Already sanitized; raw provider text never reaches this record.
    pub error_message: String,
    pub retry_count: u32,
}

/// Alerting sink. Delivery failure must never affect the audio row's own
/// status, so `record` swallows and logs its errors.
#[async_trait]
pub trait FailureAlerts: Send + Sync {
    async fn record(&self, record: FailureRecord);
}

pub struct PgFailureAlertRepository {
    pool: Arc<DbPool>,
}

impl PgFailureAlertRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    async fn insert(&self, record: &FailureRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO task_failure_alerts \
             (id, task_name, audio_id, page_id, user_id, error_message, retry_count, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::new_v4())
        .bind(record.task_name)
        .bind(record.audio_id)
        .bind(record.page_id)
        .bind(record.actor_id)
        .bind(&record.error_message)
        .bind(record.retry_count as i32)
        .bind(Utc::now())
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl FailureAlerts for PgFailureAlertRepository {
    async fn record(&self, record: FailureRecord) {
        if let Err(err) = self.insert(&record).await {
            tracing::error!(
                error = %err,
                task_name = record.task_name,
                audio_id = %record.audio_id,
                "failed to persist task failure alert"
            );
        }
    }
}
