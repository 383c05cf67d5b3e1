use crate::domain::audio::model::SiteSettings;
use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use async_trait::async_trait;
use sqlx::FromRow;
use std::sync::Arc;

/// Provider of the global quota configuration. Loaded fresh before every
/// reservation so administrative changes take effect immediately.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> AppResult<SiteSettings>;
}

#[derive(Debug, FromRow)]
struct SettingsRow {
    audio_generation_enabled: bool,
    max_audios_per_page: i32,
    audio_retention_months: i32,
    auto_delete_expired: bool,
}

/// Singleton row; the table's CHECK (id = 1) constraint rejects a second one.
pub struct PgSettingsRepository {
    pool: Arc<DbPool>,
}

impl PgSettingsRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Create the settings row with defaults when it does not exist yet.
    /// Called once at startup.
    pub async fn ensure_exists(&self) -> AppResult<()> {
        let defaults = SiteSettings::default();
        sqlx::query(
            "INSERT INTO site_settings \
             (id, audio_generation_enabled, max_audios_per_page, audio_retention_months, \
              auto_delete_expired) \
             VALUES (1, $1, $2, $3, $4) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(defaults.audio_generation_enabled)
        .bind(defaults.max_audios_per_page as i32)
        .bind(defaults.audio_retention_months as i32)
        .bind(defaults.auto_delete_expired)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for PgSettingsRepository {
    async fn load(&self) -> AppResult<SiteSettings> {
        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT audio_generation_enabled, max_audios_per_page, \
                    audio_retention_months, auto_delete_expired \
             FROM site_settings WHERE id = 1",
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(match row {
            Some(r) => SiteSettings {
                audio_generation_enabled: r.audio_generation_enabled,
                max_audios_per_page: r.max_audios_per_page.max(0) as u32,
                audio_retention_months: r.audio_retention_months.max(0) as u32,
                auto_delete_expired: r.auto_delete_expired,
            },
            None => SiteSettings::default(),
        })
    }
}
