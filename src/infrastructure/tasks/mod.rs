//! Detached background work: per-audio generation tasks and the periodic
//! expiry sweep.

use crate::domain::audio::model::Audio;
use crate::domain::audio::orchestrator::GenerationOrchestrator;
use crate::domain::audio::signing::SignedUrlIssuer;
use crate::infrastructure::repositories::{AudioStore, ObjectStore, SettingsStore};
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Kick off generation for a freshly reserved audio row. The HTTP handler
/// returns immediately; the task owns the row until it reaches a terminal
/// state.
pub fn spawn_generation(orchestrator: Arc<GenerationOrchestrator>, audio: Audio) {
    tokio::spawn(async move {
        orchestrator.run(audio).await;
    });
}

/// Periodically expire audios whose retention window has elapsed.
pub fn spawn_expiry_sweep(
    store: Arc<dyn AudioStore>,
    settings: Arc<dyn SettingsStore>,
    objects: Arc<dyn ObjectStore>,
    issuer: Arc<SignedUrlIssuer>,
    interval: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(err) = sweep_expired(&store, &settings, &objects, &issuer).await {
                tracing::error!(error = %err, "expiry sweep failed");
            }
        }
    });
}

/// One sweep pass: expire every ACTIVE completed audio not played (or, never
/// played, not created) within the retention window. Returns the number of
/// audios expired.
pub async fn sweep_expired(
    store: &Arc<dyn AudioStore>,
    settings: &Arc<dyn SettingsStore>,
    objects: &Arc<dyn ObjectStore>,
    issuer: &Arc<SignedUrlIssuer>,
) -> crate::error::AppResult<usize> {
    let settings = settings.load().await?;
    let cutoff = Utc::now() - ChronoDuration::days(settings.audio_retention_months as i64 * 30);

    let expirable = store.list_expirable(cutoff).await?;
    if expirable.is_empty() {
        return Ok(0);
    }

    let mut expired = 0usize;
    for audio in expirable {
        store.mark_expired(audio.id).await?;
        issuer.invalidate(audio.id).await;
        if settings.auto_delete_expired && !audio.s3_key.is_empty() {
            if let Err(err) = objects.delete(&audio.s3_key).await {
                tracing::warn!(
                    audio_id = %audio.id,
                    key = %audio.s3_key,
                    error = ?err,
                    "failed to delete expired audio object"
                );
            }
        }
        expired += 1;
        tracing::info!(
            audio_id = %audio.id,
            page_id = %audio.page_id,
            "audio expired by retention sweep"
        );
    }
    Ok(expired)
}
