use super::chunker::{chunk_text, POLLY_MAX_CHARS};
use super::error::GenerationError;
use super::merger::merge_audio_chunks;
use super::model::{Audio, GenerationStatus, Page, VoiceId};
use crate::infrastructure::repositories::{
    AudioStore, FailureAlerts, FailureRecord, ObjectStore, PageStore, SpeechSynthesizer,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Exponential backoff schedule for retryable synthesis failures.
///
/// `max_attempts` bounds the total number of generation attempts; the first
/// retry waits `base_delay`, and each further retry doubles the wait.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (1-based; attempt 1 has no delay).
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.base_delay * 2u32.saturating_pow(attempt - 2)
    }
}

/// Object key for a finished audio, scoped by document and page so one
/// document's audios share a prefix.
pub fn audio_object_key(
    document_id: Uuid,
    page_number: i32,
    voice: VoiceId,
    now: DateTime<Utc>,
) -> String {
    format!(
        "audios/document_{}/page_{}/voice_{}_{}.mp3",
        document_id,
        page_number,
        voice.as_str(),
        now.format("%Y%m%d_%H%M%S")
    )
}

/// Drives one reserved audio row through synthesis to a terminal state.
///
/// The pipeline is chunk -> synthesize each chunk in order -> merge -> upload
/// -> mark COMPLETED. Retryable failures restart the whole pipeline after a
/// backoff; non-retryable failures and exhausted retries mark the row FAILED
/// with a user-safe message and record a failure alert.
pub struct GenerationOrchestrator {
    store: Arc<dyn AudioStore>,
    pages: Arc<dyn PageStore>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    objects: Arc<dyn ObjectStore>,
    alerts: Arc<dyn FailureAlerts>,
    retry_policy: RetryPolicy,
}

impl GenerationOrchestrator {
    pub fn new(
        store: Arc<dyn AudioStore>,
        pages: Arc<dyn PageStore>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        objects: Arc<dyn ObjectStore>,
        alerts: Arc<dyn FailureAlerts>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            pages,
            synthesizer,
            objects,
            alerts,
            retry_policy,
        }
    }

    /// Run the full generation for an already-reserved audio row. Never
    /// returns an error to the caller: every failure path ends in a FAILED
    /// row plus an alert record, since the caller is a detached task.
    pub async fn run(&self, audio: Audio) {
        let audio_id = audio.id;
        let page_id = audio.page_id;
        let actor = audio.generated_by;
        if let Err(err) = self.run_inner(audio).await {
            tracing::error!(
                %audio_id,
                %page_id,
                error = ?err,
                "audio generation failed permanently"
            );
            if let Err(db_err) = self.store.fail(audio_id, &err.to_string()).await {
                tracing::error!(%audio_id, error = %db_err, "failed to mark audio FAILED");
            }
            self.alerts
                .record(FailureRecord {
                    task_name: "generate_audio",
                    audio_id,
                    page_id,
                    actor_id: actor,
                    error_message: err.to_string(),
                    retry_count: self.retry_policy.max_attempts,
                })
                .await;
        }
    }

    async fn run_inner(&self, audio: Audio) -> Result<(), GenerationError> {
        let page = self
            .pages
            .find_by_id(audio.page_id)
            .await
            .map_err(|err| {
                tracing::error!(audio_id = %audio.id, error = %err, "page lookup failed");
                GenerationError::Storage
            })?
            .ok_or(GenerationError::Storage)?;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            if attempt > 1 {
                let delay = self.retry_policy.delay_before_attempt(attempt);
                tracing::info!(
                    audio_id = %audio.id,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "retrying audio generation after backoff"
                );
                tokio::time::sleep(delay).await;
            }
            if let Err(err) = self
                .store
                .set_status(audio.id, GenerationStatus::Generating)
                .await
            {
                tracing::error!(audio_id = %audio.id, error = %err, "status update failed");
                return Err(GenerationError::Storage);
            }

            match self.generate(&audio, &page).await {
                Ok(s3_key) => {
                    self.store.complete(audio.id, &s3_key).await.map_err(|err| {
                        tracing::error!(audio_id = %audio.id, error = %err, "completion update failed");
                        GenerationError::Storage
                    })?;
                    tracing::info!(
                        audio_id = %audio.id,
                        page_id = %page.id,
                        voice = audio.voice.as_str(),
                        attempt,
                        s3_key,
                        "audio generation completed"
                    );
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt < self.retry_policy.max_attempts => {
                    tracing::warn!(
                        audio_id = %audio.id,
                        attempt,
                        error = ?err,
                        "retryable generation failure"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn generate(&self, audio: &Audio, page: &Page) -> Result<String, GenerationError> {
        let text = page.markdown_content.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyText);
        }

        let chunks = chunk_text(text, POLLY_MAX_CHARS);
        tracing::debug!(
            audio_id = %audio.id,
            chunk_count = chunks.len(),
            text_len = text.chars().count(),
            "text chunked for synthesis"
        );

        let mut parts = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let bytes = self.synthesizer.synthesize(chunk, audio.voice).await?;
            parts.push(bytes);
        }

        let merged = if parts.len() == 1 {
            parts.swap_remove(0)
        } else {
            merge_audio_chunks(&parts)?
        };

        let key = audio_object_key(page.document_id, page.page_number, audio.voice, Utc::now());
        self.objects
            .put(&merged, &key)
            .await
            .map_err(|err| {
                tracing::error!(audio_id = %audio.id, key, error = ?err, "object upload failed");
                err
            })?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audio::model::LifetimeStatus;
    use crate::domain::audio::testing::{
        page, MemoryAudioStore, MemoryObjectStore, MockSynthesizer, RecordingAlerts,
        StaticPageStore,
    };
    use pretty_assertions::assert_eq;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    fn pending_audio(page: &Page, voice: VoiceId) -> Audio {
        Audio {
            id: Uuid::new_v4(),
            page_id: page.id,
            voice,
            generated_by: page.owner_id,
            s3_key: String::new(),
            status: GenerationStatus::Pending,
            lifetime_status: LifetimeStatus::Active,
            created_at: Utc::now(),
            last_played_at: None,
            deleted_at: None,
            error_message: None,
        }
    }

    struct Harness {
        store: Arc<MemoryAudioStore>,
        objects: Arc<MemoryObjectStore>,
        alerts: Arc<RecordingAlerts>,
        synthesizer: Arc<MockSynthesizer>,
        orchestrator: GenerationOrchestrator,
    }

    impl Harness {
        fn synthesize_calls(&self) -> usize {
            self.synthesizer.call_count()
        }
    }

    fn harness(page: Page, synthesizer: MockSynthesizer, policy: RetryPolicy) -> Harness {
        let store = Arc::new(MemoryAudioStore::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let alerts = Arc::new(RecordingAlerts::new());
        let synthesizer = Arc::new(synthesizer);
        let orchestrator = GenerationOrchestrator::new(
            store.clone(),
            Arc::new(StaticPageStore::with(vec![page])),
            synthesizer.clone(),
            objects.clone(),
            alerts.clone(),
            policy,
        );
        Harness {
            store,
            objects,
            alerts,
            synthesizer,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn test_short_text_single_chunk_completes() {
        let owner = Uuid::new_v4();
        let page = page(owner, "A short page. It fits in one chunk.");
        let audio = pending_audio(&page, VoiceId::Joanna);
        let h = harness(page, MockSynthesizer::succeeding(), fast_policy(3));
        h.store.insert(audio.clone()).await;

        h.orchestrator.run(audio.clone()).await;

        let stored = h.store.find_by_id(audio.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GenerationStatus::Completed);
        assert!(stored.s3_key.starts_with("audios/document_"));
        assert!(stored.s3_key.ends_with(".mp3"));
        assert_eq!(h.objects.object_count().await, 1);
        assert_eq!(h.synthesize_calls(), 1);
        assert!(h.alerts.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_long_text_chunks_are_merged_in_order() {
        let owner = Uuid::new_v4();
        // 200 sentences of 50 chars each pack into 4 chunks against the
        // 3000-char ceiling.
        let text = format!("{}. ", "a".repeat(48)).repeat(200);
        let page = page(owner, &text);
        let audio = pending_audio(&page, VoiceId::Matthew);
        let synthesizer = MockSynthesizer::sequenced();
        let h = harness(page, synthesizer, fast_policy(3));
        h.store.insert(audio.clone()).await;

        h.orchestrator.run(audio.clone()).await;

        let stored = h.store.find_by_id(audio.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GenerationStatus::Completed);
        assert_eq!(h.synthesize_calls(), 4);

        // The merged object carries the per-chunk sequence markers in call
        // order.
        let body = h.objects.get(&stored.s3_key).await.unwrap();
        let markers: Vec<u8> = body
            .windows(2)
            .filter(|w| w[0] == 0xAA)
            .map(|w| w[1])
            .collect();
        assert_eq!(markers, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_retryable_failure_then_success() {
        let owner = Uuid::new_v4();
        let page = page(owner, "Flaky provider text.");
        let audio = pending_audio(&page, VoiceId::Ivy);
        let synthesizer = MockSynthesizer::failing_then_succeeding(GenerationError::Throttled, 2);
        let h = harness(page, synthesizer, fast_policy(3));
        h.store.insert(audio.clone()).await;

        h.orchestrator.run(audio.clone()).await;

        let stored = h.store.find_by_id(audio.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GenerationStatus::Completed);
        assert_eq!(h.synthesize_calls(), 3);
        assert!(h.alerts.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_retries_exhausted_marks_failed_and_alerts() {
        let owner = Uuid::new_v4();
        let page = page(owner, "Always throttled.");
        let audio = pending_audio(&page, VoiceId::Joey);
        let h = harness(
            page,
            MockSynthesizer::always_failing(GenerationError::Throttled),
            fast_policy(3),
        );
        h.store.insert(audio.clone()).await;

        h.orchestrator.run(audio.clone()).await;

        let stored = h.store.find_by_id(audio.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GenerationStatus::Failed);
        assert_eq!(
            stored.error_message.as_deref(),
            Some("AWS service is busy. Please try again in a moment.")
        );
        assert_eq!(h.synthesize_calls(), 3);

        let records = h.alerts.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].audio_id, audio.id);
        assert_eq!(records[0].task_name, "generate_audio");
        assert_eq!(records[0].retry_count, 3);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_stops_after_one_attempt() {
        let owner = Uuid::new_v4();
        let page = page(owner, "Bad input.");
        let audio = pending_audio(&page, VoiceId::Kendra);
        let h = harness(
            page,
            MockSynthesizer::always_failing(GenerationError::InvalidInput),
            fast_policy(3),
        );
        h.store.insert(audio.clone()).await;

        h.orchestrator.run(audio.clone()).await;

        let stored = h.store.find_by_id(audio.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GenerationStatus::Failed);
        assert_eq!(
            stored.error_message.as_deref(),
            Some("Invalid voice or text format. Please try a different voice.")
        );
        assert_eq!(h.synthesize_calls(), 1);
        assert_eq!(h.alerts.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_text_fails_without_synthesis() {
        let owner = Uuid::new_v4();
        let page = page(owner, "   ");
        let audio = pending_audio(&page, VoiceId::Salli);
        let h = harness(page, MockSynthesizer::succeeding(), fast_policy(3));
        h.store.insert(audio.clone()).await;

        h.orchestrator.run(audio.clone()).await;

        let stored = h.store.find_by_id(audio.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GenerationStatus::Failed);
        assert_eq!(h.synthesize_calls(), 0);
    }

    #[test]
    fn test_audio_object_key_shape() {
        let document_id = Uuid::nil();
        let now = DateTime::parse_from_rfc3339("2026-03-14T09:26:53Z")
            .unwrap()
            .with_timezone(&Utc);
        let key = audio_object_key(document_id, 7, VoiceId::Kimberly, now);
        assert_eq!(
            key,
            format!("audios/document_{document_id}/page_7/voice_Kimberly_20260314_092653.mp3")
        );
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
        };
        assert_eq!(policy.delay_before_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_before_attempt(2), Duration::from_secs(60));
        assert_eq!(policy.delay_before_attempt(3), Duration::from_secs(120));
    }
}
