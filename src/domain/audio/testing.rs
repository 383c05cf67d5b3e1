//! In-memory fakes shared by the domain unit tests.

use super::error::{AllocationError, GenerationError, SigningError};
use super::model::{Audio, GenerationStatus, LifetimeStatus, Page, SiteSettings, VoiceId};
use super::signing::UrlSigner;
use crate::error::AppResult;
use crate::infrastructure::repositories::{
    AudioStore, FailureAlerts, FailureRecord, ObjectStore, PageStore, SettingsStore,
    SharingPermissions, SpeechSynthesizer,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

pub fn page(owner_id: Uuid, markdown_content: &str) -> Page {
    Page {
        id: Uuid::new_v4(),
        document_id: Uuid::new_v4(),
        page_number: 1,
        owner_id,
        markdown_content: markdown_content.to_string(),
    }
}

/// Minimal valid single-frame MP3: sync word, MPEG1 Layer III header, payload.
pub fn mp3_chunk(payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFB, 0x90, 0x00];
    bytes.extend_from_slice(payload);
    bytes
}

/// In-memory `AudioStore` with the same locking discipline as the Postgres
/// implementation: `reserve` holds a per-page mutex across the recheck and
/// the insert, with an await point in between so interleavings actually occur
/// under the test runtime.
pub struct MemoryAudioStore {
    rows: Mutex<HashMap<Uuid, Audio>>,
    page_locks: Mutex<HashMap<Uuid, std::sync::Arc<Mutex<()>>>>,
}

impl MemoryAudioStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            page_locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, audio: Audio) {
        self.rows.lock().await.insert(audio.id, audio);
    }

    async fn page_lock(&self, page_id: Uuid) -> std::sync::Arc<Mutex<()>> {
        self.page_locks
            .lock()
            .await
            .entry(page_id)
            .or_insert_with(|| std::sync::Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl AudioStore for MemoryAudioStore {
    async fn find_by_id(&self, audio_id: Uuid) -> AppResult<Option<Audio>> {
        Ok(self.rows.lock().await.get(&audio_id).cloned())
    }

    async fn count_for_page(&self, page_id: Uuid) -> AppResult<i64> {
        let rows = self.rows.lock().await;
        Ok(rows.values().filter(|a| a.page_id == page_id).count() as i64)
    }

    async fn active_voice_exists(&self, page_id: Uuid, voice: VoiceId) -> AppResult<bool> {
        let rows = self.rows.lock().await;
        Ok(rows.values().any(|a| {
            a.page_id == page_id && a.voice == voice && a.lifetime_status == LifetimeStatus::Active
        }))
    }

    async fn reserve(
        &self,
        page_id: Uuid,
        voice: VoiceId,
        actor: Uuid,
        max_per_page: u32,
    ) -> Result<Audio, AllocationError> {
        let lock = self.page_lock(page_id).await;
        let _guard = lock.lock().await;

        // Give concurrent reservations a chance to interleave here; the
        // page lock above is what keeps the recheck and insert atomic.
        tokio::task::yield_now().await;

        {
            let rows = self.rows.lock().await;
            let total = rows.values().filter(|a| a.page_id == page_id).count() as u32;
            if total >= max_per_page {
                return Err(AllocationError::QuotaExceeded(max_per_page));
            }
            let duplicate = rows.values().any(|a| {
                a.page_id == page_id
                    && a.voice == voice
                    && a.lifetime_status == LifetimeStatus::Active
            });
            if duplicate {
                return Err(AllocationError::DuplicateVoice(voice));
            }
        }

        let audio = Audio {
            id: Uuid::new_v4(),
            page_id,
            voice,
            generated_by: actor,
            s3_key: String::new(),
            status: GenerationStatus::Pending,
            lifetime_status: LifetimeStatus::Active,
            created_at: Utc::now(),
            last_played_at: None,
            deleted_at: None,
            error_message: None,
        };
        self.rows.lock().await.insert(audio.id, audio.clone());
        Ok(audio)
    }

    async fn set_status(&self, audio_id: Uuid, status: GenerationStatus) -> AppResult<()> {
        if let Some(audio) = self.rows.lock().await.get_mut(&audio_id) {
            audio.status = status;
        }
        Ok(())
    }

    async fn complete(&self, audio_id: Uuid, s3_key: &str) -> AppResult<()> {
        if let Some(audio) = self.rows.lock().await.get_mut(&audio_id) {
            audio.status = GenerationStatus::Completed;
            audio.s3_key = s3_key.to_string();
            audio.error_message = None;
        }
        Ok(())
    }

    async fn fail(&self, audio_id: Uuid, error_message: &str) -> AppResult<()> {
        if let Some(audio) = self.rows.lock().await.get_mut(&audio_id) {
            audio.status = GenerationStatus::Failed;
            audio.error_message = Some(error_message.to_string());
        }
        Ok(())
    }

    async fn reset_failed(&self, audio_id: Uuid) -> AppResult<bool> {
        if let Some(audio) = self.rows.lock().await.get_mut(&audio_id) {
            if audio.status == GenerationStatus::Failed {
                audio.status = GenerationStatus::Pending;
                audio.error_message = None;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn soft_delete(&self, audio_id: Uuid) -> AppResult<()> {
        if let Some(audio) = self.rows.lock().await.get_mut(&audio_id) {
            audio.lifetime_status = LifetimeStatus::Deleted;
            audio.deleted_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn touch_played(&self, audio_id: Uuid) -> AppResult<()> {
        if let Some(audio) = self.rows.lock().await.get_mut(&audio_id) {
            audio.last_played_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn list_for_page(&self, page_id: Uuid) -> AppResult<Vec<Audio>> {
        let rows = self.rows.lock().await;
        let mut audios: Vec<Audio> = rows
            .values()
            .filter(|a| a.page_id == page_id)
            .cloned()
            .collect();
        audios.sort_by_key(|a| a.created_at);
        Ok(audios)
    }

    async fn list_expirable(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Audio>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .values()
            .filter(|a| {
                a.lifetime_status == LifetimeStatus::Active
                    && a.status == GenerationStatus::Completed
                    && a.last_played_at.unwrap_or(a.created_at) < cutoff
            })
            .cloned()
            .collect())
    }

    async fn mark_expired(&self, audio_id: Uuid) -> AppResult<()> {
        if let Some(audio) = self.rows.lock().await.get_mut(&audio_id) {
            audio.lifetime_status = LifetimeStatus::Expired;
        }
        Ok(())
    }
}

pub struct StaticPageStore {
    pages: HashMap<Uuid, Page>,
}

impl StaticPageStore {
    pub fn with(pages: Vec<Page>) -> Self {
        Self {
            pages: pages.into_iter().map(|p| (p.id, p)).collect(),
        }
    }
}

#[async_trait]
impl PageStore for StaticPageStore {
    async fn find_by_id(&self, page_id: Uuid) -> AppResult<Option<Page>> {
        Ok(self.pages.get(&page_id).cloned())
    }
}

pub struct StaticSettings {
    settings: SiteSettings,
}

impl StaticSettings {
    pub fn new(settings: SiteSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SettingsStore for StaticSettings {
    async fn load(&self) -> AppResult<SiteSettings> {
        Ok(self.settings.clone())
    }
}

/// Sharing fake: either denies every non-owner or grants full access to one
/// user.
pub struct StaticSharing {
    granted: Option<Uuid>,
}

impl StaticSharing {
    pub fn deny_all() -> Self {
        Self { granted: None }
    }

    pub fn grant_to(user_id: Uuid) -> Self {
        Self {
            granted: Some(user_id),
        }
    }
}

#[async_trait]
impl SharingPermissions for StaticSharing {
    async fn can_generate_audio(&self, user_id: Uuid, _document_id: Uuid) -> AppResult<bool> {
        Ok(self.granted == Some(user_id))
    }

    async fn can_view(&self, user_id: Uuid, _document_id: Uuid) -> AppResult<bool> {
        Ok(self.granted == Some(user_id))
    }
}

enum MockBehavior {
    Succeed,
    /// Per-call chunk payload carries a sequence marker (0xAA, call index).
    Sequenced,
    AlwaysFail(GenerationError),
    FailThenSucceed {
        error: GenerationError,
        failures: usize,
    },
}

pub struct MockSynthesizer {
    behavior: MockBehavior,
    calls: AtomicUsize,
}

impl MockSynthesizer {
    pub fn succeeding() -> Self {
        Self {
            behavior: MockBehavior::Succeed,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn sequenced() -> Self {
        Self {
            behavior: MockBehavior::Sequenced,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always_failing(error: GenerationError) -> Self {
        Self {
            behavior: MockBehavior::AlwaysFail(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_then_succeeding(error: GenerationError, failures: usize) -> Self {
        Self {
            behavior: MockBehavior::FailThenSucceed { error, failures },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, _text: &str, _voice: VoiceId) -> Result<Vec<u8>, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::Succeed => Ok(mp3_chunk(b"audio")),
            MockBehavior::Sequenced => Ok(mp3_chunk(&[0xAA, call as u8])),
            MockBehavior::AlwaysFail(error) => Err(*error),
            MockBehavior::FailThenSucceed { error, failures } => {
                if call < *failures {
                    Err(*error)
                } else {
                    Ok(mp3_chunk(b"audio"))
                }
            }
        }
    }
}

pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().await.get(key).cloned()
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bytes: &[u8], key: &str) -> Result<(), GenerationError> {
        self.objects
            .lock()
            .await
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), GenerationError> {
        self.objects.lock().await.remove(key);
        Ok(())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, SigningError> {
        Ok(format!(
            "https://test-bucket.s3.amazonaws.com/{key}?X-Amz-Expires={}",
            ttl.as_secs()
        ))
    }
}

pub struct RecordingAlerts {
    records: Mutex<Vec<FailureRecord>>,
}

impl RecordingAlerts {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    pub async fn records(&self) -> Vec<FailureRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl FailureAlerts for RecordingAlerts {
    async fn record(&self, record: FailureRecord) {
        self.records.lock().await.push(record);
    }
}

pub struct FixedSigner {
    name: &'static str,
    url: String,
}

impl FixedSigner {
    pub fn new(name: &'static str, url: &str) -> Self {
        Self {
            name,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl UrlSigner for FixedSigner {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn sign(&self, _key: &str, _ttl: Duration) -> Result<String, SigningError> {
        Ok(self.url.clone())
    }
}

pub struct FailingSigner {
    name: &'static str,
}

impl FailingSigner {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl UrlSigner for FailingSigner {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn sign(&self, _key: &str, _ttl: Duration) -> Result<String, SigningError> {
        Err(SigningError::MissingConfig)
    }
}
