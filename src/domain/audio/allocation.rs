use super::error::AllocationError;
use super::model::{Audio, LifetimeStatus, Page, VoiceId};
use crate::infrastructure::repositories::{
    AudioStore, PageStore, SettingsStore, SharingPermissions,
};
use std::sync::Arc;
use uuid::Uuid;

/// Decides whether a new generation attempt is allowed and atomically
/// reserves the slot.
///
/// The optimistic checks here run outside any lock and exist to reject most
/// bad requests cheaply; the store's `reserve` repeats the uniqueness and
/// quota checks under a page-scoped lock, which is the correctness guarantee
/// against concurrent reservations.
pub struct AllocationGuard {
    store: Arc<dyn AudioStore>,
    pages: Arc<dyn PageStore>,
    sharing: Arc<dyn SharingPermissions>,
    settings: Arc<dyn SettingsStore>,
}

impl AllocationGuard {
    pub fn new(
        store: Arc<dyn AudioStore>,
        pages: Arc<dyn PageStore>,
        sharing: Arc<dyn SharingPermissions>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            store,
            pages,
            sharing,
            settings,
        }
    }

    pub async fn check_and_reserve(
        &self,
        actor: Uuid,
        page_id: Uuid,
        voice: VoiceId,
    ) -> Result<Audio, AllocationError> {
        let settings = self.settings.load().await?;
        if !settings.audio_generation_enabled {
            tracing::warn!(%actor, %page_id, "audio generation disabled, rejecting");
            return Err(AllocationError::GenerationDisabled);
        }

        let page = self
            .pages
            .find_by_id(page_id)
            .await?
            .ok_or(AllocationError::NotFound)?;

        // Reject before any quota consumption or network call.
        if page.markdown_content.trim().is_empty() {
            return Err(AllocationError::EmptyText);
        }

        // Lifetime quota counts every row ever created, including DELETED and
        // EXPIRED ones.
        let total = self.store.count_for_page(page_id).await?;
        if total >= settings.max_audios_per_page as i64 {
            return Err(AllocationError::QuotaExceeded(settings.max_audios_per_page));
        }

        if self.store.active_voice_exists(page_id, voice).await? {
            return Err(AllocationError::DuplicateVoice(voice));
        }

        self.ensure_can_generate(actor, &page).await?;

        let audio = self
            .store
            .reserve(page_id, voice, actor, settings.max_audios_per_page)
            .await?;

        tracing::info!(
            audio_id = %audio.id,
            %page_id,
            voice = voice.as_str(),
            %actor,
            "audio generation slot reserved"
        );
        Ok(audio)
    }

    /// Re-queue a failed audio. Only ACTIVE rows qualify: a soft-deleted or
    /// expired row stays terminal, since its voice may already be held by a
    /// newer ACTIVE row. For an ACTIVE row the voice uniqueness invariant
    /// holds because the row itself is the holder, and the lifetime quota is
    /// deliberately not re-checked since no new row is created.
    pub async fn retry(&self, actor: Uuid, audio_id: Uuid) -> Result<Audio, AllocationError> {
        let audio = self
            .store
            .find_by_id(audio_id)
            .await?
            .ok_or(AllocationError::NotFound)?;
        if audio.lifetime_status != LifetimeStatus::Active {
            return Err(AllocationError::NotFound);
        }
        let page = self
            .pages
            .find_by_id(audio.page_id)
            .await?
            .ok_or(AllocationError::NotFound)?;

        self.ensure_can_generate(actor, &page).await?;

        if !self.store.reset_failed(audio_id).await? {
            return Err(AllocationError::NotFailed);
        }

        tracing::info!(%audio_id, %actor, "failed audio reset for retry");
        self.store
            .find_by_id(audio_id)
            .await?
            .ok_or(AllocationError::NotFound)
    }

    /// View-level access check used by status/play/list operations.
    pub async fn authorize_view(&self, actor: Uuid, page_id: Uuid) -> Result<Page, AllocationError> {
        let page = self
            .pages
            .find_by_id(page_id)
            .await?
            .ok_or(AllocationError::NotFound)?;
        if page.owner_id == actor || self.sharing.can_view(actor, page.document_id).await? {
            Ok(page)
        } else {
            Err(AllocationError::PermissionDenied)
        }
    }

    /// Generation-level access check used by reserve/retry/delete.
    pub async fn authorize_generate(
        &self,
        actor: Uuid,
        page_id: Uuid,
    ) -> Result<Page, AllocationError> {
        let page = self
            .pages
            .find_by_id(page_id)
            .await?
            .ok_or(AllocationError::NotFound)?;
        self.ensure_can_generate(actor, &page).await?;
        Ok(page)
    }

    async fn ensure_can_generate(&self, actor: Uuid, page: &Page) -> Result<(), AllocationError> {
        if page.owner_id == actor {
            return Ok(());
        }
        if self
            .sharing
            .can_generate_audio(actor, page.document_id)
            .await?
        {
            return Ok(());
        }
        Err(AllocationError::PermissionDenied)
    }
}
