use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    domain::audio::{
        allocation::AllocationGuard,
        model::{Audio, GenerationStatus, LifetimeStatus, VoiceId},
        orchestrator::GenerationOrchestrator,
        signing::SignedUrlIssuer,
    },
    error::{AppError, AppResult},
    infrastructure::{auth::AuthUser, repositories::AudioStore, tasks::spawn_generation},
};
use uuid::Uuid;

/// Request for POST /api/pages/:page_id/audio
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateAudioRequest {
    pub voice: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AudioResponse {
    pub audio_id: Uuid,
    pub page_id: Uuid,
    pub voice: String,
    pub status: String,
    pub lifetime_status: String,
    pub error_message: Option<String>,
}

impl From<&Audio> for AudioResponse {
    fn from(audio: &Audio) -> Self {
        Self {
            audio_id: audio.id,
            page_id: audio.page_id,
            voice: audio.voice.as_str().to_string(),
            status: audio.status.as_str().to_string(),
            lifetime_status: audio.lifetime_status.as_str().to_string(),
            error_message: audio.error_message.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlayAudioResponse {
    pub audio_id: Uuid,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AudioListResponse {
    pub audios: Vec<AudioResponse>,
}

pub struct AudioController {
    guard: Arc<AllocationGuard>,
    orchestrator: Arc<GenerationOrchestrator>,
    store: Arc<dyn AudioStore>,
    issuer: Arc<SignedUrlIssuer>,
}

impl AudioController {
    pub fn new(
        guard: Arc<AllocationGuard>,
        orchestrator: Arc<GenerationOrchestrator>,
        store: Arc<dyn AudioStore>,
        issuer: Arc<SignedUrlIssuer>,
    ) -> Self {
        Self {
            guard,
            orchestrator,
            store,
            issuer,
        }
    }

    async fn find_visible(&self, actor: Uuid, audio_id: Uuid) -> AppResult<Audio> {
        let audio = self
            .store
            .find_by_id(audio_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Audio not found".to_string()))?;
        self.guard.authorize_view(actor, audio.page_id).await?;
        Ok(audio)
    }

    /// POST /api/pages/:page_id/audio - reserve a slot and start generation
    pub async fn generate(
        State(controller): State<Arc<AudioController>>,
        Extension(auth_user): Extension<AuthUser>,
        Path(page_id): Path<Uuid>,
        Json(request): Json<GenerateAudioRequest>,
    ) -> AppResult<Json<AudioResponse>> {
        let voice = VoiceId::from_str(&request.voice)
            .map_err(|_| AppError::BadRequest(format!("Unknown voice: {}", request.voice)))?;

        let audio = controller
            .guard
            .check_and_reserve(auth_user.user_id, page_id, voice)
            .await?;

        spawn_generation(controller.orchestrator.clone(), audio.clone());

        Ok(Json(AudioResponse::from(&audio)))
    }

    /// GET /api/audio/:id/status
    pub async fn status(
        State(controller): State<Arc<AudioController>>,
        Extension(auth_user): Extension<AuthUser>,
        Path(audio_id): Path<Uuid>,
    ) -> AppResult<Json<AudioResponse>> {
        let audio = controller.find_visible(auth_user.user_id, audio_id).await?;
        Ok(Json(AudioResponse::from(&audio)))
    }

    /// GET /api/audio/:id/play - issue a signed playback URL
    pub async fn play(
        State(controller): State<Arc<AudioController>>,
        Extension(auth_user): Extension<AuthUser>,
        Path(audio_id): Path<Uuid>,
    ) -> AppResult<Json<PlayAudioResponse>> {
        let audio = controller.find_visible(auth_user.user_id, audio_id).await?;

        if audio.lifetime_status != LifetimeStatus::Active {
            return Err(AppError::NotFound("Audio is no longer available".to_string()));
        }
        if audio.status != GenerationStatus::Completed {
            return Err(AppError::BadRequest(format!(
                "Audio is not ready for playback (status: {})",
                audio.status
            )));
        }

        let url = controller.issuer.issue(&audio).await.ok_or_else(|| {
            AppError::ExternalService("Could not produce a playback URL".to_string())
        })?;

        controller.store.touch_played(audio.id).await?;

        Ok(Json(PlayAudioResponse {
            audio_id: audio.id,
            url,
        }))
    }

    /// POST /api/audio/:id/retry - requeue a failed generation
    pub async fn retry(
        State(controller): State<Arc<AudioController>>,
        Extension(auth_user): Extension<AuthUser>,
        Path(audio_id): Path<Uuid>,
    ) -> AppResult<Json<AudioResponse>> {
        let audio = controller.guard.retry(auth_user.user_id, audio_id).await?;
        spawn_generation(controller.orchestrator.clone(), audio.clone());
        Ok(Json(AudioResponse::from(&audio)))
    }

    /// DELETE /api/audio/:id - soft delete
    pub async fn delete(
        State(controller): State<Arc<AudioController>>,
        Extension(auth_user): Extension<AuthUser>,
        Path(audio_id): Path<Uuid>,
    ) -> AppResult<StatusCode> {
        let audio = controller
            .store
            .find_by_id(audio_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Audio not found".to_string()))?;
        controller
            .guard
            .authorize_generate(auth_user.user_id, audio.page_id)
            .await?;

        controller.store.soft_delete(audio_id).await?;
        controller.issuer.invalidate(audio_id).await;

        Ok(StatusCode::NO_CONTENT)
    }

    /// GET /api/pages/:page_id/audios
    pub async fn list(
        State(controller): State<Arc<AudioController>>,
        Extension(auth_user): Extension<AuthUser>,
        Path(page_id): Path<Uuid>,
    ) -> AppResult<Json<AudioListResponse>> {
        controller.guard.authorize_view(auth_user.user_id, page_id).await?;
        let audios = controller.store.list_for_page(page_id).await?;
        Ok(Json(AudioListResponse {
            audios: audios.iter().map(AudioResponse::from).collect(),
        }))
    }
}
