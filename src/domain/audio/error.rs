use super::model::VoiceId;
use crate::error::AppError;

/// Synchronous rejection reasons from the allocation step. Every message is
/// safe to show to the caller.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("Audio generation is currently disabled by administrators.")]
    GenerationDisabled,

    #[error("Maximum {0} audios per page reached (lifetime quota).")]
    QuotaExceeded(u32),

    #[error("Voice {0} is already used for this page. Please choose a different voice or delete the existing audio.")]
    DuplicateVoice(VoiceId),

    #[error("You don't have permission to generate audio for this document.")]
    PermissionDenied,

    #[error("Audio or page not found.")]
    NotFound,

    #[error("Only failed audios can be retried.")]
    NotFailed,

    #[error("Page has no text content to synthesize.")]
    EmptyText,

    #[error("dependency error: {0}")]
    Dependency(#[from] anyhow::Error),
}

impl From<AppError> for AllocationError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(_) => AllocationError::NotFound,
            other => AllocationError::Dependency(anyhow::Error::new(other)),
        }
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::GenerationDisabled | AllocationError::PermissionDenied => {
                AppError::Forbidden(err.to_string())
            }
            AllocationError::QuotaExceeded(_) => AppError::RateLimitExceeded(err.to_string()),
            AllocationError::DuplicateVoice(_) => AppError::Conflict(err.to_string()),
            AllocationError::NotFound => AppError::NotFound(err.to_string()),
            AllocationError::NotFailed | AllocationError::EmptyText => {
                AppError::BadRequest(err.to_string())
            }
            AllocationError::Dependency(err) => AppError::ExternalService(err.to_string()),
        }
    }
}

/// Classified pipeline failures. The `Display` text is the sanitized message
/// stored on the audio row and shown to users; raw provider error text stays
/// in the logs at the boundary where it was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("AWS service is busy. Please try again in a moment.")]
    Throttled,

    #[error("Invalid voice or text format. Please try a different voice.")]
    InvalidInput,

    #[error("Audio service is temporarily unavailable. Please try again later.")]
    ServiceUnavailable,

    #[error("System configuration error. Please contact support.")]
    AccessConfig,

    #[error("Network error connecting to audio service. Please try again.")]
    Connection,

    #[error("Audio service timed out. Please try again.")]
    Timeout,

    #[error("Failed to merge audio chunks.")]
    Merge,

    #[error("Failed to save audio file. Please try again later.")]
    Storage,

    #[error("Text cannot be empty.")]
    EmptyText,

    #[error("An unexpected error occurred. Please try again later.")]
    Unknown,
}

impl GenerationError {
    /// Whether the retry loop may re-attempt the pipeline for this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Throttled
                | Self::ServiceUnavailable
                | Self::Connection
                | Self::Timeout
                | Self::Unknown
        )
    }
}

/// Failure of one URL signing strategy. Never exposed to callers; the issuer
/// logs it and falls through to the next strategy.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("CloudFront configuration incomplete")]
    MissingConfig,

    #[error("invalid private key")]
    InvalidKey,

    #[error("policy signing failed")]
    Signing,

    #[error("audio has no stored object key")]
    MissingKey,

    #[error("presign failed: {0}")]
    Presign(String),
}
