use crate::domain::audio::error::GenerationError;
use crate::domain::audio::model::VoiceId;
use async_trait::async_trait;

/// TTS provider boundary.
///
/// Implementations synthesize one chunk (already under the provider's
/// character ceiling) and classify every provider failure into the
/// `GenerationError` taxonomy before it crosses this boundary; raw provider
/// error text stays in the implementation's logs.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize a single text chunk into MP3 bytes.
    async fn synthesize(&self, text: &str, voice: VoiceId) -> Result<Vec<u8>, GenerationError>;
}
