use super::aws_error::classify_aws_code;
use super::speech_synthesizer::SpeechSynthesizer;
use crate::domain::audio::error::GenerationError;
use crate::domain::audio::model::VoiceId;
use async_trait::async_trait;
use aws_sdk_polly::error::SdkError;
use aws_sdk_polly::operation::synthesize_speech::SynthesizeSpeechError;
use aws_sdk_polly::types::{Engine, LanguageCode, OutputFormat, VoiceId as PollyVoiceId};
use aws_sdk_polly::Client as PollyClient;
use std::sync::Arc;
use std::time::Duration;

/// AWS Polly implementation of the synthesizer boundary.
pub struct PollySynthesizer {
    polly_client: Arc<PollyClient>,
    call_timeout: Duration,
}

impl PollySynthesizer {
    pub fn new(polly_client: Arc<PollyClient>, call_timeout: Duration) -> Self {
        Self {
            polly_client,
            call_timeout,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for PollySynthesizer {
    async fn synthesize(&self, text: &str, voice: VoiceId) -> Result<Vec<u8>, GenerationError> {
        tracing::debug!(
            voice = voice.as_str(),
            text_length = text.len(),
            "Calling AWS Polly synthesize_speech"
        );

        let request = self
            .polly_client
            .synthesize_speech()
            .text(text)
            .voice_id(PollyVoiceId::from(voice.as_str()))
            .output_format(OutputFormat::Mp3)
            .engine(Engine::Standard)
            .language_code(LanguageCode::EnUs)
            .send();

        let result = tokio::time::timeout(self.call_timeout, request)
            .await
            .map_err(|_| {
                tracing::warn!(
                    voice = voice.as_str(),
                    timeout_secs = self.call_timeout.as_secs(),
                    "AWS Polly synthesize_speech timed out"
                );
                GenerationError::Timeout
            })?
            .map_err(|err| classify_polly_error(&err, voice))?;

        let audio_stream = result.audio_stream.collect().await.map_err(|err| {
            tracing::error!(error = %err, "Failed to collect audio stream from Polly response");
            GenerationError::Unknown
        })?;

        let audio_bytes = audio_stream.into_bytes().to_vec();
        tracing::debug!(audio_size = audio_bytes.len(), "Audio stream collected");
        Ok(audio_bytes)
    }
}

fn classify_polly_error(
    err: &SdkError<SynthesizeSpeechError>,
    voice: VoiceId,
) -> GenerationError {
    use aws_sdk_polly::error::ProvideErrorMetadata;

    let classified = match err {
        SdkError::TimeoutError(_) => GenerationError::Timeout,
        SdkError::DispatchFailure(_) => GenerationError::Connection,
        SdkError::ServiceError(_) => {
            let code = err.meta().code().unwrap_or_default();
            classify_aws_code(code)
        }
        _ => GenerationError::Unknown,
    };

    // Raw SDK error text goes to the log only; the classified error's Display
    // string is what callers may show to users.
    tracing::error!(
        error = ?err,
        voice = voice.as_str(),
        classified = ?classified,
        "AWS Polly synthesize_speech failed"
    );

    classified
}
