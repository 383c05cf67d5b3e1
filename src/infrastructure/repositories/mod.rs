pub mod audio_repository;
pub mod aws_error;
pub mod failure_alert_repository;
pub mod object_store;
pub mod page_repository;
pub mod polly_synthesizer;
pub mod s3_object_store;
pub mod settings_repository;
pub mod sharing_repository;
pub mod speech_synthesizer;
pub mod user_repository;

pub use audio_repository::{AudioStore, PgAudioRepository};
pub use failure_alert_repository::{FailureAlerts, FailureRecord, PgFailureAlertRepository};
pub use object_store::ObjectStore;
pub use page_repository::{PageStore, PgPageRepository};
pub use polly_synthesizer::PollySynthesizer;
pub use s3_object_store::S3ObjectStore;
pub use settings_repository::{PgSettingsRepository, SettingsStore};
pub use sharing_repository::{PgSharingRepository, SharingPermissions};
pub use speech_synthesizer::SpeechSynthesizer;
pub use user_repository::{User, UserRepository};
