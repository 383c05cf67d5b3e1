use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docvoice_backend::domain::audio::allocation::AllocationGuard;
use docvoice_backend::domain::audio::orchestrator::{GenerationOrchestrator, RetryPolicy};
use docvoice_backend::domain::audio::signing::{ObjectStoreSigner, SignedUrlIssuer, UrlSigner};
use docvoice_backend::infrastructure::cloudfront::CloudFrontSigner;
use docvoice_backend::infrastructure::config::{Config, LogFormat};
use docvoice_backend::infrastructure::db::{check_connection, create_pool};
use docvoice_backend::infrastructure::http::start_http_server;
use docvoice_backend::infrastructure::repositories::{
    AudioStore, FailureAlerts, ObjectStore, PageStore, PgAudioRepository,
    PgFailureAlertRepository, PgPageRepository, PgSettingsRepository, PgSharingRepository,
    PollySynthesizer, S3ObjectStore, SettingsStore, SharingPermissions, SpeechSynthesizer,
    UserRepository,
};
use docvoice_backend::infrastructure::tasks::spawn_expiry_sweep;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        "Starting DocVoice Backend on {}:{}",
        config.host,
        config.port
    );

    // Create database connection pool
    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Database connection pool created");

    // Verify database connection
    check_connection(&pool).await?;
    tracing::info!("Database connection verified");

    // Create AWS clients
    tracing::info!("Initializing AWS clients with region: {}", config.aws_region);

    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws_region.clone()))
        .load()
        .await;
    tracing::info!(region = ?aws_config.region(), "AWS configuration loaded");

    let polly_client = Arc::new(aws_sdk_polly::Client::new(&aws_config));
    let s3_client = Arc::new(aws_sdk_s3::Client::new(&aws_config));

    let pool = Arc::new(pool);
    let config = Arc::new(config);
    let call_timeout = Duration::from_secs(config.aws_call_timeout_seconds);

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Instantiate repositories (inject db pool)
    tracing::info!("Instantiating repositories...");
    let user_repo = Arc::new(UserRepository::new(pool.clone()));
    let audio_repo: Arc<dyn AudioStore> = Arc::new(PgAudioRepository::new(pool.clone()));
    let page_repo: Arc<dyn PageStore> = Arc::new(PgPageRepository::new(pool.clone()));
    let sharing_repo: Arc<dyn SharingPermissions> =
        Arc::new(PgSharingRepository::new(pool.clone()));
    let alert_repo: Arc<dyn FailureAlerts> = Arc::new(PgFailureAlertRepository::new(pool.clone()));

    let settings_repo = Arc::new(PgSettingsRepository::new(pool.clone()));
    settings_repo.ensure_exists().await?;
    let settings_repo: Arc<dyn SettingsStore> = settings_repo;

    // 2. Instantiate AWS-backed boundaries
    let synthesizer: Arc<dyn SpeechSynthesizer> =
        Arc::new(PollySynthesizer::new(polly_client, call_timeout));
    let object_store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(
        s3_client,
        config.s3_bucket.clone(),
        config.s3_cache_seconds as u64,
        call_timeout,
    ));

    // 3. Instantiate playback URL signing (CloudFront first, S3 presign as
    // fallback; CloudFront is skipped entirely when not configured)
    let mut signers: Vec<Arc<dyn UrlSigner>> = Vec::new();
    match (
        config.cloudfront_domain.as_deref(),
        config.cloudfront_key_pair_id.as_deref(),
        config.cloudfront_private_key.as_deref(),
    ) {
        (Some(domain), Some(key_pair_id), Some(private_key)) => {
            match CloudFrontSigner::from_config(domain, key_pair_id, private_key) {
                Ok(signer) => {
                    tracing::info!(domain, "CloudFront URL signing enabled");
                    signers.push(Arc::new(signer));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "CloudFront signing disabled, falling back to S3 presign");
                }
            }
        }
        _ => tracing::info!("CloudFront not configured, playback URLs use S3 presign"),
    }
    signers.push(Arc::new(ObjectStoreSigner::new(object_store.clone())));

    let issuer = Arc::new(SignedUrlIssuer::new(
        signers,
        Duration::from_secs(config.signed_url_ttl_seconds),
        config.signed_url_cache_enabled,
    ));

    // 4. Instantiate domain services
    tracing::info!("Instantiating services...");
    let guard = Arc::new(AllocationGuard::new(
        audio_repo.clone(),
        page_repo.clone(),
        sharing_repo.clone(),
        settings_repo.clone(),
    ));
    let orchestrator = Arc::new(GenerationOrchestrator::new(
        audio_repo.clone(),
        page_repo.clone(),
        synthesizer,
        object_store.clone(),
        alert_repo,
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(config.generation_retry_base_seconds),
        },
    ));

    // 5. Instantiate controllers
    let audio_controller = Arc::new(docvoice_backend::controllers::audio::AudioController::new(
        guard,
        orchestrator,
        audio_repo.clone(),
        issuer.clone(),
    ));

    // 6. Background retention sweep
    spawn_expiry_sweep(
        audio_repo,
        settings_repo,
        object_store,
        issuer,
        Duration::from_secs(config.expiry_sweep_interval_seconds),
    );

    // Start HTTP server with all routes
    start_http_server(pool, config, user_repo, audio_controller).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "docvoice_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "docvoice_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
