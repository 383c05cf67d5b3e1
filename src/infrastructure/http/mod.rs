use axum::{middleware, routing::get, routing::post, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::infrastructure::config::Config;
use crate::infrastructure::db::DbPool;
use crate::{
    controllers::{audio::AudioController, health},
    infrastructure::auth::{auth_middleware, request_id_middleware},
};

use crate::infrastructure::repositories::UserRepository;

/// Start the HTTP server with all routes configured
pub async fn start_http_server(
    pool: Arc<DbPool>,
    config: Arc<Config>,
    user_repo: Arc<UserRepository>,
    audio_controller: Arc<AudioController>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Audio routes (require authentication)
    let audio_routes = Router::new()
        .route(
            "/api/pages/:page_id/audio",
            post(AudioController::generate),
        )
        .route("/api/pages/:page_id/audios", get(AudioController::list))
        .route("/api/audio/:audio_id/status", get(AudioController::status))
        .route("/api/audio/:audio_id/play", get(AudioController::play))
        .route("/api/audio/:audio_id/retry", post(AudioController::retry))
        .route(
            "/api/audio/:audio_id",
            axum::routing::delete(AudioController::delete),
        )
        .with_state(audio_controller.clone())
        .layer(middleware::from_fn_with_state(
            (user_repo.clone(), config.clone()),
            auth_middleware,
        ));

    // Build application routes
    let app = Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state(pool.clone())
        .merge(audio_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http());

    // Start server
    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
