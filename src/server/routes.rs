//! Router setup and server startup.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use super::state::AppState;
use crate::Result;
use crate::config::ServerConfig;

/// Create the axum Router with every route and middleware
///
/// Request bodies larger than `max_upload_bytes` are rejected.
#[inline]
pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    // The browser front end may be served from anywhere.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/upload-pdf", post(handlers::upload_pdf))
        .route("/chat", get(handlers::chat))
        .route("/voice-chat", post(handlers::voice_chat))
        .route("/voice-chat/audio", post(handlers::voice_chat_audio))
        .route("/history", delete(handlers::clear_history))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C
#[inline]
pub async fn start_server(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr = config.bind_address();
    let router = create_router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
