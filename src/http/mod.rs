//! HTTP surface over [`StudyService`].
//!
//! JSON in, JSON out, except uploads (multipart), the plain-text study sheet
//! and raw blob downloads. Errors always carry `{error, kind, retryable}`.

mod error;
mod handlers;
mod models;

pub use error::{status_for, ApiError};
pub use models::{
    ErrorResponse, GenerateRequest, GenerateResponse, HealthResponse, ModelsResponse,
    RegenerateRequest, TaskInfo,
};

use crate::generate::StudyService;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Multipart framing and form fields on top of the file itself.
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(service: StudyService) -> Router {
    let body_limit = service.config().max_file_bytes
        + service.config().max_text_bytes
        + BODY_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/models", get(handlers::models))
        .route("/api/generate", post(handlers::generate))
        .route("/api/upload", post(handlers::upload))
        .route(
            "/api/users/:user_id/notes",
            get(handlers::list_notes).post(handlers::save_note),
        )
        .route("/api/users/:user_id/notes/:note_id", get(handlers::get_note))
        .route("/api/users/:user_id/notes/:note_id/text", get(handlers::note_text))
        .route(
            "/api/users/:user_id/notes/:note_id/regenerate",
            post(handlers::regenerate),
        )
        .route("/api/users/:user_id/blobs/:blob_id", get(handlers::get_blob))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Bind the configured address and serve until the process stops.
pub async fn run_server(service: StudyService) -> std::io::Result<()> {
    let addr = service.config().bind_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(service)).await
}
