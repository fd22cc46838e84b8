//! Router definition for the relay endpoints.

use axum::{extract::DefaultBodyLimit, routing::*, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::server::handlers;
use crate::server::state::AppState;

/// Build the router for key issuance, status, transfer endpoints, and
/// static assets.
pub fn create_router(state: &AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/status/:key", get(handlers::status))
        .route("/download/:key", get(handlers::download))
        // Uploads are streamed straight through; no size cap
        .route(
            "/upload/:key",
            post(handlers::upload).layer(DefaultBodyLimit::disable()),
        )
        .fallback_service(ServeDir::new(&state.config.static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone())
}
