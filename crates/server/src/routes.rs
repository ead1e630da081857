//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Headroom for multipart framing on top of the configured payload cap.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // The body limit guards the transport; the precise payload cap is
    // enforced in the ingestion path with a proper 413 message.
    let body_limit = state
        .config
        .server
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let api_routes = Router::new()
        // Health check (intentionally unauthenticated for load balancers/k8s probes)
        .route("/v1/health", get(handlers::health_check))
        // Upload
        .route("/v1/files/upload/audio", post(handlers::upload_audio))
        // Chapter management
        .route("/v1/audio/{book_id}/chapters", get(handlers::list_chapters))
        .route(
            "/v1/audio/{book_id}/chapters/{chapter_id}",
            get(handlers::get_chapter)
                .put(handlers::update_chapter)
                .delete(handlers::delete_chapter),
        )
        .route(
            "/v1/audio/{book_id}/chapters/{chapter_id}/stream",
            get(handlers::stream_chapter),
        )
        .route(
            "/v1/audio/{book_id}/chapters/{chapter_id}/reprocess",
            post(handlers::reprocess_chapter),
        )
        // Encoding pipeline callback
        .route(
            "/v1/encoding/{chapter_id}/complete",
            post(handlers::complete_encoding),
        )
        // Raw object access (backs locally issued streaming URLs)
        .route(
            "/v1/files/{*key}",
            get(handlers::get_file).delete(handlers::delete_file),
        );

    Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(body_limit as usize))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
