use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{attempts, handlers, media, metadata, middleware::metrics_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/health/services", get(handlers::service_health))
        .route("/config", get(handlers::get_config))
        // Metadata providers
        .route("/metadata/search", get(metadata::search))
        .route("/metadata/isbn/{isbn}", get(metadata::lookup_isbn))
        // Media
        .route("/media", post(media::add_wanted))
        .route(
            "/media/status",
            get(media::status_by_query).post(media::status_by_body),
        )
        .route("/media/{id}/search", post(media::search))
        .route("/media/{id}/downloads", post(media::initiate_download))
        .route("/media/{id}/attempts", get(media::list_attempts))
        // Attempts
        .route("/attempts/{id}", delete(attempts::delete_attempt))
        .route("/attempts/{id}/status", get(attempts::get_status))
        .route("/attempts/{id}/blacklist", post(attempts::blacklist))
        .route("/attempts/{id}/convert", post(attempts::convert))
        .route("/attempts/{id}/organize", post(attempts::organize))
        .layer(middleware::from_fn(metrics_middleware));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
