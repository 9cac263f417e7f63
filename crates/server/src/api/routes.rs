use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::middleware::metrics_middleware;
use super::{handlers, hls, streams};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let transcoder = state.orchestrator().config();

    // Generated playlists and segments, e.g. /hlsproxy/<job>/240p/000.ts
    let media_prefix = format!("/{}", transcoder.route_prefix.trim_matches('/'));
    let media = ServeDir::new(&transcoder.output_dir);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Streams
        .route(
            "/streams",
            post(streams::create_stream).get(streams::list_streams),
        )
        .route(
            "/streams/{id}",
            get(streams::get_stream).delete(streams::stop_stream),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .nest_service(&media_prefix, media)
        // Anything else is treated as an origin playlist request
        .fallback(hls::proxy_playlist)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
