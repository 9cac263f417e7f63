//! HLS origin proxy.
//!
//! A request such as `GET /live/channel.m3u8` is re-targeted at the configured
//! origin, a fresh job is started for it, and the master playlist of that job
//! is returned in place of the origin's own playlist.

use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use hlsproxy_core::JobRequest;
use std::sync::Arc;
use tracing::{info, warn};

use super::streams::{api_error, ErrorResponse};
use crate::state::AppState;

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

pub async fn proxy_playlist(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Response {
    let origin = match state.origin() {
        Some(origin) if method == Method::GET && uri.path().ends_with(".m3u8") => origin,
        _ => return not_found(uri.path()),
    };

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let source = match origin.source_for(path_and_query) {
        Ok(source) => source,
        Err(e) => {
            warn!("Origin URL is unusable: {}", e);
            return (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: format!("invalid origin url: {}", e),
                }),
            )
                .into_response();
        }
    };
    info!(
        "Proxying origin playlist {}{}",
        source.host_str().unwrap_or_default(),
        source.path()
    );

    match state
        .orchestrator()
        .start(JobRequest::new(source.to_string()).with_audio(true))
        .await
    {
        Ok(started) => (
            [(header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE)],
            started.master_playlist,
        )
            .into_response(),
        Err(e) => api_error(e).into_response(),
    }
}

fn not_found(path: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("no route for {}", path),
        }),
    )
        .into_response()
}
