//! Stream API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use hlsproxy_core::{
    JobRequest, JobStatus, OrchestratorError, ProcessState, ReadinessError, StartedJob,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for starting a stream
#[derive(Debug, Deserialize)]
pub struct CreateStreamBody {
    /// Job ID (generated when absent)
    #[serde(default)]
    pub id: Option<String>,
    /// Source locator handed to the engine
    #[serde(alias = "rtmp_url")]
    pub source: String,
    /// Encoding options
    #[serde(default)]
    pub config: Option<StreamConfigBody>,
}

/// Encoding options in request body
#[derive(Debug, Default, Deserialize)]
pub struct StreamConfigBody {
    #[serde(default, alias = "varients")]
    pub variants: Vec<String>,
    #[serde(default)]
    pub video_codec: Option<String>,
    #[serde(default)]
    pub audio_codec: Option<String>,
    #[serde(default)]
    pub audio: bool,
}

impl From<CreateStreamBody> for JobRequest {
    fn from(body: CreateStreamBody) -> Self {
        let options = body.config.unwrap_or_default();
        JobRequest {
            source: body.source,
            id: body.id,
            variants: options.variants,
            audio: options.audio,
            video_codec: options.video_codec,
            audio_codec: options.audio_codec,
        }
    }
}

/// Response for a started stream
#[derive(Debug, Serialize)]
pub struct CreateStreamResponse {
    pub id: String,
    pub master_playlist: String,
    pub playlist_url: String,
    pub warnings: Vec<String>,
}

impl From<StartedJob> for CreateStreamResponse {
    fn from(job: StartedJob) -> Self {
        Self {
            id: job.id,
            master_playlist: job.master_playlist,
            playlist_url: job.playlist_url,
            warnings: job.warnings,
        }
    }
}

/// Response for listing streams
#[derive(Debug, Serialize)]
pub struct ListStreamsResponse {
    pub streams: Vec<JobStatus>,
    pub total: usize,
}

/// Response for a stopped stream
#[derive(Debug, Serialize)]
pub struct StopStreamResponse {
    pub id: String,
    pub state: ProcessState,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Maps an orchestrator error to its HTTP status.
pub fn status_for(err: &OrchestratorError) -> StatusCode {
    match err {
        OrchestratorError::InvalidJobId { .. } | OrchestratorError::InvalidSource { .. } => {
            StatusCode::BAD_REQUEST
        }
        OrchestratorError::JobNotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::JobAlreadyRunning(_) => StatusCode::CONFLICT,
        OrchestratorError::Readiness(ReadinessError::Timeout { .. }) => {
            StatusCode::GATEWAY_TIMEOUT
        }
        OrchestratorError::Readiness(ReadinessError::Cancelled) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        OrchestratorError::Readiness(ReadinessError::Scan(_))
        | OrchestratorError::Process(_)
        | OrchestratorError::Manifest(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn api_error(err: OrchestratorError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Stream request failed: {}", err);
    } else {
        warn!("Stream request rejected: {}", err);
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a stream and wait until its first segment exists
pub async fn create_stream(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateStreamBody>,
) -> Result<(StatusCode, Json<CreateStreamResponse>), ApiError> {
    let started = state
        .orchestrator()
        .start(JobRequest::from(body))
        .await
        .map_err(api_error)?;

    info!("Stream {} available at {}", started.id, started.playlist_url);
    Ok((StatusCode::CREATED, Json(started.into())))
}

/// List running streams
pub async fn list_streams(State(state): State<Arc<AppState>>) -> Json<ListStreamsResponse> {
    let streams = state.orchestrator().list();
    Json(ListStreamsResponse {
        total: streams.len(),
        streams,
    })
}

/// Get a single stream
pub async fn get_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobStatus>, ApiError> {
    state
        .orchestrator()
        .status(&id)
        .map(Json)
        .ok_or_else(|| api_error(OrchestratorError::JobNotFound(id)))
}

/// Stop a stream and wait for its engine to exit
pub async fn stop_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StopStreamResponse>, ApiError> {
    let process_state = state.orchestrator().stop(&id).await.map_err(api_error)?;
    Ok(Json(StopStreamResponse {
        id,
        state: process_state,
    }))
}
