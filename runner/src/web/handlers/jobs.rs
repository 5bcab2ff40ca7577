// Job definition endpoints and the live run stream

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
};
use tracing::info;

use super::common::{error_response, ApiResponse, ApiResult};
use crate::database::JobRecord;
use crate::exec::LiveStreamSink;
use crate::services::{JobSaveRequest, JobView};
use crate::web::{sse, AppState};

pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Vec<JobView>> {
    state
        .job_service
        .list()
        .await
        .map(|jobs| Json(ApiResponse::success(jobs)))
        .map_err(|e| error_response("Failed to list jobs", e))
}

pub async fn save_job(
    State(state): State<AppState>,
    Json(request): Json<JobSaveRequest>,
) -> ApiResult<JobRecord> {
    state
        .job_service
        .save(request)
        .await
        .map(|job| Json(ApiResponse::success(job)))
        .map_err(|e| error_response("Failed to save job", e))
}

pub async fn pause_job(
    Path(job_id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<JobRecord> {
    state
        .job_service
        .pause(job_id)
        .await
        .map(|job| Json(ApiResponse::success(job)))
        .map_err(|e| error_response("Failed to pause job", e))
}

pub async fn resume_job(
    Path(job_id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<JobRecord> {
    state
        .job_service
        .resume(job_id)
        .await
        .map(|job| Json(ApiResponse::success(job)))
        .map_err(|e| error_response("Failed to resume job", e))
}

/// Run a job now and relay its events as SSE
pub async fn run_job_stream(
    Path(job_id): Path<i64>,
    State(state): State<AppState>,
) -> Response {
    info!("Live run requested for job {}", job_id);
    let (sink, rx) = LiveStreamSink::channel();

    match state.job_service.run_once(job_id, sink).await {
        Ok(_ticket) => sse::sse_response(rx, state.config.sse_idle_timeout()).into_response(),
        Err(e) => error_response("Failed to run job", e).into_response(),
    }
}
