// Execution log queries and mail preview

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Json},
};
use chrono::{Local, TimeZone, Utc};

use super::common::{error_response, not_found, ApiResponse, ApiResult};
use crate::constants::{jobs, log_limits};
use crate::database::{ExecutionLogRecord, FailedExecutionRecord};
use crate::services::render;
use crate::web::AppState;

pub async fn recent_job_logs(
    Path(job_id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<Vec<ExecutionLogRecord>> {
    state
        .database
        .recent_logs_for_job(job_id, log_limits::RECENT_LOGS_PER_JOB)
        .await
        .map(|logs| Json(ApiResponse::success(logs)))
        .map_err(|e| error_response("Failed to load execution logs", e))
}

pub async fn get_log(
    Path(log_id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<ExecutionLogRecord> {
    match state.database.get_execution_log(log_id).await {
        Ok(Some(log)) => Ok(Json(ApiResponse::success(log))),
        Ok(None) => Err(not_found(format!("execution log not found: {}", log_id))),
        Err(e) => Err(error_response("Failed to load execution log", e)),
    }
}

/// Failures since local midnight
pub async fn today_failures(
    State(state): State<AppState>,
) -> ApiResult<Vec<FailedExecutionRecord>> {
    let midnight = Local::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|t| Local.from_local_datetime(&t).earliest())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    state
        .database
        .failed_logs_since(midnight)
        .await
        .map(|logs| Json(ApiResponse::success(logs)))
        .map_err(|e| error_response("Failed to load today's failures", e))
}

pub async fn mail_preview(
    Path(log_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Html<String>, (StatusCode, Json<ApiResponse<()>>)> {
    let log = match state.database.get_execution_log(log_id).await {
        Ok(Some(log)) => log,
        Ok(None) => return Err(not_found(format!("execution log not found: {}", log_id))),
        Err(e) => return Err(error_response("Failed to load execution log", e)),
    };

    let job_name = match state.database.get_job(log.job_id).await {
        Ok(Some(job)) => job.name,
        _ => jobs::UNKNOWN_TARGET.to_string(),
    };

    Ok(Html(render::render_execution_log(&job_name, &log)))
}
