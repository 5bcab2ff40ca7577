// Scheduler lifecycle endpoints

use axum::{extract::State, http::StatusCode, response::Json};
use tracing::{error, info};

use super::common::{ApiResponse, ApiResult};
use crate::scheduler::EngineStatus;
use crate::web::AppState;

pub async fn start_engine(State(state): State<AppState>) -> ApiResult<EngineStatus> {
    info!("Cron engine start requested");
    match state.engine.start().await {
        Ok(status) => Ok(Json(ApiResponse::success(status))),
        Err(e) => {
            error!("Failed to start cron engine: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            ))
        }
    }
}

pub async fn stop_engine(State(state): State<AppState>) -> ApiResult<EngineStatus> {
    info!("Cron engine stop requested");
    Ok(Json(ApiResponse::success(state.engine.stop().await)))
}

pub async fn engine_status(State(state): State<AppState>) -> ApiResult<EngineStatus> {
    Ok(Json(ApiResponse::success(state.engine.status())))
}

pub async fn reload_engine(State(state): State<AppState>) -> ApiResult<EngineStatus> {
    info!("Cron engine reload requested");
    match state.engine.reload_all().await {
        Ok(_) => Ok(Json(ApiResponse::success(state.engine.status()))),
        Err(e) => {
            error!("Failed to reload cron jobs: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            ))
        }
    }
}
