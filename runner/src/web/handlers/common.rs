// Common types and utilities for API handlers

use axum::{http::StatusCode, response::Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::{ConfigError, ResolutionError};

// Helper type for API responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Map a service error to a status: rejected input is 400, unknown ids 404
pub fn error_response(context: &str, e: anyhow::Error) -> (StatusCode, Json<ApiResponse<()>>) {
    let status = if e.downcast_ref::<ConfigError>().is_some() {
        StatusCode::BAD_REQUEST
    } else if let Some(resolution) = e.downcast_ref::<ResolutionError>() {
        match resolution {
            ResolutionError::JobNotFound { .. }
            | ResolutionError::ServerUnavailable { .. }
            | ResolutionError::DatabaseUnavailable { .. } => StatusCode::NOT_FOUND,
            ResolutionError::ScriptUnavailable { .. } => StatusCode::BAD_REQUEST,
        }
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("{}: {}", context, e);
    }
    (status, Json(ApiResponse::error(e.to_string())))
}

pub fn not_found(message: String) -> (StatusCode, Json<ApiResponse<()>>) {
    (StatusCode::NOT_FOUND, Json(ApiResponse::error(message)))
}

// Query parameters
#[derive(Deserialize)]
pub struct TestCommandQuery {
    pub cmd: Option<String>,
}
