// Streaming connection tests for servers and databases

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use tracing::info;

use super::common::{error_response, TestCommandQuery};
use crate::exec::LiveStreamSink;
use crate::web::{sse, AppState};

pub async fn test_server_stream(
    Path(server_id): Path<i64>,
    Query(query): Query<TestCommandQuery>,
    State(state): State<AppState>,
) -> Response {
    info!("Connection test requested for server {}", server_id);
    let (sink, rx) = LiveStreamSink::channel();

    match state
        .connection_tester
        .test_server(server_id, query.cmd, sink)
        .await
    {
        Ok(()) => sse::sse_response(rx, state.config.sse_idle_timeout()).into_response(),
        Err(e) => error_response("Failed to start server test", e).into_response(),
    }
}

pub async fn test_database_stream(
    Path(database_id): Path<i64>,
    State(state): State<AppState>,
) -> Response {
    info!("Connection test requested for database {}", database_id);
    let (sink, rx) = LiveStreamSink::channel();

    match state.connection_tester.test_database(database_id, sink).await {
        Ok(()) => sse::sse_response(rx, state.config.sse_idle_timeout()).into_response(),
        Err(e) => error_response("Failed to start database test", e).into_response(),
    }
}
