// Integration tests for web API handlers

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::fixtures::*;
use runner::config::Config;
use runner::database::JobType;
use runner::web::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn router(h: &TestHarness) -> Router {
    create_router(AppState::new(
        Arc::new(Config::default()),
        h.database(),
        h.engine.clone(),
        h.job_service.clone(),
        h.connection_tester.clone(),
    ))
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

#[tokio::test]
async fn test_engine_lifecycle_endpoints() {
    let h = TestHarness::new().await.unwrap();

    let (status, body) = send(router(&h), "GET", "/api/cron/status", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["started"], false);
    assert_eq!(body["data"]["status"], "STOPPED");

    let (status, body) = send(router(&h), "POST", "/api/cron/start", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["data"]["status"], "STARTED");

    let (_, body) = send(router(&h), "POST", "/api/cron/stop", None).await;
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["data"]["started"], false);
}

#[tokio::test]
async fn test_save_and_list_jobs() {
    let h = TestHarness::new().await.unwrap();
    let job = json!({
        "name": "nightly",
        "job_type": "SHELL",
        "cron_expr": crons::NIGHTLY,
        "script_name": scripts::ECHO_HI,
        "server_id": 1
    });

    let (status, body) = send(router(&h), "POST", "/api/cron/jobs", Some(job)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = send(router(&h), "GET", "/api/cron/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    let jobs = body["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["name"], "nightly");
    assert_eq!(jobs[0]["runtime_status"], "READY");
}

#[tokio::test]
async fn test_invalid_job_is_bad_request() {
    let h = TestHarness::new().await.unwrap();
    let job = json!({
        "name": "broken",
        "job_type": "SHELL",
        "cron_expr": "whenever",
        "script_name": scripts::ECHO_HI,
        "server_id": 1
    });

    let (status, body) = send(router(&h), "POST", "/api/cron/jobs", Some(job)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_unknown_log_is_not_found() {
    let h = TestHarness::new().await.unwrap();
    let (status, _) = send(router(&h), "GET", "/api/cron/logs/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(router(&h), "POST", "/api/cron/jobs/999/pause", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_run_stream_relays_events_and_logs_are_queryable() {
    let h = TestHarness::new().await.unwrap();
    let server = h.db.insert_server("local", "localhost", false).await.unwrap();
    h.db.insert_script(scripts::ECHO_HI, "echo hi").await.unwrap();
    let job = h
        .db
        .insert_job("echo", JobType::Shell, scripts::ECHO_HI, server, None)
        .await
        .unwrap();

    let uri = format!("/api/cron/job/{}/run/stream", job.id);
    let (status, body) = send(router(&h), "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("event: meta\ndata: host=localhost"));
    assert!(body.contains("event: stdout\ndata: hi"));
    assert!(body.contains("event: end\ndata: 0"));

    let job_id = job.id;
    let log = wait_for(std::time::Duration::from_secs(5), || {
        let database = h.database();
        async move {
            database
                .recent_logs_for_job(job_id, 10)
                .await
                .ok()?
                .into_iter()
                .find(|l| l.end_time.is_some())
        }
    })
    .await
    .unwrap();

    let (status, body) = send(router(&h), "GET", &format!("/api/cron/jobs/{}/logs", job.id), None).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["data"][0]["status"], "SUCCESS");

    let (status, body) = send(
        router(&h),
        "GET",
        &format!("/api/cron/logs/{}/mail-preview", log.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<html>"));
    assert!(body.contains("echo"));
}

#[tokio::test]
async fn test_today_failures_lists_failed_runs() {
    let h = TestHarness::new().await.unwrap();
    let server = h.db.insert_server("retired", "10.0.0.9", true).await.unwrap();
    let job = h
        .db
        .insert_job("on-retired", JobType::Shell, scripts::ECHO_HI, server, None)
        .await
        .unwrap();
    h.strategies
        .get(JobType::Shell)
        .execute(job.clone(), None)
        .await
        .unwrap();

    let (status, body) = send(router(&h), "GET", "/api/cron/logs/today-failures", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    let failures = body["data"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["job_name"], "on-retired");
    assert_eq!(failures[0]["status"], "ERROR");
}

#[tokio::test]
async fn test_server_connection_test_stream() {
    let h = TestHarness::new().await.unwrap();
    let server = h.db.insert_server("local", "localhost", false).await.unwrap();

    let (status, body) = send(router(&h), "GET", &format!("/api/servers/{}/test/stream", server), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("data: cmd=echo ping"));
    assert!(body.contains("event: stdout\ndata: ping"));
    assert!(body.contains("event: end\ndata: 0"));

    let uri = format!("/api/servers/{}/test/stream?cmd=echo%20custom", server);
    let (_, body) = send(router(&h), "GET", &uri, None).await;
    assert!(body.contains("event: stdout\ndata: custom"));

    assert_eq!(h.connector.connect_attempts(), 2);
    let (status, _) = send(router(&h), "GET", "/api/servers/999/test/stream", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_database_connection_test_stream() {
    let h = TestHarness::new().await.unwrap();
    let target = h.db.insert_sqlite_database("scratch").await.unwrap();

    let (status, body) = send(
        router(&h),
        "GET",
        &format!("/api/databases/{}/test/stream", target),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("data: sql=SELECT 1"));
    assert!(body.contains("event: stdout\ndata: 1"));
    assert!(body.contains("event: end\ndata: 0"));
}
