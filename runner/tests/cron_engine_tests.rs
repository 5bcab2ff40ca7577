//! Scheduler registry and lifecycle

mod common;

use common::fixtures::*;
use runner::database::{ExecStatus, JobType};
use runner::errors::ConfigError;
use runner::scheduler::{trigger_key, validate_cron};
use rstest::rstest;
use std::time::Duration;

#[tokio::test]
async fn test_register_is_idempotent() {
    let h = TestHarness::new().await.unwrap();
    let job = h
        .db
        .insert_job("nightly", JobType::Shell, scripts::ECHO_HI, 1, None)
        .await
        .unwrap();

    h.engine.register(&job).await.unwrap();
    h.engine.register(&job).await.unwrap();

    assert_eq!(h.engine.status().registered_tasks, 1);
    assert!(h.engine.is_registered(job.id).await);

    h.engine.unregister(job.id).await.unwrap();
    h.engine.unregister(job.id).await.unwrap();
    assert_eq!(h.engine.status().registered_tasks, 0);
}

#[tokio::test]
async fn test_invalid_cron_is_rejected_at_registration() {
    let h = TestHarness::new().await.unwrap();
    let mut job = h
        .db
        .insert_job("broken", JobType::Shell, scripts::ECHO_HI, 1, None)
        .await
        .unwrap();
    job.cron_expr = "not a cron".to_string();

    let err = h.engine.register(&job).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::InvalidCron { expr, .. }) if expr == "not a cron"
    ));
    assert_eq!(h.engine.status().registered_tasks, 0);
}

#[rstest]
#[case("0 0 2 * * *", true)]
#[case("*/10 * * * * *", true)]
#[case("0 */5 * * * *", true)]
#[case("every day", false)]
#[case("", false)]
#[tokio::test]
async fn test_cron_validation(#[case] expr: &str, #[case] valid: bool) {
    assert_eq!(validate_cron(expr).is_ok(), valid);
}

#[test]
fn test_trigger_key_format() {
    assert_eq!(trigger_key(42), "job-42");
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    let h = TestHarness::new().await.unwrap();
    h.db.insert_job("a", JobType::Shell, scripts::ECHO_HI, 1, None)
        .await
        .unwrap();
    h.db.insert_job("b", JobType::Shell, scripts::ECHO_HI, 1, None)
        .await
        .unwrap();

    let status = h.engine.start().await.unwrap();
    assert!(status.started);
    assert_eq!(status.status, "STARTED");
    assert_eq!(status.registered_tasks, 2);

    let again = h.engine.start().await.unwrap();
    assert_eq!(again, status);

    let stopped = h.engine.stop().await;
    assert!(!stopped.started);
    assert_eq!(stopped.status, "STOPPED");
    // Stopping keeps registrations
    assert_eq!(stopped.registered_tasks, 2);
    assert_eq!(h.engine.stop().await, stopped);
}

#[tokio::test]
async fn test_reload_registers_only_enabled_jobs() {
    let h = TestHarness::new().await.unwrap();
    let enabled = h
        .db
        .insert_job("enabled", JobType::Shell, scripts::ECHO_HI, 1, None)
        .await
        .unwrap();
    let disabled = h
        .db
        .insert_job("disabled", JobType::Shell, scripts::ECHO_HI, 1, None)
        .await
        .unwrap();
    h.database()
        .set_job_disabled(disabled.id, true)
        .await
        .unwrap();

    assert_eq!(h.engine.reload_all().await.unwrap(), 1);
    assert!(h.engine.is_registered(enabled.id).await);
    assert!(!h.engine.is_registered(disabled.id).await);
}

#[tokio::test]
async fn test_next_run_is_reported_for_registered_job() {
    let h = TestHarness::new().await.unwrap();
    let job = h
        .db
        .insert_job("nightly", JobType::Shell, scripts::ECHO_HI, 1, None)
        .await
        .unwrap();

    h.engine.start().await.unwrap();
    let next = h.engine.next_run(job.id).await;
    assert!(next.map(|t| t > chrono::Utc::now()).unwrap_or(false));
    assert!(h.engine.next_run(job.id + 100).await.is_none());
    h.engine.stop().await;
}

#[tokio::test]
async fn test_started_engine_fires_triggers() {
    let h = TestHarness::new().await.unwrap();
    let server = h.db.insert_server("local", "localhost", false).await.unwrap();
    h.db.insert_script(scripts::ECHO_HI, "echo hi").await.unwrap();
    let mut job = h
        .db
        .insert_job("every-second", JobType::Shell, scripts::ECHO_HI, server, None)
        .await
        .unwrap();
    job.cron_expr = crons::EVERY_SECOND.to_string();
    h.database().update_job(&job).await.unwrap();

    h.engine.start().await.unwrap();

    let database = h.database();
    let job_id = job.id;
    let finished = wait_for(Duration::from_secs(10), || {
        let database = database.clone();
        async move {
            database
                .recent_logs_for_job(job_id, 10)
                .await
                .ok()?
                .into_iter()
                .find(|log| log.status == ExecStatus::Success)
        }
    })
    .await;
    h.engine.stop().await;

    let log = finished.expect("scheduled run did not complete");
    assert_eq!(log.output_text.as_deref(), Some("hi\n"));
}

#[tokio::test]
async fn test_stopped_engine_does_not_fire() {
    let h = TestHarness::new().await.unwrap();
    let mut job = h
        .db
        .insert_job("every-second", JobType::Shell, scripts::ECHO_HI, 1, None)
        .await
        .unwrap();
    job.cron_expr = crons::EVERY_SECOND.to_string();
    h.database().update_job(&job).await.unwrap();

    h.engine.start().await.unwrap();
    h.engine.stop().await;
    tokio::time::sleep(Duration::from_millis(2500)).await;

    // Triggers may still tick, but nothing runs while stopped
    let logs = h.database().recent_logs_for_job(job.id, 10).await.unwrap();
    assert!(logs.is_empty());
}

#[tokio::test]
async fn test_concurrent_registers_leave_one_trigger() {
    let h = TestHarness::new().await.unwrap();
    // Every fire on a disabled server records one ERROR row without running
    let server = h.db.insert_server("retired", "10.0.0.9", true).await.unwrap();
    let mut job = h
        .db
        .insert_job("every-second", JobType::Shell, scripts::ECHO_HI, server, None)
        .await
        .unwrap();
    job.cron_expr = crons::EVERY_SECOND.to_string();
    h.database().update_job(&job).await.unwrap();

    h.engine.start().await.unwrap();
    let (first, second) = tokio::join!(h.engine.register(&job), h.engine.register(&job));
    first.unwrap();
    second.unwrap();
    assert_eq!(h.engine.status().registered_tasks, 1);

    tokio::time::sleep(Duration::from_millis(3200)).await;
    let fired = h.database().count_logs_for_job(job.id).await.unwrap();
    // One trigger fires at most once per second
    assert!(fired <= 4, "{} runs in ~3s", fired);

    h.engine.unregister(job.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let after_unregister = h.database().count_logs_for_job(job.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2200)).await;
    h.engine.stop().await;

    assert_eq!(
        h.database().count_logs_for_job(job.id).await.unwrap(),
        after_unregister,
        "a trigger kept firing after unregister"
    );
}
