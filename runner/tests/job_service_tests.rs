//! Job definition management through the job service

mod common;

use common::fixtures::*;
use runner::database::JobRuntimeStatus;
use runner::errors::ConfigError;
use runner::services::JobSaveRequest;

fn shell_request(name: &str, server_id: i64) -> JobSaveRequest {
    JobSaveRequest {
        name: Some(name.to_string()),
        job_type: Some("SHELL".to_string()),
        cron_expr: Some(crons::NIGHTLY.to_string()),
        script_name: Some(scripts::ECHO_HI.to_string()),
        server_id: Some(server_id),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_save_creates_and_registers() {
    let h = TestHarness::new().await.unwrap();
    let job = h.job_service.save(shell_request("nightly", 1)).await.unwrap();

    assert!(job.id > 0);
    assert!(h.engine.is_registered(job.id).await);
    let stored = h.database().get_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "nightly");
    assert_eq!(stored.cron_expr, crons::NIGHTLY);
}

#[tokio::test]
async fn test_duplicate_name_is_rejected() {
    let h = TestHarness::new().await.unwrap();
    h.job_service.save(shell_request("nightly", 1)).await.unwrap();

    let err = h
        .job_service
        .save(shell_request("nightly", 2))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::DuplicateName { name }) if name == "nightly"
    ));
}

#[tokio::test]
async fn test_update_keeps_identity_and_may_keep_name() {
    let h = TestHarness::new().await.unwrap();
    let job = h.job_service.save(shell_request("nightly", 1)).await.unwrap();

    let mut update = shell_request("nightly", 1);
    update.id = Some(job.id);
    update.cron_expr = Some("0 30 3 * * *".to_string());
    let updated = h.job_service.save(update).await.unwrap();

    assert_eq!(updated.id, job.id);
    let stored = h.database().get_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.cron_expr, "0 30 3 * * *");
    assert_eq!(h.engine.status().registered_tasks, 1);
}

#[tokio::test]
async fn test_saving_disabled_job_unregisters() {
    let h = TestHarness::new().await.unwrap();
    let job = h.job_service.save(shell_request("nightly", 1)).await.unwrap();
    assert!(h.engine.is_registered(job.id).await);

    let mut update = shell_request("nightly", 1);
    update.id = Some(job.id);
    update.disabled = Some(true);
    h.job_service.save(update).await.unwrap();

    assert!(!h.engine.is_registered(job.id).await);
}

#[tokio::test]
async fn test_invalid_cron_is_rejected_before_persisting() {
    let h = TestHarness::new().await.unwrap();
    let mut request = shell_request("broken", 1);
    request.cron_expr = Some("61 * * * * *".to_string());

    let err = h.job_service.save(request).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::InvalidCron { .. })
    ));
    assert!(h.database().list_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pause_and_resume() {
    let h = TestHarness::new().await.unwrap();
    let job = h.job_service.save(shell_request("nightly", 1)).await.unwrap();

    let paused = h.job_service.pause(job.id).await.unwrap();
    assert!(paused.disabled);
    assert!(!h.engine.is_registered(job.id).await);
    assert!(h.database().get_job(job.id).await.unwrap().unwrap().disabled);

    let resumed = h.job_service.resume(job.id).await.unwrap();
    assert!(!resumed.disabled);
    assert!(h.engine.is_registered(job.id).await);
}

#[tokio::test]
async fn test_list_reports_runtime_status() {
    let h = TestHarness::new().await.unwrap();
    let active = h.job_service.save(shell_request("active", 1)).await.unwrap();
    let paused = h.job_service.save(shell_request("paused", 1)).await.unwrap();
    h.job_service.pause(paused.id).await.unwrap();

    let status_of = |views: &[runner::services::JobView], id: i64| {
        views
            .iter()
            .find(|v| v.job.id == id)
            .map(|v| (v.runtime_status, v.next_run.is_some()))
    };

    let views = h.job_service.list().await.unwrap();
    assert_eq!(status_of(&views, active.id), Some((JobRuntimeStatus::Ready, false)));
    assert_eq!(status_of(&views, paused.id), Some((JobRuntimeStatus::Disabled, false)));

    h.engine.start().await.unwrap();
    let views = h.job_service.list().await.unwrap();
    assert_eq!(status_of(&views, active.id), Some((JobRuntimeStatus::Running, true)));
    h.engine.stop().await;
}

#[tokio::test]
async fn test_unknown_job_cannot_be_paused() {
    let h = TestHarness::new().await.unwrap();
    assert!(h.job_service.pause(999).await.is_err());
}
