//! Job definition management: save with validation, pause/resume and the
//! job list with runtime status.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::constants::jobs;
use crate::database::{Database, JobRecord, JobRuntimeStatus, JobType};
use crate::errors::{ConfigError, ResolutionError};
use crate::exec::{ExecTicket, LiveStreamSink, StrategyRegistry};
use crate::scheduler::{validate_cron, CronEngine};

/// Create (no `id`) or update request for a job definition
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSaveRequest {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub job_type: Option<String>,
    pub cron_expr: Option<String>,
    pub script_name: Option<String>,
    pub server_id: Option<i64>,
    pub database_id: Option<i64>,
    pub args_text: Option<String>,
    pub timeout_seconds: Option<i64>,
    pub disabled: Option<bool>,
    pub description: Option<String>,
}

/// Job as shown in the list view
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: JobRecord,
    pub runtime_status: JobRuntimeStatus,
    pub next_run: Option<DateTime<Utc>>,
}

pub struct JobService {
    database: Arc<Database>,
    engine: Arc<CronEngine>,
    strategies: Arc<StrategyRegistry>,
}

fn required(value: Option<String>, field: &str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingField {
            field: field.to_string(),
        })
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl JobService {
    pub fn new(
        database: Arc<Database>,
        engine: Arc<CronEngine>,
        strategies: Arc<StrategyRegistry>,
    ) -> Self {
        Self {
            database,
            engine,
            strategies,
        }
    }

    /// Validate a save request into a record; `id` is 0 for new jobs
    pub fn validate(request: JobSaveRequest) -> Result<JobRecord, ConfigError> {
        let name = required(request.name, "name")?;
        let cron_expr = required(request.cron_expr, "cron_expr")?;
        let script_name = required(request.script_name, "script_name")?;
        let job_type: JobType = required(request.job_type, "job_type")?
            .to_uppercase()
            .parse()
            .map_err(|reason| ConfigError::InvalidValue {
                field: "job_type".to_string(),
                reason,
            })?;

        validate_cron(&cron_expr)?;

        match job_type {
            JobType::Shell if request.server_id.is_none() => {
                return Err(ConfigError::MissingField {
                    field: "server_id".to_string(),
                })
            }
            JobType::Sql if request.database_id.is_none() => {
                return Err(ConfigError::MissingField {
                    field: "database_id".to_string(),
                })
            }
            _ => {}
        }

        if let Some(timeout) = request.timeout_seconds {
            if !(jobs::MIN_TIMEOUT_SECONDS..=jobs::MAX_TIMEOUT_SECONDS).contains(&timeout) {
                return Err(ConfigError::InvalidValue {
                    field: "timeout_seconds".to_string(),
                    reason: format!(
                        "must be between {} and {}",
                        jobs::MIN_TIMEOUT_SECONDS,
                        jobs::MAX_TIMEOUT_SECONDS
                    ),
                });
            }
        }

        let now = Utc::now();
        Ok(JobRecord {
            id: request.id.unwrap_or(0),
            name,
            job_type,
            cron_expr,
            script_name,
            server_id: request.server_id.filter(|_| job_type == JobType::Shell),
            database_id: request.database_id.filter(|_| job_type == JobType::Sql),
            args_text: optional_text(request.args_text),
            timeout_seconds: request.timeout_seconds,
            disabled: request.disabled.unwrap_or(false),
            description: optional_text(request.description),
            created_at: now,
            updated_at: now,
        })
    }

    /// Persist a job and bring its trigger in line with its enabled flag
    #[instrument(skip(self, request))]
    pub async fn save(&self, request: JobSaveRequest) -> Result<JobRecord> {
        let mut job = Self::validate(request)?;

        if let Some(existing) = self.database.find_job_by_name(&job.name).await? {
            if existing.id != job.id {
                return Err(ConfigError::DuplicateName { name: job.name }.into());
            }
        }

        if job.id == 0 {
            job.id = self.database.insert_job(&job).await?;
            info!("Created job {} ({})", job.name, job.id);
        } else {
            let previous = self
                .database
                .get_job(job.id)
                .await?
                .ok_or(ResolutionError::JobNotFound { job_id: job.id })?;
            job.created_at = previous.created_at;
            self.database.update_job(&job).await?;
            info!("Updated job {} ({})", job.name, job.id);
        }

        if job.disabled {
            self.engine.unregister(job.id).await?;
        } else {
            self.engine.register(&job).await?;
        }

        Ok(job)
    }

    pub async fn get(&self, job_id: i64) -> Result<JobRecord> {
        Ok(self
            .database
            .get_job(job_id)
            .await?
            .ok_or(ResolutionError::JobNotFound { job_id })?)
    }

    /// Disable the job and drop its trigger
    pub async fn pause(&self, job_id: i64) -> Result<JobRecord> {
        let mut job = self.get(job_id).await?;
        self.database.set_job_disabled(job_id, true).await?;
        self.engine.unregister(job_id).await?;
        job.disabled = true;
        info!("Paused job {}", job.name);
        Ok(job)
    }

    /// Enable the job and register its trigger
    pub async fn resume(&self, job_id: i64) -> Result<JobRecord> {
        let mut job = self.get(job_id).await?;
        self.database.set_job_disabled(job_id, false).await?;
        job.disabled = false;
        self.engine.register(&job).await?;
        info!("Resumed job {}", job.name);
        Ok(job)
    }

    pub async fn list(&self) -> Result<Vec<JobView>> {
        let started = self.engine.is_started();
        let mut views = Vec::new();
        for job in self.database.list_jobs().await? {
            let registered = self.engine.is_registered(job.id).await;
            let next_run = if registered && started {
                self.engine.next_run(job.id).await
            } else {
                None
            };
            views.push(JobView {
                runtime_status: JobRuntimeStatus::derive(job.disabled, registered, started),
                next_run,
                job,
            });
        }
        Ok(views)
    }

    /// Run a job now, streaming its events to `live`
    pub async fn run_once(&self, job_id: i64, live: LiveStreamSink) -> Result<ExecTicket> {
        let job = self.get(job_id).await?;
        info!("Manual run of job {}", job.name);
        self.strategies.get(job.job_type).execute(job, Some(live)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> JobSaveRequest {
        JobSaveRequest {
            name: Some("nightly-backup".to_string()),
            job_type: Some("shell".to_string()),
            cron_expr: Some("0 0 2 * * *".to_string()),
            script_name: Some("backup".to_string()),
            server_id: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn valid_request_becomes_record() {
        let job = JobService::validate(request()).unwrap();
        assert_eq!(job.id, 0);
        assert_eq!(job.job_type, JobType::Shell);
        assert_eq!(job.server_id, Some(1));
        assert!(!job.disabled);
    }

    #[test]
    fn missing_fields_are_named() {
        let mut req = request();
        req.script_name = Some("  ".to_string());
        match JobService::validate(req) {
            Err(ConfigError::MissingField { field }) => assert_eq!(field, "script_name"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn shell_job_needs_server() {
        let mut req = request();
        req.server_id = None;
        assert!(matches!(
            JobService::validate(req),
            Err(ConfigError::MissingField { field }) if field == "server_id"
        ));
    }

    #[test]
    fn timeout_out_of_range_is_rejected() {
        let mut req = request();
        req.timeout_seconds = Some(0);
        assert!(matches!(
            JobService::validate(req),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn malformed_cron_is_rejected() {
        let mut req = request();
        req.cron_expr = Some("every day".to_string());
        assert!(matches!(
            JobService::validate(req),
            Err(ConfigError::InvalidCron { .. })
        ));
    }
}
