//! SQL jobs: run a single validation query and judge its first column.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Connection, Row};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::pool::ExecPool;
use super::preflight;
use super::sink::{ExecSink, LiveStreamSink};
use super::{ExecContext, ExecTicket, ExecutionStrategy};
use crate::constants::exit_codes;
use crate::database::{DatabaseRecord, JobRecord, JobType, ScriptRecord};

pub struct SqlStrategy {
    ctx: Arc<ExecContext>,
    pool: Arc<ExecPool>,
}

impl SqlStrategy {
    pub fn new(ctx: Arc<ExecContext>, pool: Arc<ExecPool>) -> Self {
        sqlx::any::install_default_drivers();
        Self { ctx, pool }
    }
}

#[async_trait]
impl ExecutionStrategy for SqlStrategy {
    fn job_type(&self) -> JobType {
        JobType::Sql
    }

    #[instrument(skip(self, job, live), fields(job = %job.name))]
    async fn execute(&self, job: JobRecord, live: Option<LiveStreamSink>) -> Result<ExecTicket> {
        let Some(resolved) = preflight::resolve_database(&self.ctx, &job, live).await? else {
            return Ok(ExecTicket::rejected());
        };

        let handle = self
            .pool
            .submit(run_sql(job, resolved.target, resolved.script, resolved.sink))
            .await?;
        Ok(ExecTicket::running(handle))
    }
}

/// Verdict of the validation query's first column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlVerdict {
    Pass,
    Fail(String),
    Invalid(String),
    NoResult,
}

pub fn judge_first_column(value: Option<&str>) -> SqlVerdict {
    match value {
        None => SqlVerdict::NoResult,
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" => SqlVerdict::Pass,
            "false" | "0" => SqlVerdict::Fail(raw.trim().to_string()),
            _ => SqlVerdict::Invalid(raw.trim().to_string()),
        },
    }
}

async fn run_sql(
    job: JobRecord,
    database: DatabaseRecord,
    script: ScriptRecord,
    sink: Arc<dyn ExecSink>,
) {
    info!("Running SQL job {} against {}", job.name, database.name);
    sink.meta(&format!("database={}", database.name)).await;

    let sql = script.body.trim();
    if sql.is_empty() {
        sink.stderr("no SQL to execute").await;
        sink.end(exit_codes::FAILURE).await;
        return;
    }

    let mut conn = match AnyConnection::connect(&connection_url(&database)).await {
        Ok(conn) => conn,
        Err(e) => {
            warn!("SQL job {} could not connect: {}", job.name, e);
            sink.error(&format!("connect to {} failed: {}", database.name, e))
                .await;
            return;
        }
    };

    let row = sqlx::query(sql).fetch_optional(&mut conn).await;
    let _ = conn.close().await;

    let row = match row {
        Ok(row) => row,
        Err(e) => {
            sink.error(&format!("query failed: {}", e)).await;
            return;
        }
    };

    let first = match row.as_ref().map(first_column_text) {
        Some(Some(value)) => Some(value),
        Some(None) => {
            sink.stderr("invalid result: first column is empty").await;
            sink.end(exit_codes::FAILURE).await;
            return;
        }
        None => None,
    };

    match judge_first_column(first.as_deref()) {
        SqlVerdict::Pass => {
            sink.stdout(&format!("result={}", first.unwrap_or_default()))
                .await;
            sink.end(exit_codes::SUCCESS).await;
        }
        SqlVerdict::Fail(value) => {
            sink.stderr(&format!("check failed: result={}", value)).await;
            sink.end(exit_codes::FAILURE).await;
        }
        SqlVerdict::Invalid(value) => {
            sink.stderr(&format!("invalid result: {}", value)).await;
            sink.end(exit_codes::FAILURE).await;
        }
        SqlVerdict::NoResult => {
            sink.stderr("no result").await;
            sink.end(exit_codes::FAILURE).await;
        }
    }
}

/// Render a column as text whatever its database type; `None` for NULL or
/// types without a text form.
pub fn column_text(row: &AnyRow, index: usize) -> Option<String> {
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value;
    }
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map(|v| v.to_string());
    }
    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return value.map(|v| v.to_string());
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return value.map(float_text);
    }
    None
}

/// Floats keep their fractional part, so `1.0` never reads as `1`.
fn float_text(value: f64) -> String {
    format!("{:?}", value)
}

fn first_column_text(row: &AnyRow) -> Option<String> {
    column_text(row, 0)
}

/// Connection URL with stored credentials, unless the URL already carries them
pub fn connection_url(database: &DatabaseRecord) -> String {
    if database.url.contains('@') || database.url.starts_with("sqlite:") {
        return database.url.clone();
    }
    let Some(username) = database.username.as_deref().filter(|u| !u.is_empty()) else {
        return database.url.clone();
    };

    let Ok(mut url) = reqwest::Url::parse(&database.url) else {
        return database.url.clone();
    };
    if url.set_username(username).is_err() {
        return database.url.clone();
    }
    if let Some(password) = database.password.as_deref() {
        if url.set_password(Some(password)).is_err() {
            return database.url.clone();
        }
    }
    url.to_string()
}
