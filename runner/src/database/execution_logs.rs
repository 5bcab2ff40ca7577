//! Execution log operations.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use super::records::{
    ExecStatus, ExecutionLogRecord, FailedExecutionRecord, JobRecord, ScriptRecord,
};
use super::{parse_column, Database};

/// Bounded text column of an execution log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogColumn {
    Output,
    Error,
}

impl LogColumn {
    fn name(&self) -> &'static str {
        match self {
            LogColumn::Output => "output_text",
            LogColumn::Error => "error_text",
        }
    }
}

const LOG_COLUMNS: &str = "id, job_id, connect_info, script_name, script_content, args_text, \
                           created_at, start_time, end_time, duration_ms, exit_code, status, \
                           output_text, error_text";

fn log_from_row(row: &SqliteRow) -> Result<ExecutionLogRecord> {
    Ok(ExecutionLogRecord {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        connect_info: row.try_get("connect_info")?,
        script_name: row.try_get("script_name")?,
        script_content: row.try_get("script_content")?,
        args_text: row.try_get("args_text")?,
        created_at: row.try_get("created_at")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        duration_ms: row.try_get("duration_ms")?,
        exit_code: row.try_get("exit_code")?,
        status: parse_column(row.try_get("status")?, "status")?,
        output_text: row.try_get("output_text")?,
        error_text: row.try_get("error_text")?,
    })
}

impl Database {
    /// Insert a RUNNING row with snapshots of the job's target and script
    pub async fn create_execution_log(
        &self,
        job: &JobRecord,
        connect_info: &str,
        script: Option<&ScriptRecord>,
        start_time: DateTime<Utc>,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO execution_logs (
                job_id, connect_info, script_name, script_content, args_text,
                created_at, start_time, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id)
        .bind(connect_info)
        .bind(script.map(|s| s.name.as_str()).unwrap_or(job.script_name.as_str()))
        .bind(script.map(|s| s.body.as_str()))
        .bind(&job.args_text)
        .bind(start_time)
        .bind(start_time)
        .bind(ExecStatus::Running.as_str())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Created execution log {} for job {}", id, job.id);
        Ok(id)
    }

    pub async fn read_log_text(&self, log_id: i64, column: LogColumn) -> Result<Option<String>> {
        let sql = format!("SELECT {} FROM execution_logs WHERE id = ?", column.name());
        let value: Option<Option<String>> = sqlx::query_scalar(&sql)
            .bind(log_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.flatten())
    }

    pub async fn write_log_text(&self, log_id: i64, column: LogColumn, text: &str) -> Result<()> {
        let sql = format!("UPDATE execution_logs SET {} = ? WHERE id = ?", column.name());
        sqlx::query(&sql)
            .bind(text)
            .bind(log_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Move a RUNNING row to its terminal status; returns false when the row
    /// was already terminal (or missing) and nothing changed.
    pub async fn finish_execution_log(
        &self,
        log_id: i64,
        end_time: DateTime<Utc>,
        exit_code: i32,
        status: ExecStatus,
        duration_ms: Option<i64>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE execution_logs
            SET end_time = ?, exit_code = ?, status = ?, duration_ms = ?, script_content = NULL
            WHERE id = ? AND status = 'RUNNING'
            "#,
        )
        .bind(end_time)
        .bind(exit_code)
        .bind(status.as_str())
        .bind(duration_ms)
        .bind(log_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_execution_log(&self, log_id: i64) -> Result<Option<ExecutionLogRecord>> {
        let sql = format!("SELECT {} FROM execution_logs WHERE id = ?", LOG_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(log_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(log_from_row).transpose()
    }

    pub async fn recent_logs_for_job(
        &self,
        job_id: i64,
        limit: i64,
    ) -> Result<Vec<ExecutionLogRecord>> {
        let sql = format!(
            "SELECT {} FROM execution_logs WHERE job_id = ? ORDER BY id DESC LIMIT ?",
            LOG_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(job_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(log_from_row).collect()
    }

    pub async fn count_logs_for_job(&self, job_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM execution_logs WHERE job_id = ?")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Terminal, non-successful runs created at or after `since`
    pub async fn failed_logs_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<FailedExecutionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT l.id AS log_id, l.job_id, j.name AS job_name, l.status, l.exit_code,
                   l.created_at, l.duration_ms
            FROM execution_logs l
            LEFT JOIN cron_jobs j ON j.id = l.job_id
            WHERE l.status NOT IN ('SUCCESS', 'RUNNING') AND l.created_at >= ?
            ORDER BY l.id DESC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(FailedExecutionRecord {
                    log_id: row.try_get("log_id")?,
                    job_id: row.try_get("job_id")?,
                    job_name: row.try_get("job_name")?,
                    status: parse_column(row.try_get("status")?, "status")?,
                    exit_code: row.try_get("exit_code")?,
                    created_at: row.try_get("created_at")?,
                    duration_ms: row.try_get("duration_ms")?,
                })
            })
            .collect()
    }
}
