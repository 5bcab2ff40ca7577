//! Notification binding, target and notify-log operations.

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::records::{
    ExecStatus, NotifyBindingRecord, NotifyLogId, NotifyLogRecord, NotifyStatus,
    NotifyTargetRecord,
};
use super::{parse_column, Database};

fn notify_log_from_row(row: &SqliteRow) -> Result<NotifyLogRecord> {
    let status: String = row.try_get("status")?;
    Ok(NotifyLogRecord {
        id: row.try_get("id")?,
        binding_id: row.try_get("binding_id")?,
        execution_log_id: row.try_get("execution_log_id")?,
        username: row.try_get("username")?,
        channel: parse_column(row.try_get("channel")?, "channel")?,
        address: row.try_get("address")?,
        job_name: row.try_get("job_name")?,
        exec_status: parse_column(row.try_get("exec_status")?, "exec_status")?,
        status: match status.as_str() {
            "SUCCESS" => NotifyStatus::Success,
            "FAIL" => NotifyStatus::Fail,
            _ => NotifyStatus::Running,
        },
        message: row.try_get("message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl Database {
    pub async fn insert_notify_target(&self, target: &NotifyTargetRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO notify_targets (display_name, username, channel, address, disabled, verified)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&target.display_name)
        .bind(&target.username)
        .bind(target.channel.as_str())
        .bind(&target.address)
        .bind(target.disabled)
        .bind(target.verified)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_notify_target(&self, target_id: i64) -> Result<Option<NotifyTargetRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, display_name, username, channel, address, disabled, verified
            FROM notify_targets WHERE id = ?
            "#,
        )
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(NotifyTargetRecord {
                id: row.try_get("id")?,
                display_name: row.try_get("display_name")?,
                username: row.try_get("username")?,
                channel: parse_column(row.try_get("channel")?, "channel")?,
                address: row.try_get("address")?,
                disabled: row.try_get("disabled")?,
                verified: row.try_get("verified")?,
            })),
            None => Ok(None),
        }
    }

    pub async fn insert_notify_binding(&self, binding: &NotifyBindingRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO job_notify_bindings (job_id, target_id, trigger_statuses, disabled)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(binding.job_id)
        .bind(binding.target_id)
        .bind(&binding.trigger_statuses)
        .bind(binding.disabled)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn list_notify_bindings_for_job(
        &self,
        job_id: i64,
    ) -> Result<Vec<NotifyBindingRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, job_id, target_id, trigger_statuses, disabled
            FROM job_notify_bindings WHERE job_id = ? ORDER BY id
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(NotifyBindingRecord {
                    id: row.try_get("id")?,
                    job_id: row.try_get("job_id")?,
                    target_id: row.try_get("target_id")?,
                    trigger_statuses: row.try_get("trigger_statuses")?,
                    disabled: row.try_get("disabled")?,
                })
            })
            .collect()
    }

    /// Record a dispatch attempt in RUNNING state
    pub async fn create_notify_log(
        &self,
        binding: &NotifyBindingRecord,
        execution_log_id: i64,
        target: &NotifyTargetRecord,
        job_name: &str,
        exec_status: ExecStatus,
    ) -> Result<NotifyLogId> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO notify_logs (
                binding_id, execution_log_id, username, channel, address, job_name,
                exec_status, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(binding.id)
        .bind(execution_log_id)
        .bind(&target.username)
        .bind(target.channel.as_str())
        .bind(&target.address)
        .bind(job_name)
        .bind(exec_status.as_str())
        .bind(NotifyStatus::Running.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(NotifyLogId(result.last_insert_rowid()))
    }

    pub async fn complete_notify_log(
        &self,
        id: NotifyLogId,
        status: NotifyStatus,
        message: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE notify_logs SET status = ?, message = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(message)
            .bind(Utc::now())
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_notify_logs_for_execution(
        &self,
        execution_log_id: i64,
    ) -> Result<Vec<NotifyLogRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, binding_id, execution_log_id, username, channel, address, job_name,
                   exec_status, status, message, created_at, updated_at
            FROM notify_logs WHERE execution_log_id = ? ORDER BY id
            "#,
        )
        .bind(execution_log_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(notify_log_from_row).collect()
    }
}
