//! Durable execution log writer.
//!
//! Every run owns one `execution_logs` row: created RUNNING at start, grown
//! with bounded stdout/stderr appends, and finalized exactly once. Finalizing
//! hands the outcome to the notification dispatcher.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::sink::ExecSink;
use crate::constants::{exit_codes, log_limits};
use crate::database::{Database, ExecStatus, JobRecord, LogColumn, ScriptRecord};
use crate::services::notify::NotifyDispatcher;

/// Append `text` (newline-terminated) to `current`, keeping the result within
/// the column bound. Returns `None` when the column is already full and the
/// append must be dropped.
pub fn append_bounded(current: &str, text: &str) -> Option<String> {
    if current.len() >= log_limits::MAX_TEXT_BYTES
        || current.ends_with(log_limits::TRUNCATED_MARKER)
    {
        return None;
    }

    let mut combined = String::with_capacity(current.len() + text.len() + 1);
    combined.push_str(current);
    combined.push_str(text);
    if !text.ends_with('\n') {
        combined.push('\n');
    }

    if combined.len() <= log_limits::MAX_TEXT_BYTES {
        return Some(combined);
    }

    let mut keep = log_limits::MAX_TEXT_BYTES - log_limits::TRUNCATED_MARKER.len();
    while !combined.is_char_boundary(keep) {
        keep -= 1;
    }
    combined.truncate(keep);
    combined.push_str(log_limits::TRUNCATED_MARKER);
    Some(combined)
}

/// Milliseconds between start and end; absent when the start is unknown or
/// the clock went backwards.
pub fn duration_ms(start: Option<DateTime<Utc>>, end: DateTime<Utc>) -> Option<i64> {
    let start = start?;
    let millis = (end - start).num_milliseconds();
    (millis >= 0).then_some(millis)
}

pub struct ExecutionLogService {
    database: Arc<Database>,
    notifier: Arc<NotifyDispatcher>,
}

impl ExecutionLogService {
    pub fn new(database: Arc<Database>, notifier: Arc<NotifyDispatcher>) -> Self {
        Self { database, notifier }
    }

    /// Open a RUNNING record and return its id with the recorded start time
    pub async fn create_start_log(
        &self,
        job: &JobRecord,
        connect_info: &str,
        script: Option<&ScriptRecord>,
    ) -> Result<(i64, DateTime<Utc>)> {
        let start_time = Utc::now();
        let log_id = self
            .database
            .create_execution_log(job, connect_info, script, start_time)
            .await?;
        debug!("Execution log {} opened for job {}", log_id, job.name);
        Ok((log_id, start_time))
    }

    pub async fn append_out(&self, log_id: i64, text: &str) {
        self.append(log_id, LogColumn::Output, text).await;
    }

    pub async fn append_err(&self, log_id: i64, text: &str) {
        self.append(log_id, LogColumn::Error, text).await;
    }

    async fn append(&self, log_id: i64, column: LogColumn, text: &str) {
        let current = match self.database.read_log_text(log_id, column).await {
            Ok(current) => current.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to read log {} before append: {}", log_id, e);
                return;
            }
        };

        let Some(updated) = append_bounded(&current, text) else {
            return;
        };

        if let Err(e) = self.database.write_log_text(log_id, column, &updated).await {
            warn!("Failed to append to log {}: {}", log_id, e);
        }
    }

    /// Finalize the record and dispatch notifications. Errors are logged,
    /// never returned; a second finish on the same record is ignored.
    pub async fn finish(
        &self,
        log_id: i64,
        exit_code: i32,
        status: ExecStatus,
        start_time: Option<DateTime<Utc>>,
    ) {
        let end_time = Utc::now();
        let duration = duration_ms(start_time, end_time);

        match self
            .database
            .finish_execution_log(log_id, end_time, exit_code, status, duration)
            .await
        {
            Ok(true) => info!(
                "Execution log {} finished: {} (exit {}, {:?} ms)",
                log_id, status, exit_code, duration
            ),
            Ok(false) => {
                debug!("Execution log {} already finalized, ignoring {}", log_id, status);
                return;
            }
            Err(e) => {
                error!("Failed to finalize execution log {}: {}", log_id, e);
                return;
            }
        }

        let job_id = match self.database.get_execution_log(log_id).await {
            Ok(Some(log)) => log.job_id,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to reload execution log {} for notify: {}", log_id, e);
                return;
            }
        };

        if let Err(e) = self.notifier.dispatch(job_id, log_id, status).await {
            warn!("Notification dispatch for log {} failed: {}", log_id, e);
        }
    }
}

/// Sink that persists a run into its execution log row
pub struct DurableLogSink {
    logs: Arc<ExecutionLogService>,
    log_id: i64,
    start_time: DateTime<Utc>,
    // Serializes appends of this run; stdout and stderr pumps run concurrently
    write_lock: Mutex<()>,
}

impl DurableLogSink {
    pub fn new(logs: Arc<ExecutionLogService>, log_id: i64, start_time: DateTime<Utc>) -> Self {
        Self {
            logs,
            log_id,
            start_time,
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl ExecSink for DurableLogSink {
    async fn meta(&self, _line: &str) {}

    async fn stdout(&self, line: &str) {
        let _guard = self.write_lock.lock().await;
        self.logs.append_out(self.log_id, line).await;
    }

    async fn stderr(&self, line: &str) {
        let _guard = self.write_lock.lock().await;
        self.logs.append_err(self.log_id, line).await;
    }

    async fn end(&self, exit_code: i32) {
        let _guard = self.write_lock.lock().await;
        self.logs
            .finish(
                self.log_id,
                exit_code,
                ExecStatus::from_exit_code(exit_code),
                Some(self.start_time),
            )
            .await;
    }

    async fn error(&self, cause: &str) {
        let _guard = self.write_lock.lock().await;
        self.logs
            .append_err(self.log_id, &format!("[exception] {}", cause))
            .await;
        self.logs
            .finish(
                self.log_id,
                exit_codes::FAILURE,
                ExecStatus::Error,
                Some(self.start_time),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn append_normalizes_trailing_newline() {
        assert_eq!(append_bounded("", "hi").as_deref(), Some("hi\n"));
        assert_eq!(append_bounded("a\n", "b\n").as_deref(), Some("a\nb\n"));
    }

    #[test]
    fn overflow_truncates_with_marker_within_bound() {
        let current = "x".repeat(log_limits::MAX_TEXT_BYTES - 10);
        let result = append_bounded(&current, &"y".repeat(100)).unwrap();
        assert!(result.len() <= log_limits::MAX_TEXT_BYTES);
        assert!(result.ends_with(log_limits::TRUNCATED_MARKER));
    }

    #[test]
    fn truncated_column_drops_further_appends() {
        let current = "x".repeat(log_limits::MAX_TEXT_BYTES - 10);
        let truncated = append_bounded(&current, &"y".repeat(100)).unwrap();
        assert_eq!(append_bounded(&truncated, "more"), None);

        let full = "z".repeat(log_limits::MAX_TEXT_BYTES);
        assert_eq!(append_bounded(&full, "more"), None);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let current = "x".repeat(log_limits::MAX_TEXT_BYTES - 20);
        let result = append_bounded(&current, &"é".repeat(50)).unwrap();
        assert!(result.len() <= log_limits::MAX_TEXT_BYTES);
        assert!(result.ends_with(log_limits::TRUNCATED_MARKER));
    }

    #[test]
    fn duration_is_absent_without_start_or_when_negative() {
        let now = Utc::now();
        assert_eq!(duration_ms(None, now), None);
        assert_eq!(duration_ms(Some(now + Duration::seconds(5)), now), None);
        assert_eq!(duration_ms(Some(now - Duration::milliseconds(1500)), now), Some(1500));
    }
}
