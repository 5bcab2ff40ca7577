//! Outcome notifications.
//!
//! When an execution log reaches a terminal status, every enabled binding of
//! the job whose trigger set contains that status gets one message. E-mail
//! attempts are recorded as notify-log rows and completed asynchronously on
//! the mail pool.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::mailer::{MessageSender, SendRequest, SendResult};
use super::render;
use crate::constants::jobs;
use crate::database::{
    Database, ExecStatus, NotifyBindingRecord, NotifyChannel, NotifyLogId, NotifyStatus,
};
use crate::errors::NotifyError;
use crate::exec::ExecPool;

pub struct NotifyDispatcher {
    database: Arc<Database>,
    sender: Arc<dyn MessageSender>,
    mail_pool: Arc<ExecPool>,
}

impl NotifyDispatcher {
    pub fn new(
        database: Arc<Database>,
        sender: Arc<dyn MessageSender>,
        mail_pool: Arc<ExecPool>,
    ) -> Self {
        Self {
            database,
            sender,
            mail_pool,
        }
    }

    /// Dispatch notifications for a finished execution; returns how many
    /// bindings matched.
    pub async fn dispatch(&self, job_id: i64, log_id: i64, status: ExecStatus) -> Result<usize> {
        let bindings: Vec<NotifyBindingRecord> = self
            .database
            .list_notify_bindings_for_job(job_id)
            .await?
            .into_iter()
            .filter(|b| !b.disabled)
            .collect();

        if bindings.is_empty() {
            return Ok(0);
        }

        let job_name = match self.database.get_job(job_id).await {
            Ok(Some(job)) => job.name,
            _ => jobs::UNKNOWN_TARGET.to_string(),
        };

        let mut matched = 0;
        for binding in bindings.iter().filter(|b| b.triggers_on(status)) {
            matched += 1;
            if let Err(e) = self.dispatch_binding(binding, log_id, &job_name, status).await {
                warn!(
                    "Notify binding {} for job {} failed: {}",
                    binding.id, job_name, e
                );
            }
        }

        debug!(
            "Job {} finished {}: {} of {} bindings matched",
            job_name,
            status,
            matched,
            bindings.len()
        );
        Ok(matched)
    }

    async fn dispatch_binding(
        &self,
        binding: &NotifyBindingRecord,
        log_id: i64,
        job_name: &str,
        status: ExecStatus,
    ) -> Result<()> {
        let target = self
            .database
            .get_notify_target(binding.target_id)
            .await?
            .ok_or(NotifyError::TargetNotFound {
                target_id: binding.target_id,
            })?;

        if target.disabled {
            debug!("Notify target {} disabled, skipping", target.id);
            return Ok(());
        }

        match target.channel {
            NotifyChannel::Email => {
                let notify_log_id = self
                    .database
                    .create_notify_log(binding, log_id, &target, job_name, status)
                    .await?;

                // From here on every failure completes the row as FAIL
                let (subject, html) = match self.database.get_execution_log(log_id).await {
                    Ok(Some(log)) => (
                        render::subject(job_name, &log),
                        render::render_execution_log(job_name, &log),
                    ),
                    Ok(None) => (
                        format!("[{}] cron job {}", status, job_name),
                        String::new(),
                    ),
                    Err(e) => {
                        warn!("Failed to render execution log {}: {}", log_id, e);
                        let result = SendResult::failed(format!("render failed: {}", e));
                        complete_notify_log(&self.database, notify_log_id, result).await;
                        return Ok(());
                    }
                };

                let request = SendRequest {
                    correlation_id: notify_log_id,
                    to: target.address.clone(),
                    subject,
                    html,
                };

                let sender = self.sender.clone();
                let database = self.database.clone();
                self.mail_pool
                    .submit_or_run(async move {
                        let result = sender.send(request).await;
                        complete_notify_log(&database, notify_log_id, result).await;
                    })
                    .await;
            }
            NotifyChannel::Phone => {
                debug!(
                    "Phone notification to {} for job {} not delivered: channel not implemented",
                    target.address, job_name
                );
            }
        }

        Ok(())
    }
}

async fn complete_notify_log(database: &Database, id: NotifyLogId, result: SendResult) {
    let status = if result.is_success() {
        NotifyStatus::Success
    } else {
        warn!(
            "Notify log {}: {}",
            id,
            NotifyError::SendFailed {
                reason: result.message.clone()
            }
        );
        NotifyStatus::Fail
    };

    match database.complete_notify_log(id, status, &result.message).await {
        Ok(()) => info!("Notify log {} completed: {}", id, status.as_str()),
        Err(e) => warn!("Failed to complete notify log {}: {}", id, e),
    }
}
