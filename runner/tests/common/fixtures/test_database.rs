//! Test database utilities for in-memory SQLite testing

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use runner::database::{
    AuthType, Database, DatabaseRecord, JobRecord, JobType, NotifyBindingRecord, NotifyChannel,
    NotifyTargetRecord, ScriptRecord, ServerRecord,
};

use super::test_data::crons;

/// Test database wrapper around an initialized in-memory store
pub struct TestDatabase {
    pub database: Arc<Database>,
}

impl TestDatabase {
    /// Create a new in-memory test database
    pub async fn new() -> Result<Self> {
        Ok(Self {
            database: Arc::new(Database::in_memory().await?),
        })
    }

    pub fn database(&self) -> Arc<Database> {
        self.database.clone()
    }

    pub async fn insert_server(&self, name: &str, host: &str, disabled: bool) -> Result<i64> {
        self.database
            .insert_server(&ServerRecord {
                id: 0,
                name: name.to_string(),
                host: host.to_string(),
                port: 22,
                username: "ops".to_string(),
                auth_type: AuthType::Password,
                password: Some("secret".to_string()),
                private_key: None,
                passphrase: None,
                test_command: None,
                disabled,
            })
            .await
    }

    pub async fn insert_script(&self, name: &str, body: &str) -> Result<i64> {
        self.database
            .upsert_script(&ScriptRecord {
                id: 0,
                name: name.to_string(),
                body: body.to_string(),
                workdir: None,
                script_type: None,
                disabled: false,
            })
            .await
    }

    pub async fn insert_sqlite_database(&self, name: &str) -> Result<i64> {
        self.database
            .insert_database(&DatabaseRecord {
                id: 0,
                name: name.to_string(),
                db_type: "sqlite".to_string(),
                url: "sqlite::memory:".to_string(),
                username: None,
                password: None,
                test_sql: None,
                disabled: false,
            })
            .await
    }

    /// Insert an enabled job and return it with its assigned id
    pub async fn insert_job(
        &self,
        name: &str,
        job_type: JobType,
        script_name: &str,
        target_id: i64,
        timeout_seconds: Option<i64>,
    ) -> Result<JobRecord> {
        let now = Utc::now();
        let mut job = JobRecord {
            id: 0,
            name: name.to_string(),
            job_type,
            cron_expr: crons::NIGHTLY.to_string(),
            script_name: script_name.to_string(),
            server_id: (job_type == JobType::Shell).then_some(target_id),
            database_id: (job_type == JobType::Sql).then_some(target_id),
            args_text: None,
            timeout_seconds,
            disabled: false,
            description: None,
            created_at: now,
            updated_at: now,
        };
        job.id = self.database.insert_job(&job).await?;
        Ok(job)
    }

    pub async fn insert_email_binding(
        &self,
        job_id: i64,
        address: &str,
        trigger_statuses: &str,
    ) -> Result<i64> {
        self.insert_binding(job_id, NotifyChannel::Email, address, trigger_statuses)
            .await
    }

    pub async fn insert_binding(
        &self,
        job_id: i64,
        channel: NotifyChannel,
        address: &str,
        trigger_statuses: &str,
    ) -> Result<i64> {
        let target_id = self
            .database
            .insert_notify_target(&NotifyTargetRecord {
                id: 0,
                display_name: "Ops".to_string(),
                username: "ops".to_string(),
                channel,
                address: address.to_string(),
                disabled: false,
                verified: true,
            })
            .await?;

        self.database
            .insert_notify_binding(&NotifyBindingRecord {
                id: 0,
                job_id,
                target_id,
                trigger_statuses: trigger_statuses.to_string(),
                disabled: false,
            })
            .await
    }
}
