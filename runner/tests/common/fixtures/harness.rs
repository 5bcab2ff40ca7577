//! Fully wired runner over an in-memory store and the local shell transport

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use runner::config::PoolConfig;
use runner::database::{Database, ExecutionLogRecord};
use runner::exec::{
    ExecContext, ExecPool, ExecutionLogService, ShellSettings, ShellStrategy, SqlStrategy,
    StrategyRegistry,
};
use runner::scheduler::CronEngine;
use runner::services::{ConnectionTester, JobService, MessageSender, NotifyDispatcher};

use super::local_shell::LocalShellConnector;
use super::recording_sender::RecordingSender;
use super::test_database::TestDatabase;

const POOL: PoolConfig = PoolConfig {
    concurrency: 4,
    queue_capacity: 16,
};

pub struct TestHarness {
    pub db: TestDatabase,
    pub connector: LocalShellConnector,
    pub sender: RecordingSender,
    pub notifier: Arc<NotifyDispatcher>,
    pub logs: Arc<ExecutionLogService>,
    pub ctx: Arc<ExecContext>,
    pub strategies: Arc<StrategyRegistry>,
    pub engine: Arc<CronEngine>,
    pub job_service: Arc<JobService>,
    pub connection_tester: Arc<ConnectionTester>,
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        Self::with_sender(RecordingSender::new()).await
    }

    pub async fn with_sender(sender: RecordingSender) -> Result<Self> {
        let db = TestDatabase::new().await?;
        let database = db.database();
        let connector = LocalShellConnector::new();

        let mail_sender: Arc<dyn MessageSender> = Arc::new(sender.clone());
        let notifier = Arc::new(NotifyDispatcher::new(
            database.clone(),
            mail_sender,
            Arc::new(ExecPool::new("mail", POOL)),
        ));
        let logs = Arc::new(ExecutionLogService::new(database.clone(), notifier.clone()));
        let ctx = Arc::new(ExecContext::new(database.clone(), logs.clone()));

        let settings = ShellSettings {
            connect_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(50),
            ..ShellSettings::default()
        };
        let strategies = Arc::new(StrategyRegistry::new(
            Arc::new(ShellStrategy::new(
                ctx.clone(),
                Arc::new(connector.clone()),
                Arc::new(ExecPool::new("ssh", POOL)),
                settings,
            )),
            Arc::new(SqlStrategy::new(
                ctx.clone(),
                Arc::new(ExecPool::new("db", POOL)),
            )),
        ));

        let engine = Arc::new(CronEngine::new(database.clone(), strategies.clone()).await?);
        let job_service = Arc::new(JobService::new(
            database.clone(),
            engine.clone(),
            strategies.clone(),
        ));
        let connection_tester = Arc::new(ConnectionTester::new(
            database.clone(),
            Arc::new(connector.clone()),
            settings,
        ));

        Ok(Self {
            db,
            connector,
            sender,
            notifier,
            logs,
            ctx,
            strategies,
            engine,
            job_service,
            connection_tester,
        })
    }

    pub fn database(&self) -> Arc<Database> {
        self.db.database()
    }

    /// The only execution log of a job
    pub async fn single_log(&self, job_id: i64) -> Result<ExecutionLogRecord> {
        let mut logs = self.database().recent_logs_for_job(job_id, 10).await?;
        assert_eq!(logs.len(), 1, "expected exactly one execution log");
        Ok(logs.remove(0))
    }
}
