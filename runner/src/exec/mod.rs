//! Job execution.
//!
//! A trigger hands a job to the [`ExecutionStrategy`] registered for its
//! type. The strategy runs pre-flight, attaches sinks (the durable log
//! always, a live stream when someone is watching) and submits the actual
//! work to its bounded [`ExecPool`].

pub mod durable;
pub mod pool;
pub mod preflight;
pub mod shell;
pub mod sink;
pub mod sql;

pub use durable::{DurableLogSink, ExecutionLogService};
pub use pool::ExecPool;
pub use shell::{ShellSettings, ShellStrategy};
pub use sink::{ExecEvent, ExecSink, FanOutSink, LiveStreamSink};
pub use sql::SqlStrategy;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::database::{Database, JobRecord, JobType};

/// Shared collaborators of all strategies
pub struct ExecContext {
    pub database: Arc<Database>,
    pub logs: Arc<ExecutionLogService>,
    /// Cancelled on shutdown; each run polls a child token
    pub shutdown: CancellationToken,
}

impl ExecContext {
    pub fn new(database: Arc<Database>, logs: Arc<ExecutionLogService>) -> Self {
        Self {
            database,
            logs,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Handle to a submitted run
pub struct ExecTicket {
    handle: Option<JoinHandle<()>>,
}

impl ExecTicket {
    /// Pre-flight rejected the job; its outcome is already recorded
    pub fn rejected() -> Self {
        Self { handle: None }
    }

    pub fn running(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn was_rejected(&self) -> bool {
        self.handle.is_none()
    }

    /// Wait until the run has emitted its terminal event
    pub async fn finished(self) {
        if let Some(handle) = self.handle {
            let _ = handle.await;
        }
    }
}

#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    fn job_type(&self) -> JobType;

    /// Resolve the job and submit it. Returns once the run is queued; the
    /// outcome flows through the sinks.
    async fn execute(&self, job: JobRecord, live: Option<LiveStreamSink>) -> Result<ExecTicket>;
}

/// Strategy per job type, fixed at startup
pub struct StrategyRegistry {
    shell: Arc<dyn ExecutionStrategy>,
    sql: Arc<dyn ExecutionStrategy>,
}

impl StrategyRegistry {
    pub fn new(shell: Arc<dyn ExecutionStrategy>, sql: Arc<dyn ExecutionStrategy>) -> Self {
        Self { shell, sql }
    }

    pub fn get(&self, job_type: JobType) -> Arc<dyn ExecutionStrategy> {
        match job_type {
            JobType::Shell => self.shell.clone(),
            JobType::Sql => self.sql.clone(),
        }
    }
}
