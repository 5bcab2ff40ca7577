use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::constants::jobs;
use crate::database::{Database, JobRecord};
use crate::errors::ConfigError;
use crate::exec::StrategyRegistry;

/// Snapshot returned by start/stop/status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub started: bool,
    pub status: String,
    pub registered_tasks: usize,
}

pub fn trigger_key(job_id: i64) -> String {
    format!("{}{}", jobs::TRIGGER_KEY_PREFIX, job_id)
}

/// Check a cron descriptor the same way registration will
pub fn validate_cron(expr: &str) -> Result<(), ConfigError> {
    if expr.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "cron_expr".to_string(),
        });
    }
    Job::new_async(expr, |_uuid, _scheduler| Box::pin(async {}))
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidCron {
            expr: expr.to_string(),
            reason: e.to_string(),
        })
}

#[derive(Default)]
struct Lifecycle {
    ticker_started: bool,
}

/// Owns the `job-<id>` → trigger table and the engine's started flag.
///
/// The underlying ticker starts with the first `start()` and then keeps
/// running; a stopped engine keeps its triggers but every fire is skipped.
pub struct CronEngine {
    database: Arc<Database>,
    strategies: Arc<StrategyRegistry>,
    scheduler: JobScheduler,
    lifecycle: Mutex<Lifecycle>,
    triggers: Mutex<HashMap<String, Uuid>>,
    started: Arc<AtomicBool>,
    registered: AtomicUsize,
}

impl CronEngine {
    pub async fn new(database: Arc<Database>, strategies: Arc<StrategyRegistry>) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create JobScheduler: {}", e))?;

        Ok(Self {
            database,
            strategies,
            scheduler,
            lifecycle: Mutex::new(Lifecycle::default()),
            triggers: Mutex::new(HashMap::new()),
            started: Arc::new(AtomicBool::new(false)),
            registered: AtomicUsize::new(0),
        })
    }

    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<EngineStatus> {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.started.load(Ordering::SeqCst) {
            debug!("Cron engine already started");
            return Ok(self.status());
        }

        let registered = self.reload_locked().await?;

        if !lifecycle.ticker_started {
            self.scheduler
                .start()
                .await
                .map_err(|e| anyhow!("Failed to start JobScheduler: {}", e))?;
            lifecycle.ticker_started = true;
        }

        self.started.store(true, Ordering::SeqCst);
        info!("Cron engine started with {} registered jobs", registered);
        Ok(self.status())
    }

    #[instrument(skip(self))]
    pub async fn stop(&self) -> EngineStatus {
        let _lifecycle = self.lifecycle.lock().await;
        if self.started.swap(false, Ordering::SeqCst) {
            info!("Cron engine stopped; triggers kept but will not fire");
        } else {
            debug!("Cron engine already stopped");
        }
        self.status()
    }

    pub fn status(&self) -> EngineStatus {
        let started = self.started.load(Ordering::SeqCst);
        EngineStatus {
            started,
            status: if started { "STARTED" } else { "STOPPED" }.to_string(),
            registered_tasks: self.registered.load(Ordering::SeqCst),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Drop every trigger and register all enabled jobs from the store
    pub async fn reload_all(&self) -> Result<usize> {
        let _lifecycle = self.lifecycle.lock().await;
        self.reload_locked().await
    }

    async fn reload_locked(&self) -> Result<usize> {
        self.clear_all().await;

        let enabled = self.database.list_enabled_jobs().await?;
        let mut registered = 0;
        for job in enabled {
            match self.register(&job).await {
                Ok(()) => registered += 1,
                Err(e) => error!("Failed to register job {} ({}): {}", job.name, job.id, e),
            }
        }

        info!("Reloaded {} cron jobs", registered);
        Ok(registered)
    }

    async fn clear_all(&self) {
        let mut triggers = self.triggers.lock().await;
        for (key, uuid) in triggers.drain() {
            if let Err(e) = self.scheduler.remove(&uuid).await {
                warn!("Failed to remove trigger {}: {}", key, e);
            }
        }
        self.registered.store(0, Ordering::SeqCst);
    }

    /// Register (or replace) the trigger for a job. The trigger table stays
    /// locked from removal of the old trigger until the new one is recorded.
    pub async fn register(&self, job: &JobRecord) -> Result<()> {
        let mut triggers = self.triggers.lock().await;
        self.remove_locked(&mut triggers, job.id).await?;

        let started = self.started.clone();
        let strategies = self.strategies.clone();
        let snapshot = job.clone();

        let cron_job = Job::new_async(job.cron_expr.as_str(), move |_uuid, _scheduler| {
            let started = started.clone();
            let strategies = strategies.clone();
            let job = snapshot.clone();

            Box::pin(async move {
                if !started.load(Ordering::SeqCst) {
                    debug!("Engine stopped, skipping trigger for {}", job.name);
                    return;
                }

                debug!("Trigger fired for job {}", job.name);
                let strategy = strategies.get(job.job_type);
                if let Err(e) = strategy.execute(job.clone(), None).await {
                    error!("Scheduled run of {} failed to start: {}", job.name, e);
                }
            })
        })
        .map_err(|e| ConfigError::InvalidCron {
            expr: job.cron_expr.clone(),
            reason: e.to_string(),
        })?;

        let uuid = self
            .scheduler
            .add(cron_job)
            .await
            .map_err(|e| anyhow!("Failed to add job {} to scheduler: {}", job.name, e))?;

        triggers.insert(trigger_key(job.id), uuid);
        self.registered.store(triggers.len(), Ordering::SeqCst);
        debug!("Registered {} with '{}'", trigger_key(job.id), job.cron_expr);
        Ok(())
    }

    pub async fn unregister(&self, job_id: i64) -> Result<()> {
        let mut triggers = self.triggers.lock().await;
        self.remove_locked(&mut triggers, job_id).await
    }

    async fn remove_locked(
        &self,
        triggers: &mut HashMap<String, Uuid>,
        job_id: i64,
    ) -> Result<()> {
        if let Some(uuid) = triggers.remove(&trigger_key(job_id)) {
            self.scheduler
                .remove(&uuid)
                .await
                .map_err(|e| anyhow!("Failed to remove trigger for job {}: {}", job_id, e))?;
            debug!("Unregistered {}", trigger_key(job_id));
        }
        self.registered.store(triggers.len(), Ordering::SeqCst);
        Ok(())
    }

    pub async fn is_registered(&self, job_id: i64) -> bool {
        self.triggers.lock().await.contains_key(&trigger_key(job_id))
    }

    /// Next fire time of a registered job
    pub async fn next_run(&self, job_id: i64) -> Option<DateTime<Utc>> {
        let uuid = *self.triggers.lock().await.get(&trigger_key(job_id))?;
        let mut scheduler = self.scheduler.clone();
        match scheduler.next_tick_for_job(uuid).await {
            Ok(next) => next,
            Err(e) => {
                debug!("No next tick for job {}: {}", job_id, e);
                None
            }
        }
    }
}
