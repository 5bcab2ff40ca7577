//! Bounded worker pools.
//!
//! A pool admits at most `concurrency + queue_capacity` tasks; of those,
//! `concurrency` run at once and the rest wait for a worker permit.

use anyhow::{anyhow, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::PoolConfig;

pub struct ExecPool {
    name: String,
    admission: Arc<Semaphore>,
    workers: Arc<Semaphore>,
}

impl ExecPool {
    pub fn new(name: &str, config: PoolConfig) -> Self {
        let concurrency = config.concurrency.max(1);
        Self {
            name: name.to_string(),
            admission: Arc::new(Semaphore::new(concurrency + config.queue_capacity)),
            workers: Arc::new(Semaphore::new(concurrency)),
        }
    }

    /// Submit a task, waiting while the pool and its queue are full.
    pub async fn submit<F>(&self, task: F) -> Result<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let admit = self
            .admission
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| anyhow!("pool {} is closed", self.name))?;

        Ok(self.spawn_admitted(admit, task))
    }

    /// Submit a task; when the pool is saturated it runs on the caller instead.
    pub async fn submit_or_run<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.admission.clone().try_acquire_owned() {
            Ok(admit) => {
                self.spawn_admitted(admit, task);
            }
            Err(_) => {
                warn!("Pool {} saturated, running task on caller", self.name);
                task.await;
            }
        }
    }

    fn spawn_admitted<F>(
        &self,
        admit: tokio::sync::OwnedSemaphorePermit,
        task: F,
    ) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let workers = self.workers.clone();
        let name = self.name.clone();
        tokio::spawn(async move {
            let _admit = admit;
            let _worker = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    debug!("Pool {} closed before task started", name);
                    return;
                }
            };
            task.await;
        })
    }
}
