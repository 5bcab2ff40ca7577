pub mod manager;
use serde::{Deserialize, Serialize};
use std::time::Duration;
pub use manager::ConfigManager;

use crate::constants::{jobs, pools, ssh, stream};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Mail relay endpoint; empty disables e-mail delivery
    #[serde(default)]
    pub mail_relay_url: String,
    #[serde(default = "default_connect_timeout")]
    pub ssh_connect_timeout_seconds: u64,
    #[serde(default = "default_poll_interval")]
    pub ssh_poll_interval_ms: u64,
    #[serde(default = "default_job_timeout")]
    pub default_timeout_seconds: i64,
    #[serde(default = "default_sse_idle_timeout")]
    pub sse_idle_timeout_seconds: u64,
    #[serde(default = "default_start_on_boot")]
    pub start_scheduler_on_boot: bool,
    #[serde(default = "default_ssh_pool")]
    pub ssh_pool: PoolConfig,
    #[serde(default = "default_db_pool")]
    pub db_pool: PoolConfig,
    #[serde(default = "default_mail_pool")]
    pub mail_pool: PoolConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    pub concurrency: usize,
    pub queue_capacity: usize,
}

fn default_database_path() -> String {
    "data/runner.db".to_string()
}

fn default_connect_timeout() -> u64 {
    ssh::CONNECT_TIMEOUT.as_secs()
}

fn default_poll_interval() -> u64 {
    ssh::POLL_INTERVAL.as_millis() as u64
}

fn default_job_timeout() -> i64 {
    jobs::DEFAULT_TIMEOUT_SECONDS
}

fn default_sse_idle_timeout() -> u64 {
    stream::IDLE_TIMEOUT_SECONDS
}

fn default_start_on_boot() -> bool {
    true
}

fn default_ssh_pool() -> PoolConfig {
    PoolConfig {
        concurrency: pools::SSH_CONCURRENCY,
        queue_capacity: pools::SSH_QUEUE_CAPACITY,
    }
}

fn default_db_pool() -> PoolConfig {
    PoolConfig {
        concurrency: pools::DB_CONCURRENCY,
        queue_capacity: pools::DB_QUEUE_CAPACITY,
    }
}

fn default_mail_pool() -> PoolConfig {
    PoolConfig {
        concurrency: pools::MAIL_CONCURRENCY,
        queue_capacity: pools::MAIL_QUEUE_CAPACITY,
    }
}

impl Config {
    pub fn ssh_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh_connect_timeout_seconds)
    }

    pub fn ssh_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ssh_poll_interval_ms.max(1))
    }

    pub fn sse_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.sse_idle_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8095,
            database_path: default_database_path(),
            mail_relay_url: String::new(),
            ssh_connect_timeout_seconds: default_connect_timeout(),
            ssh_poll_interval_ms: default_poll_interval(),
            default_timeout_seconds: default_job_timeout(),
            sse_idle_timeout_seconds: default_sse_idle_timeout(),
            start_scheduler_on_boot: default_start_on_boot(),
            ssh_pool: default_ssh_pool(),
            db_pool: default_db_pool(),
            mail_pool: default_mail_pool(),
        }
    }
}
