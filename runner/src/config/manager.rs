use super::Config;
use crate::constants::jobs;
use crate::errors::ConfigError;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

pub struct ConfigManager {
    current_config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(config_dir: String) -> Result<Self> {
        let config = Self::load_configuration(&config_dir).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    async fn load_configuration(config_dir: &str) -> Result<Config> {
        let main_config_path = format!("{}/main.toml", config_dir);
        let main_config_content = fs::read_to_string(&main_config_path)
            .await
            .map_err(|e| ConfigError::LoadFailed {
                path: main_config_path.clone(),
                reason: e.to_string(),
            })?;

        let config = Self::parse(&main_config_content)?;

        info!(
            "Loaded config: listen {}:{}, database {}, ssh pool {}/{}, db pool {}/{}, mail pool {}/{}",
            config.host,
            config.port,
            config.database_path,
            config.ssh_pool.concurrency,
            config.ssh_pool.queue_capacity,
            config.db_pool.concurrency,
            config.db_pool.queue_capacity,
            config.mail_pool.concurrency,
            config.mail_pool.queue_capacity
        );

        Ok(config)
    }

    /// Parse and validate the contents of `main.toml`
    pub fn parse(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })?;

        Self::validate(&config)?;

        if config.mail_relay_url.is_empty() {
            warn!("No mail_relay_url configured; e-mail notifications will be recorded as failed");
        }

        Ok(config)
    }

    fn validate(config: &Config) -> Result<()> {
        if !(jobs::MIN_TIMEOUT_SECONDS..=jobs::MAX_TIMEOUT_SECONDS)
            .contains(&config.default_timeout_seconds)
        {
            return Err(ConfigError::InvalidValue {
                field: "default_timeout_seconds".to_string(),
                reason: format!(
                    "must be between {} and {}",
                    jobs::MIN_TIMEOUT_SECONDS,
                    jobs::MAX_TIMEOUT_SECONDS
                ),
            }
            .into());
        }

        for (name, pool) in [
            ("ssh_pool", &config.ssh_pool),
            ("db_pool", &config.db_pool),
            ("mail_pool", &config.mail_pool),
        ] {
            if pool.concurrency == 0 {
                return Err(anyhow!(ConfigError::InvalidValue {
                    field: format!("{}.concurrency", name),
                    reason: "must be at least 1".to_string(),
                }));
            }
        }

        Ok(())
    }
}
