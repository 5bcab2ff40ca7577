use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use runner::config::ConfigManager;
use runner::database::Database;
use runner::exec::{
    ExecContext, ExecPool, ExecutionLogService, ShellSettings, ShellStrategy, SqlStrategy,
    StrategyRegistry,
};
use runner::scheduler::CronEngine;
use runner::services::{ConnectionTester, JobService, NotifyDispatcher, WebhookMailer};
use runner::ssh::RusshConnector;
use runner::web::{start_web_server, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with reduced verbosity
    let env_filter = EnvFilter::from_default_env()
        .add_directive("runner=info".parse()?)
        .add_directive("tower_http=warn".parse()?)
        .add_directive("tokio_cron_scheduler=warn".parse()?)
        .add_directive("russh=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("sqlx=warn".parse()?);

    fmt().with_env_filter(env_filter).init();

    info!("Starting cron job runner");

    // Load configuration
    let config_manager = ConfigManager::new("config".to_string()).await?;
    let config = config_manager.get_current_config();

    // Initialize database
    let database = Arc::new(Database::new(&config.database_path).await?);
    info!("Database initialized at {}", config.database_path);

    // Worker pools
    let ssh_pool = Arc::new(ExecPool::new("ssh", config.ssh_pool));
    let db_pool = Arc::new(ExecPool::new("db", config.db_pool));
    let mail_pool = Arc::new(ExecPool::new("mail", config.mail_pool));

    // Notifications
    let mailer = Arc::new(WebhookMailer::new(config.mail_relay_url.clone()));
    if !mailer.is_enabled() {
        warn!("No mail relay configured in config/main.toml; e-mail notifications will fail");
    }
    let notifier = Arc::new(NotifyDispatcher::new(
        database.clone(),
        mailer,
        mail_pool,
    ));

    // Execution
    let logs = Arc::new(ExecutionLogService::new(database.clone(), notifier));
    let ctx = Arc::new(ExecContext::new(database.clone(), logs));
    let shutdown = ctx.shutdown.clone();

    let settings = ShellSettings {
        connect_timeout: config.ssh_connect_timeout(),
        poll_interval: config.ssh_poll_interval(),
        default_timeout_seconds: config.default_timeout_seconds,
    };
    let connector = Arc::new(RusshConnector);
    let strategies = Arc::new(StrategyRegistry::new(
        Arc::new(ShellStrategy::new(
            ctx.clone(),
            connector.clone(),
            ssh_pool,
            settings,
        )),
        Arc::new(SqlStrategy::new(ctx.clone(), db_pool)),
    ));

    // Scheduler
    let engine = Arc::new(CronEngine::new(database.clone(), strategies.clone()).await?);
    if config.start_scheduler_on_boot {
        let status = engine.start().await?;
        info!(
            "Cron engine started on boot with {} jobs",
            status.registered_tasks
        );
    } else {
        info!("Cron engine left stopped; POST /api/cron/start to enable");
    }

    let job_service = Arc::new(JobService::new(
        database.clone(),
        engine.clone(),
        strategies,
    ));
    let connection_tester = Arc::new(ConnectionTester::new(
        database.clone(),
        connector,
        settings,
    ));

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                signal_shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    // Start web server
    let state = AppState::new(config, database, engine.clone(), job_service, connection_tester);
    start_web_server(state, shutdown).await?;

    engine.stop().await;
    info!("Cron job runner stopped");
    Ok(())
}
