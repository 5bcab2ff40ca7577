//! Database layer for the job runner.
//!
//! This module provides SQLite persistence for:
//! - Job definitions and the servers, databases and scripts they reference
//! - Execution logs (one row per run, bounded output columns)
//! - Notification bindings, targets and per-attempt notify logs
//!
//! The module is organized into submodules:
//! - `records` - All record types (entities)
//! - `jobs` - Job, server, database and script operations
//! - `execution_logs` - Execution log lifecycle and queries
//! - `notify` - Binding, target and notify-log operations

mod execution_logs;
mod jobs;
mod notify;
mod records;

pub use execution_logs::LogColumn;
pub use records::*;

use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{error, info, warn};

pub struct Database {
    pool: Pool<Sqlite>,
}

const TABLES: &[(&str, &str)] = &[
    (
        "cron_jobs",
        r#"
            CREATE TABLE IF NOT EXISTS cron_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                job_type TEXT NOT NULL,
                cron_expr TEXT NOT NULL,
                script_name TEXT NOT NULL,
                server_id INTEGER,
                database_id INTEGER,
                args_text TEXT,
                timeout_seconds INTEGER,
                disabled BOOLEAN NOT NULL DEFAULT 0,
                description TEXT,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
        "#,
    ),
    (
        "servers",
        r#"
            CREATE TABLE IF NOT EXISTS servers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                host TEXT NOT NULL,
                port INTEGER NOT NULL DEFAULT 22,
                username TEXT NOT NULL,
                auth_type TEXT NOT NULL,
                password TEXT,
                private_key TEXT,
                passphrase TEXT,
                test_command TEXT,
                disabled BOOLEAN NOT NULL DEFAULT 0
            )
        "#,
    ),
    (
        "databases",
        r#"
            CREATE TABLE IF NOT EXISTS databases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                db_type TEXT NOT NULL,
                url TEXT NOT NULL,
                username TEXT,
                password TEXT,
                test_sql TEXT,
                disabled BOOLEAN NOT NULL DEFAULT 0
            )
        "#,
    ),
    (
        "scripts",
        r#"
            CREATE TABLE IF NOT EXISTS scripts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                body TEXT NOT NULL,
                workdir TEXT,
                script_type TEXT,
                disabled BOOLEAN NOT NULL DEFAULT 0
            )
        "#,
    ),
    (
        "execution_logs",
        r#"
            CREATE TABLE IF NOT EXISTS execution_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL,
                connect_info TEXT NOT NULL,
                script_name TEXT,
                script_content TEXT,
                args_text TEXT,
                created_at DATETIME NOT NULL,
                start_time DATETIME,
                end_time DATETIME,
                duration_ms INTEGER,
                exit_code INTEGER,
                status TEXT NOT NULL,
                output_text TEXT,
                error_text TEXT
            )
        "#,
    ),
    (
        "job_notify_bindings",
        r#"
            CREATE TABLE IF NOT EXISTS job_notify_bindings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL,
                target_id INTEGER NOT NULL,
                trigger_statuses TEXT NOT NULL,
                disabled BOOLEAN NOT NULL DEFAULT 0
            )
        "#,
    ),
    (
        "notify_targets",
        r#"
            CREATE TABLE IF NOT EXISTS notify_targets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                display_name TEXT NOT NULL,
                username TEXT NOT NULL,
                channel TEXT NOT NULL,
                address TEXT NOT NULL,
                disabled BOOLEAN NOT NULL DEFAULT 0,
                verified BOOLEAN NOT NULL DEFAULT 0
            )
        "#,
    ),
    (
        "notify_logs",
        r#"
            CREATE TABLE IF NOT EXISTS notify_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                binding_id INTEGER NOT NULL,
                execution_log_id INTEGER NOT NULL,
                username TEXT NOT NULL,
                channel TEXT NOT NULL,
                address TEXT NOT NULL,
                job_name TEXT NOT NULL,
                exec_status TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_execution_logs_job_created ON execution_logs(job_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_execution_logs_status_created ON execution_logs(status, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_notify_bindings_job ON job_notify_bindings(job_id)",
    "CREATE INDEX IF NOT EXISTS idx_notify_logs_execution ON notify_logs(execution_log_id)",
];

impl Database {
    /// Expose pool for integration test queries
    #[allow(dead_code)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn new(database_path: &str) -> Result<Self> {
        info!("=== Starting database initialization ===");
        info!("Database path: {}", database_path);

        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!("FAILED to create parent directory {:?}: {}", parent, e);
                    return Err(e.into());
                }
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path);
        let pool = match SqlitePool::connect(&database_url).await {
            Ok(pool) => {
                info!("Successfully connected to SQLite database");
                pool
            }
            Err(e) => {
                error!("FAILED to connect to database: {}", e);
                error!("   Connection URL: {}", database_url);
                return Err(e.into());
            }
        };

        let database = Self::initialize(pool).await?;
        info!("=== Database initialization completed successfully ===");
        Ok(database)
    }

    /// Single-connection in-memory database, used by tests and dry runs
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::initialize(pool).await
    }

    async fn initialize(pool: SqlitePool) -> Result<Self> {
        let database = Self { pool };

        if let Err(e) = database.initialize_tables().await {
            error!("CRITICAL: Database table initialization failed: {}", e);
            return Err(e);
        }

        // Runs left RUNNING by a previous process can never finish now
        match database.cleanup_interrupted_executions().await {
            Ok(0) => info!("No interrupted executions found"),
            Ok(cleaned) => warn!("Marked {} interrupted executions as ERROR on startup", cleaned),
            Err(e) => {
                error!("Failed to clean up interrupted executions: {}", e);
                warn!("Continuing with startup despite cleanup failure");
            }
        }

        Ok(database)
    }

    async fn initialize_tables(&self) -> Result<()> {
        for (name, sql) in TABLES {
            if let Err(e) = sqlx::query(sql).execute(&self.pool).await {
                error!("FAILED to create {} table: {}", name, e);
                return Err(e.into());
            }
            info!("{} table ready", name);
        }

        for sql in INDEXES {
            if let Err(e) = sqlx::query(sql).execute(&self.pool).await {
                error!("FAILED to create index: {}", e);
                return Err(e.into());
            }
        }

        Ok(())
    }

    async fn cleanup_interrupted_executions(&self) -> Result<u64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE execution_logs
            SET status = 'ERROR', exit_code = -1, end_time = ?, script_content = NULL
            WHERE status = 'RUNNING'
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Parse an enum stored as text, naming the column on failure
pub(crate) fn parse_column<T>(value: String, column: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    value
        .parse::<T>()
        .map_err(|e| anyhow!("Invalid value in column '{}': {}", column, e))
}
