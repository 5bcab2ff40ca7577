//! Job definition and target (server, database, script) operations.

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use super::records::{DatabaseRecord, JobRecord, ScriptRecord, ServerRecord};
use super::{parse_column, Database};

const JOB_COLUMNS: &str = "id, name, job_type, cron_expr, script_name, server_id, database_id, \
                           args_text, timeout_seconds, disabled, description, created_at, updated_at";

fn job_from_row(row: &SqliteRow) -> Result<JobRecord> {
    Ok(JobRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        job_type: parse_column(row.try_get("job_type")?, "job_type")?,
        cron_expr: row.try_get("cron_expr")?,
        script_name: row.try_get("script_name")?,
        server_id: row.try_get("server_id")?,
        database_id: row.try_get("database_id")?,
        args_text: row.try_get("args_text")?,
        timeout_seconds: row.try_get("timeout_seconds")?,
        disabled: row.try_get("disabled")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn server_from_row(row: &SqliteRow) -> Result<ServerRecord> {
    Ok(ServerRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        host: row.try_get("host")?,
        port: row.try_get("port")?,
        username: row.try_get("username")?,
        auth_type: parse_column(row.try_get("auth_type")?, "auth_type")?,
        password: row.try_get("password")?,
        private_key: row.try_get("private_key")?,
        passphrase: row.try_get("passphrase")?,
        test_command: row.try_get("test_command")?,
        disabled: row.try_get("disabled")?,
    })
}

impl Database {
    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    /// Insert a job; `id`, `created_at` and `updated_at` of the argument are ignored
    pub async fn insert_job(&self, job: &JobRecord) -> Result<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO cron_jobs (
                name, job_type, cron_expr, script_name, server_id, database_id,
                args_text, timeout_seconds, disabled, description, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.name)
        .bind(job.job_type.as_str())
        .bind(&job.cron_expr)
        .bind(&job.script_name)
        .bind(job.server_id)
        .bind(job.database_id)
        .bind(&job.args_text)
        .bind(job.timeout_seconds)
        .bind(job.disabled)
        .bind(&job.description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Inserted job {} with id {}", job.name, id);
        Ok(id)
    }

    pub async fn update_job(&self, job: &JobRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cron_jobs SET
                name = ?, job_type = ?, cron_expr = ?, script_name = ?, server_id = ?,
                database_id = ?, args_text = ?, timeout_seconds = ?, disabled = ?,
                description = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&job.name)
        .bind(job.job_type.as_str())
        .bind(&job.cron_expr)
        .bind(&job.script_name)
        .bind(job.server_id)
        .bind(job.database_id)
        .bind(&job.args_text)
        .bind(job.timeout_seconds)
        .bind(job.disabled)
        .bind(&job.description)
        .bind(Utc::now())
        .bind(job.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_job_disabled(&self, job_id: i64, disabled: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE cron_jobs SET disabled = ?, updated_at = ? WHERE id = ?")
            .bind(disabled)
            .bind(Utc::now())
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_job(&self, job_id: i64) -> Result<Option<JobRecord>> {
        let sql = format!("SELECT {} FROM cron_jobs WHERE id = ?", JOB_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    pub async fn find_job_by_name(&self, name: &str) -> Result<Option<JobRecord>> {
        let sql = format!("SELECT {} FROM cron_jobs WHERE name = ?", JOB_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let sql = format!("SELECT {} FROM cron_jobs ORDER BY id", JOB_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(job_from_row).collect()
    }

    pub async fn list_enabled_jobs(&self) -> Result<Vec<JobRecord>> {
        let sql = format!(
            "SELECT {} FROM cron_jobs WHERE disabled = 0 ORDER BY id",
            JOB_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(job_from_row).collect()
    }

    // ------------------------------------------------------------------
    // Servers
    // ------------------------------------------------------------------

    pub async fn insert_server(&self, server: &ServerRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO servers (
                name, host, port, username, auth_type, password, private_key,
                passphrase, test_command, disabled
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&server.name)
        .bind(&server.host)
        .bind(server.port)
        .bind(&server.username)
        .bind(server.auth_type.as_str())
        .bind(&server.password)
        .bind(&server.private_key)
        .bind(&server.passphrase)
        .bind(&server.test_command)
        .bind(server.disabled)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_server(&self, server_id: i64) -> Result<Option<ServerRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, host, port, username, auth_type, password, private_key,
                   passphrase, test_command, disabled
            FROM servers WHERE id = ?
            "#,
        )
        .bind(server_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(server_from_row).transpose()
    }

    // ------------------------------------------------------------------
    // Databases
    // ------------------------------------------------------------------

    pub async fn insert_database(&self, database: &DatabaseRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO databases (name, db_type, url, username, password, test_sql, disabled)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&database.name)
        .bind(&database.db_type)
        .bind(&database.url)
        .bind(&database.username)
        .bind(&database.password)
        .bind(&database.test_sql)
        .bind(database.disabled)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_database(&self, database_id: i64) -> Result<Option<DatabaseRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, db_type, url, username, password, test_sql, disabled
            FROM databases WHERE id = ?
            "#,
        )
        .bind(database_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(DatabaseRecord {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                db_type: row.try_get("db_type")?,
                url: row.try_get("url")?,
                username: row.try_get("username")?,
                password: row.try_get("password")?,
                test_sql: row.try_get("test_sql")?,
                disabled: row.try_get("disabled")?,
            })),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Scripts
    // ------------------------------------------------------------------

    /// Insert a script or replace the one with the same name
    pub async fn upsert_script(&self, script: &ScriptRecord) -> Result<i64> {
        sqlx::query(
            r#"
            INSERT INTO scripts (name, body, workdir, script_type, disabled)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                body = excluded.body,
                workdir = excluded.workdir,
                script_type = excluded.script_type,
                disabled = excluded.disabled
            "#,
        )
        .bind(&script.name)
        .bind(&script.body)
        .bind(&script.workdir)
        .bind(&script.script_type)
        .bind(script.disabled)
        .execute(&self.pool)
        .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM scripts WHERE name = ?")
            .bind(&script.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn get_script_by_name(&self, name: &str) -> Result<Option<ScriptRecord>> {
        let row = sqlx::query(
            "SELECT id, name, body, workdir, script_type, disabled FROM scripts WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(ScriptRecord {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                body: row.try_get("body")?,
                workdir: row.try_get("workdir")?,
                script_type: row.try_get("script_type")?,
                disabled: row.try_get("disabled")?,
            })),
            None => Ok(None),
        }
    }
}
