//! Job pre-flight: resolve and validate a job's target and script before any
//! remote work. A job that cannot run still produces exactly one execution
//! log row, already terminal.

use anyhow::Result;
use std::sync::Arc;
use tracing::warn;

use super::durable::DurableLogSink;
use super::sink::{ExecSink, FanOutSink, LiveStreamSink};
use super::ExecContext;
use crate::constants::{exit_codes, jobs};
use crate::database::{DatabaseRecord, ExecStatus, JobRecord, ScriptRecord, ServerRecord};
use crate::errors::ResolutionError;

/// Everything a strategy needs once pre-flight passed
pub struct Resolved<T> {
    pub target: T,
    pub script: ScriptRecord,
    pub sink: Arc<dyn ExecSink>,
    pub log_id: i64,
}

pub async fn resolve_server(
    ctx: &ExecContext,
    job: &JobRecord,
    live: Option<LiveStreamSink>,
) -> Result<Option<Resolved<ServerRecord>>> {
    let server = match job.server_id {
        Some(id) => ctx.database.get_server(id).await?,
        None => None,
    };

    let connect_info = server
        .as_ref()
        .map(ServerRecord::connect_info)
        .unwrap_or_else(|| jobs::UNKNOWN_TARGET.to_string());

    let target = match server {
        None => Err(ResolutionError::ServerUnavailable {
            reason: match job.server_id {
                Some(id) => format!("server not found: {}", id),
                None => "job has no server configured".to_string(),
            },
        }),
        Some(server) if server.disabled => Err(ResolutionError::ServerUnavailable {
            reason: format!("server disabled: {}", server.name),
        }),
        Some(server) => Ok(server),
    };

    complete(ctx, job, live, target, connect_info).await
}

pub async fn resolve_database(
    ctx: &ExecContext,
    job: &JobRecord,
    live: Option<LiveStreamSink>,
) -> Result<Option<Resolved<DatabaseRecord>>> {
    let database = match job.database_id {
        Some(id) => ctx.database.get_database(id).await?,
        None => None,
    };

    let connect_info = database
        .as_ref()
        .map(|d| d.url.clone())
        .unwrap_or_else(|| jobs::UNKNOWN_TARGET.to_string());

    let target = match database {
        None => Err(ResolutionError::DatabaseUnavailable {
            reason: match job.database_id {
                Some(id) => format!("database not found: {}", id),
                None => "job has no database configured".to_string(),
            },
        }),
        Some(database) if database.disabled => Err(ResolutionError::DatabaseUnavailable {
            reason: format!("database disabled: {}", database.name),
        }),
        Some(database) => Ok(database),
    };

    complete(ctx, job, live, target, connect_info).await
}

async fn complete<T>(
    ctx: &ExecContext,
    job: &JobRecord,
    live: Option<LiveStreamSink>,
    target: Result<T, ResolutionError>,
    connect_info: String,
) -> Result<Option<Resolved<T>>> {
    let script = match ctx.database.get_script_by_name(&job.script_name).await? {
        None => Err(ResolutionError::ScriptUnavailable {
            reason: format!("script not found: {}", job.script_name),
        }),
        Some(script) if script.disabled => Err(ResolutionError::ScriptUnavailable {
            reason: format!("script disabled: {}", script.name),
        }),
        Some(script) => Ok(script),
    };

    let (target, script) = match (target, script) {
        (Ok(target), Ok(script)) => (target, script),
        (Err(e), script) => {
            reject(ctx, job, live, &connect_info, script.ok().as_ref(), &e.to_string()).await?;
            return Ok(None);
        }
        (Ok(_), Err(e)) => {
            reject(ctx, job, live, &connect_info, None, &e.to_string()).await?;
            return Ok(None);
        }
    };

    let (log_id, start_time) = ctx
        .logs
        .create_start_log(job, &connect_info, Some(&script))
        .await?;

    Ok(Some(Resolved {
        target,
        script,
        sink: attach_sinks(ctx, log_id, start_time, live),
        log_id,
    }))
}

/// Synthesize the terminal outcome of a job that cannot run
async fn reject(
    ctx: &ExecContext,
    job: &JobRecord,
    live: Option<LiveStreamSink>,
    connect_info: &str,
    script: Option<&ScriptRecord>,
    reason: &str,
) -> Result<()> {
    warn!("Job {} rejected before execution: {}", job.name, reason);
    let (log_id, start_time) = ctx.logs.create_start_log(job, connect_info, script).await?;

    match live {
        Some(live) => {
            let sink = attach_sinks(ctx, log_id, start_time, Some(live));
            sink.stderr(reason).await;
            sink.end(exit_codes::FAILURE).await;
        }
        None => {
            ctx.logs.append_err(log_id, reason).await;
            ctx.logs
                .finish(log_id, exit_codes::FAILURE, ExecStatus::Error, Some(start_time))
                .await;
        }
    }

    Ok(())
}

fn attach_sinks(
    ctx: &ExecContext,
    log_id: i64,
    start_time: chrono::DateTime<chrono::Utc>,
    live: Option<LiveStreamSink>,
) -> Arc<dyn ExecSink> {
    let durable: Arc<dyn ExecSink> =
        Arc::new(DurableLogSink::new(ctx.logs.clone(), log_id, start_time));
    match live {
        Some(live) => Arc::new(FanOutSink::new(vec![Arc::new(live), durable])),
        None => durable,
    }
}
