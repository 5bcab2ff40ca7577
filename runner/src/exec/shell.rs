//! SHELL jobs: upload the script over SSH, run it, stream its output and
//! enforce the job's wall-clock timeout.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::pool::ExecPool;
use super::preflight;
use super::sink::{ExecSink, LiveStreamSink};
use super::{ExecContext, ExecTicket, ExecutionStrategy};
use crate::constants::{exit_codes, jobs, ssh};
use crate::database::{JobRecord, JobType, ScriptRecord, ServerRecord};
use crate::errors::RunnerError;
use crate::ssh::{run_command, upload_script, ChannelControl, ExecChannel, ShellConnector, ShellSession};

#[derive(Debug, Clone, Copy)]
pub struct ShellSettings {
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
    pub default_timeout_seconds: i64,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            connect_timeout: ssh::CONNECT_TIMEOUT,
            poll_interval: ssh::POLL_INTERVAL,
            default_timeout_seconds: jobs::DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

pub struct ShellStrategy {
    ctx: Arc<ExecContext>,
    connector: Arc<dyn ShellConnector>,
    pool: Arc<ExecPool>,
    settings: ShellSettings,
}

impl ShellStrategy {
    pub fn new(
        ctx: Arc<ExecContext>,
        connector: Arc<dyn ShellConnector>,
        pool: Arc<ExecPool>,
        settings: ShellSettings,
    ) -> Self {
        Self {
            ctx,
            connector,
            pool,
            settings,
        }
    }
}

#[async_trait]
impl ExecutionStrategy for ShellStrategy {
    fn job_type(&self) -> JobType {
        JobType::Shell
    }

    #[instrument(skip(self, job, live), fields(job = %job.name))]
    async fn execute(&self, job: JobRecord, live: Option<LiveStreamSink>) -> Result<ExecTicket> {
        let Some(resolved) = preflight::resolve_server(&self.ctx, &job, live).await? else {
            return Ok(ExecTicket::rejected());
        };

        let run = ShellRun {
            job,
            server: resolved.target,
            script: resolved.script,
            sink: resolved.sink,
            connector: self.connector.clone(),
            settings: self.settings,
            cancel: self.ctx.shutdown.child_token(),
        };

        let handle = self.pool.submit(run.execute()).await?;
        Ok(ExecTicket::running(handle))
    }
}

/// One SHELL execution, owned by its pool task
struct ShellRun {
    job: JobRecord,
    server: ServerRecord,
    script: ScriptRecord,
    sink: Arc<dyn ExecSink>,
    connector: Arc<dyn ShellConnector>,
    settings: ShellSettings,
    cancel: CancellationToken,
}

enum PollOutcome {
    Exited(i32),
    TimedOut,
    Cancelled,
}

impl ShellRun {
    async fn execute(self) {
        let timeout_secs = self
            .job
            .effective_timeout_seconds(self.settings.default_timeout_seconds);
        info!(
            "Running job {} on {} (timeout {}s)",
            self.job.name,
            self.server.connect_info(),
            timeout_secs
        );

        self.sink.meta(&format!("host={}", self.server.host)).await;
        self.sink.meta(&format!("user={}", self.server.username)).await;
        self.sink.meta(&format!("timeoutSec={}", timeout_secs)).await;

        let mut session = match self
            .connector
            .connect(&self.server, self.settings.connect_timeout)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!("Job {} could not connect: {}", self.job.name, e);
                self.sink.error(&e.to_string()).await;
                return;
            }
        };

        let remote_path = format!("{}{}.sh", ssh::REMOTE_SCRIPT_PREFIX, Uuid::new_v4());
        let outcome = self
            .run_on_session(session.as_mut(), &remote_path, timeout_secs)
            .await;

        if let Err(e) = run_command(
            session.as_mut(),
            &format!("rm -f {}", remote_path),
            ssh::HELPER_COMMAND_TIMEOUT,
        )
        .await
        {
            debug!("Cleanup of {} failed: {}", remote_path, e);
        }
        session.disconnect().await;

        match outcome {
            Ok(exit_code) => self.sink.end(exit_code).await,
            Err(e) => {
                warn!("Job {} failed during setup: {}", self.job.name, e);
                self.sink.error(&e.to_string()).await;
            }
        }
    }

    async fn run_on_session(
        &self,
        session: &mut dyn ShellSession,
        remote_path: &str,
        timeout_secs: i64,
    ) -> Result<i32> {
        upload_script(session, remote_path, self.script.body.as_bytes()).await?;

        let command = build_command(
            self.script.workdir.as_deref(),
            remote_path,
            self.job.args_text.as_deref(),
        );
        self.sink.meta(&format!("cmd={}", command)).await;

        let ExecChannel {
            stdin,
            stdout,
            stderr,
            control,
        } = session.open_exec(&command).await?;
        drop(stdin);

        let out_pump = spawn_pump(stdout, self.sink.clone(), StreamKind::Stdout);
        let err_pump = spawn_pump(stderr, self.sink.clone(), StreamKind::Stderr);

        match self.poll_until_done(&control, timeout_secs).await {
            PollOutcome::Exited(code) => {
                drain_pumps(out_pump, err_pump).await;
                Ok(code)
            }
            PollOutcome::TimedOut => {
                join_pumps(out_pump, err_pump).await;
                Ok(exit_codes::TIMEOUT)
            }
            PollOutcome::Cancelled => {
                join_pumps(out_pump, err_pump).await;
                Err(RunnerError::Cancelled.into())
            }
        }
    }

    async fn poll_until_done(&self, control: &ChannelControl, timeout_secs: i64) -> PollOutcome {
        let deadline = Instant::now() + Duration::from_secs(timeout_secs.max(1) as u64);

        loop {
            if control.is_closed() {
                return PollOutcome::Exited(control.exit_status().unwrap_or(exit_codes::FAILURE));
            }

            if Instant::now() >= deadline {
                self.sink
                    .stderr(&format!(
                        "[timeout] job exceeded {}s, channel closed",
                        timeout_secs
                    ))
                    .await;
                control.kill();
                return PollOutcome::TimedOut;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    control.kill();
                    return PollOutcome::Cancelled;
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
    }
}

/// `[cd <workdir> && ]/bin/bash <path>[ <args>]`
pub fn build_command(workdir: Option<&str>, remote_path: &str, args: Option<&str>) -> String {
    let mut command = String::new();
    if let Some(dir) = workdir.map(str::trim).filter(|d| !d.is_empty()) {
        command.push_str(&format!("cd {} && ", dir));
    }
    command.push_str("/bin/bash ");
    command.push_str(remote_path);
    if let Some(args) = args.map(str::trim).filter(|a| !a.is_empty()) {
        command.push(' ');
        command.push_str(args);
    }
    command
}

#[derive(Clone, Copy)]
pub(crate) enum StreamKind {
    Stdout,
    Stderr,
}

pub(crate) fn spawn_pump(
    reader: Box<dyn AsyncRead + Send + Unpin>,
    sink: Arc<dyn ExecSink>,
    kind: StreamKind,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            if sink.is_closed() {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            match kind {
                StreamKind::Stdout => sink.stdout(line).await,
                StreamKind::Stderr => sink.stderr(line).await,
            }
        }
    })
}

/// Wait until both pumps have forwarded everything the closed channel left
/// in its pipes
pub(crate) async fn drain_pumps(out_pump: JoinHandle<()>, err_pump: JoinHandle<()>) {
    let _ = out_pump.await;
    let _ = err_pump.await;
}

/// Give the pumps of an abandoned channel a short grace, then abort them
pub(crate) async fn join_pumps(out_pump: JoinHandle<()>, err_pump: JoinHandle<()>) {
    let out_abort = out_pump.abort_handle();
    let err_abort = err_pump.abort_handle();

    let joined = tokio::time::timeout(ssh::PUMP_JOIN_GRACE, async {
        let _ = out_pump.await;
        let _ = err_pump.await;
    })
    .await;

    if joined.is_err() {
        debug!("Stream pumps still busy after grace period, aborting");
        out_abort.abort();
        err_abort.abort();
    }
}
