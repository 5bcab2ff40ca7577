//! Remote shell transport.
//!
//! [`ShellConnector`] opens a [`ShellSession`] to a server; a session runs
//! commands as [`ExecChannel`]s exposing stdin/stdout/stderr as async byte
//! streams plus a control handle for close state, exit status and kill.
//! The production implementation speaks SSH via `russh`; tests substitute a
//! local process transport.

pub mod client;
pub mod scp;

pub use client::RusshConnector;
pub use scp::{upload_script, ScpState, ScpUpload};

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::database::ServerRecord;
use crate::errors::TransportError;

#[async_trait]
pub trait ShellConnector: Send + Sync {
    /// Connect and authenticate, giving up after `timeout`
    async fn connect(
        &self,
        server: &ServerRecord,
        timeout: Duration,
    ) -> Result<Box<dyn ShellSession>>;
}

#[async_trait]
pub trait ShellSession: Send {
    async fn open_exec(&mut self, command: &str) -> Result<ExecChannel>;
    async fn disconnect(&mut self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelState {
    pub closed: bool,
    pub exit_status: Option<i32>,
}

/// Observes and controls a running remote command
pub struct ChannelControl {
    state: watch::Receiver<ChannelState>,
    kill: CancellationToken,
}

impl ChannelControl {
    pub fn new(state: watch::Receiver<ChannelState>, kill: CancellationToken) -> Self {
        Self { state, kill }
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    pub fn exit_status(&self) -> Option<i32> {
        self.state.borrow().exit_status
    }

    /// Tear the channel down; the command may keep running remotely
    pub fn kill(&self) {
        self.kill.cancel();
    }

    pub async fn wait_closed(&mut self) -> Option<i32> {
        let waited = self
            .state
            .wait_for(|s| s.closed)
            .await
            .map(|state| state.exit_status);
        match waited {
            Ok(exit_status) => exit_status,
            // Sender gone means the driver ended
            Err(_) => self.exit_status(),
        }
    }
}

pub struct ExecChannel {
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    pub stderr: Box<dyn AsyncRead + Send + Unpin>,
    pub control: ChannelControl,
}

/// Output of a short helper command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Run a helper command to completion, collecting its output
pub async fn run_command(
    session: &mut dyn ShellSession,
    command: &str,
    timeout: Duration,
) -> Result<CommandOutput> {
    let ExecChannel {
        mut stdin,
        mut stdout,
        mut stderr,
        mut control,
    } = session.open_exec(command).await?;
    let _ = stdin.shutdown().await;
    drop(stdin);

    let collect = async {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let (out_res, err_res) =
            tokio::join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err));
        out_res?;
        err_res?;
        let exit_status = control.wait_closed().await;
        Ok::<_, std::io::Error>(CommandOutput {
            exit_status,
            stdout: String::from_utf8_lossy(&out).into_owned(),
            stderr: String::from_utf8_lossy(&err).into_owned(),
        })
    };

    let finished = tokio::time::timeout(timeout, collect).await;
    match finished {
        Ok(result) => Ok(result?),
        Err(_) => {
            control.kill();
            Err(TransportError::ChannelFailed {
                reason: format!("'{}' did not finish within {}s", command, timeout.as_secs()),
            }
            .into())
        }
    }
}

/// Run a helper command and fail unless it exits 0
pub async fn run_checked(
    session: &mut dyn ShellSession,
    command: &str,
    timeout: Duration,
) -> Result<()> {
    let output = run_command(session, command, timeout).await?;
    match output.exit_status {
        Some(0) => Ok(()),
        status => Err(TransportError::ChannelFailed {
            reason: format!(
                "'{}' exited with {:?}: {}",
                command,
                status,
                output.stderr.trim()
            ),
        }
        .into()),
    }
}
