//! Shell transport that runs commands as local processes.
//!
//! Stands in for SSH in tests: every command runs under `bash -c`, except
//! `scp -t <path>`, which is answered in-process by a minimal SCP sink that
//! writes the received file to `<path>`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{duplex, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use runner::database::ServerRecord;
use runner::errors::TransportError;
use runner::ssh::{ChannelControl, ChannelState, ExecChannel, ShellConnector, ShellSession};

/// Host name the connector refuses, for transport failure tests
pub const UNREACHABLE_HOST: &str = "unreachable.invalid";

#[derive(Clone, Default)]
pub struct LocalShellConnector {
    connects: Arc<AtomicUsize>,
    commands: Arc<tokio::sync::Mutex<Vec<String>>>,
}

impl LocalShellConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Every command opened on any session, in order
    pub async fn commands(&self) -> Vec<String> {
        self.commands.lock().await.clone()
    }
}

#[async_trait]
impl ShellConnector for LocalShellConnector {
    async fn connect(
        &self,
        server: &ServerRecord,
        _timeout: Duration,
    ) -> Result<Box<dyn ShellSession>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if server.host == UNREACHABLE_HOST {
            return Err(TransportError::ConnectionFailed {
                host: server.host.clone(),
                reason: "connection refused".to_string(),
            }
            .into());
        }
        Ok(Box::new(LocalSession {
            commands: self.commands.clone(),
        }))
    }
}

struct LocalSession {
    commands: Arc<tokio::sync::Mutex<Vec<String>>>,
}

#[async_trait]
impl ShellSession for LocalSession {
    async fn open_exec(&mut self, command: &str) -> Result<ExecChannel> {
        self.commands.lock().await.push(command.to_string());
        match command.strip_prefix("scp -t ") {
            Some(path) => Ok(scp_sink(path.trim().to_string())),
            None => spawn_process(command),
        }
    }

    async fn disconnect(&mut self) {}
}

fn spawn_process(command: &str) -> Result<ExecChannel> {
    let mut child = Command::new("bash")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdin = child.stdin.take().ok_or_else(|| anyhow!("child stdin missing"))?;
    let stdout = child.stdout.take().ok_or_else(|| anyhow!("child stdout missing"))?;
    let stderr = child.stderr.take().ok_or_else(|| anyhow!("child stderr missing"))?;

    let (state_tx, state_rx) = watch::channel(ChannelState::default());
    let kill = CancellationToken::new();
    let kill_driver = kill.clone();

    tokio::spawn(async move {
        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = kill_driver.cancelled() => None,
        };
        let exit_status = match waited {
            Some(status) => status.ok().and_then(|s| s.code()),
            None => {
                let _ = child.kill().await;
                None
            }
        };
        let _ = state_tx.send(ChannelState {
            closed: true,
            exit_status,
        });
    });

    Ok(ExecChannel {
        stdin: Box::new(stdin),
        stdout: Box::new(stdout),
        stderr: Box::new(stderr),
        control: ChannelControl::new(state_rx, kill),
    })
}

fn scp_sink(path: String) -> ExecChannel {
    let (client_stdin, mut sink_stdin) = duplex(64 * 1024);
    let (mut sink_stdout, client_stdout) = duplex(64 * 1024);
    let (sink_stderr, client_stderr) = duplex(1024);
    let (state_tx, state_rx) = watch::channel(ChannelState::default());

    tokio::spawn(async move {
        let exit_status = match receive_file(&mut sink_stdin, &mut sink_stdout, &path).await {
            Ok(()) => 0,
            Err(_) => 1,
        };
        drop(sink_stdout);
        drop(sink_stderr);
        let _ = state_tx.send(ChannelState {
            closed: true,
            exit_status: Some(exit_status),
        });
    });

    ExecChannel {
        stdin: Box::new(client_stdin),
        stdout: Box::new(client_stdout),
        stderr: Box::new(client_stderr),
        control: ChannelControl::new(state_rx, CancellationToken::new()),
    }
}

async fn receive_file<R, W>(input: &mut R, output: &mut W, path: &str) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(&[0]).await?;

    let mut header = Vec::new();
    loop {
        match input.read_u8().await? {
            b'\n' => break,
            byte => header.push(byte),
        }
    }
    let header = String::from_utf8_lossy(&header).to_string();
    let len: usize = header
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| anyhow!("malformed header {}", header))?
        .parse()?;
    output.write_all(&[0]).await?;

    let mut data = vec![0u8; len + 1];
    input.read_exact(&mut data).await?;
    data.truncate(len);
    tokio::fs::write(path, &data).await?;
    output.write_all(&[0]).await?;
    output.flush().await?;
    Ok(())
}
