use anyhow::Result;
use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ChannelControl, ChannelState, ExecChannel, ShellConnector, ShellSession};
use crate::constants::ssh;
use crate::database::{AuthType, ServerRecord};
use crate::errors::TransportError;

/// Host keys are not pinned; servers are registered by operators
struct AcceptAnyHostKey;

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

pub struct RusshConnector;

#[async_trait]
impl ShellConnector for RusshConnector {
    async fn connect(
        &self,
        server: &ServerRecord,
        timeout: Duration,
    ) -> Result<Box<dyn ShellSession>> {
        debug!("Establishing SSH connection to {}", server.connect_info());

        let port = u16::try_from(server.port).unwrap_or(ssh::DEFAULT_PORT);
        let config = Arc::new(client::Config::default());

        let mut handle = tokio::time::timeout(
            timeout,
            client::connect(config, (server.host.as_str(), port), AcceptAnyHostKey),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout {
            host: server.host.clone(),
            seconds: timeout.as_secs(),
        })?
        .map_err(|e| TransportError::ConnectionFailed {
            host: server.host.clone(),
            reason: e.to_string(),
        })?;

        let authenticated = match server.auth_type {
            AuthType::Password => handle
                .authenticate_password(
                    server.username.clone(),
                    server.password.clone().unwrap_or_default(),
                )
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    host: server.host.clone(),
                    reason: e.to_string(),
                })?,
            AuthType::PrivateKey => {
                let pem = server.private_key.as_deref().unwrap_or_default();
                let key = russh_keys::decode_secret_key(pem, server.passphrase.as_deref())
                    .map_err(|e| TransportError::ConnectionFailed {
                        host: server.host.clone(),
                        reason: format!("invalid private key: {}", e),
                    })?;
                handle
                    .authenticate_publickey(server.username.clone(), Arc::new(key))
                    .await
                    .map_err(|e| TransportError::ConnectionFailed {
                        host: server.host.clone(),
                        reason: e.to_string(),
                    })?
            }
        };

        if !authenticated {
            return Err(TransportError::AuthenticationFailed {
                host: server.host.clone(),
                user: server.username.clone(),
            }
            .into());
        }

        debug!("SSH connection established to {}", server.connect_info());
        Ok(Box::new(RusshSession {
            handle,
            host: server.host.clone(),
        }))
    }
}

pub struct RusshSession {
    handle: Handle<AcceptAnyHostKey>,
    host: String,
}

#[async_trait]
impl ShellSession for RusshSession {
    async fn open_exec(&mut self, command: &str) -> Result<ExecChannel> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::ChannelFailed {
                reason: format!("open session on {}: {}", self.host, e),
            })?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| TransportError::ChannelFailed {
                reason: format!("exec on {}: {}", self.host, e),
            })?;

        let (stdin_writer, mut stdin_reader) = duplex(ssh::PIPE_CAPACITY);
        let (mut stdout_writer, stdout_reader) = duplex(ssh::PIPE_CAPACITY);
        let (mut stderr_writer, stderr_reader) = duplex(ssh::PIPE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ChannelState::default());
        let kill = CancellationToken::new();
        let killed = kill.clone();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            let mut stdin_open = true;

            loop {
                tokio::select! {
                    _ = killed.cancelled() => {
                        let _ = channel.close().await;
                        break;
                    }
                    read = stdin_reader.read(&mut buf), if stdin_open => match read {
                        Ok(0) | Err(_) => {
                            stdin_open = false;
                            let _ = channel.eof().await;
                        }
                        Ok(n) => {
                            if channel.data(&buf[..n]).await.is_err() {
                                stdin_open = false;
                            }
                        }
                    },
                    msg = channel.wait() => match msg {
                        Some(ChannelMsg::Data { data }) => {
                            let _ = stdout_writer.write_all(&data).await;
                        }
                        Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                            let _ = stderr_writer.write_all(&data).await;
                        }
                        Some(ChannelMsg::ExitStatus { exit_status }) => {
                            state_tx.send_modify(|s| s.exit_status = Some(exit_status as i32));
                        }
                        Some(ChannelMsg::Close) | None => break,
                        Some(_) => {}
                    },
                }
            }

            drop(stdout_writer);
            drop(stderr_writer);
            state_tx.send_modify(|s| s.closed = true);
        });

        Ok(ExecChannel {
            stdin: Box::new(stdin_writer),
            stdout: Box::new(stdout_reader),
            stderr: Box::new(stderr_reader),
            control: ChannelControl::new(state_rx, kill),
        })
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            warn!("SSH disconnect from {} failed: {}", self.host, e);
        }
    }
}
