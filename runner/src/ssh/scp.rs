//! Script upload over the SCP sink protocol (`scp -t <path>`).
//!
//! The remote sink acknowledges each step with one byte: 0 is ok, 1 and 2
//! are errors followed by a message line. The exchange is:
//! wait ack, send `C<mode> <len> <name>\n`, wait ack, send payload and a
//! single 0 byte, wait ack.

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{run_checked, ExecChannel, ShellSession};
use crate::constants::ssh;
use crate::errors::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScpState {
    AwaitInitAck,
    AwaitHeaderAck,
    AwaitDataAck,
    Done,
}

pub struct ScpUpload<'a> {
    state: ScpState,
    file_name: &'a str,
    mode: u32,
    payload: &'a [u8],
}

impl<'a> ScpUpload<'a> {
    pub fn new(file_name: &'a str, mode: u32, payload: &'a [u8]) -> Self {
        Self {
            state: ScpState::AwaitInitAck,
            file_name,
            mode,
            payload,
        }
    }

    pub fn state(&self) -> ScpState {
        self.state
    }

    pub fn header(&self) -> String {
        format!("C{:04o} {} {}\n", self.mode, self.payload.len(), self.file_name)
    }

    /// Drive the exchange to `Done` over the sink's stdout (`reader`) and
    /// stdin (`writer`).
    pub async fn run<R, W>(&mut self, reader: &mut R, writer: &mut W) -> Result<()>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        loop {
            match self.state {
                ScpState::AwaitInitAck => {
                    read_ack(reader).await?;
                    writer.write_all(self.header().as_bytes()).await?;
                    writer.flush().await?;
                    self.state = ScpState::AwaitHeaderAck;
                }
                ScpState::AwaitHeaderAck => {
                    read_ack(reader).await?;
                    writer.write_all(self.payload).await?;
                    writer.write_all(&[0]).await?;
                    writer.flush().await?;
                    self.state = ScpState::AwaitDataAck;
                }
                ScpState::AwaitDataAck => {
                    read_ack(reader).await?;
                    self.state = ScpState::Done;
                }
                ScpState::Done => return Ok(()),
            }
        }
    }
}

async fn read_ack<R>(reader: &mut R) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let code = reader.read_u8().await.map_err(|e| TransportError::UploadRejected {
        reason: format!("sink closed before acknowledging: {}", e),
    })?;

    match code {
        0 => Ok(()),
        1 | 2 => {
            let mut message = Vec::new();
            loop {
                match reader.read_u8().await {
                    Ok(b'\n') | Err(_) => break,
                    Ok(byte) => message.push(byte),
                }
            }
            Err(TransportError::UploadRejected {
                reason: String::from_utf8_lossy(&message).trim().to_string(),
            }
            .into())
        }
        other => Err(TransportError::UploadRejected {
            reason: format!("unexpected ack byte {}", other),
        }
        .into()),
    }
}

/// Upload `content` to `remote_path` and make it executable
pub async fn upload_script(
    session: &mut dyn ShellSession,
    remote_path: &str,
    content: &[u8],
) -> Result<()> {
    let ExecChannel {
        mut stdin,
        mut stdout,
        stderr: _,
        mut control,
    } = session.open_exec(&format!("scp -t {}", remote_path)).await?;

    let mut upload = ScpUpload::new(ssh::SCP_FILE_NAME, ssh::SCP_FILE_MODE, content);
    let exchange = tokio::time::timeout(
        ssh::HELPER_COMMAND_TIMEOUT,
        upload.run(stdout.as_mut(), stdin.as_mut()),
    )
    .await;

    let _ = stdin.shutdown().await;
    drop(stdin);

    match exchange {
        Ok(result) => result?,
        Err(_) => {
            control.kill();
            return Err(TransportError::UploadRejected {
                reason: "sink did not acknowledge in time".to_string(),
            }
            .into());
        }
    }

    let _ = tokio::time::timeout(ssh::HELPER_COMMAND_TIMEOUT, control.wait_closed()).await;
    debug!("Uploaded {} bytes to {}", content.len(), remote_path);

    run_checked(
        session,
        &format!("chmod 700 {}", remote_path),
        ssh::HELPER_COMMAND_TIMEOUT,
    )
    .await
}
