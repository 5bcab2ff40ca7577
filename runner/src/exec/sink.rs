//! Execution callback protocol.
//!
//! Strategies report progress through [`ExecSink`]; observers (live streams,
//! the durable log) implement it. A run emits any number of `meta`, `stdout`
//! and `stderr` events followed by exactly one `end` or `error`.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::constants::stream;

#[async_trait]
pub trait ExecSink: Send + Sync {
    async fn meta(&self, line: &str);
    async fn stdout(&self, line: &str);
    async fn stderr(&self, line: &str);
    async fn end(&self, exit_code: i32);
    async fn error(&self, cause: &str);

    /// True once nobody is listening; stream pumps stop early
    fn is_closed(&self) -> bool {
        false
    }
}

/// One protocol event as delivered to live observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ExecEvent {
    Meta(String),
    Stdout(String),
    Stderr(String),
    End(i32),
    Error(String),
}

impl ExecEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ExecEvent::Meta(_) => "meta",
            ExecEvent::Stdout(_) => "stdout",
            ExecEvent::Stderr(_) => "stderr",
            ExecEvent::End(_) => "end",
            ExecEvent::Error(_) => "error",
        }
    }

    pub fn data(&self) -> String {
        match self {
            ExecEvent::Meta(s) | ExecEvent::Stdout(s) | ExecEvent::Stderr(s) | ExecEvent::Error(s) => {
                s.clone()
            }
            ExecEvent::End(code) => code.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecEvent::End(_) | ExecEvent::Error(_))
    }
}

/// Forwards events into a channel read by a live observer (an SSE response)
#[derive(Clone)]
pub struct LiveStreamSink {
    tx: mpsc::Sender<ExecEvent>,
    closed: Arc<AtomicBool>,
}

impl LiveStreamSink {
    pub fn channel() -> (Self, mpsc::Receiver<ExecEvent>) {
        Self::with_capacity(stream::CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<ExecEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    async fn send(&self, event: ExecEvent) {
        if self.is_closed() {
            return;
        }
        if self.tx.send(event).await.is_err() {
            self.closed.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ExecSink for LiveStreamSink {
    async fn meta(&self, line: &str) {
        self.send(ExecEvent::Meta(line.to_string())).await;
    }

    async fn stdout(&self, line: &str) {
        self.send(ExecEvent::Stdout(line.to_string())).await;
    }

    async fn stderr(&self, line: &str) {
        self.send(ExecEvent::Stderr(line.to_string())).await;
    }

    async fn end(&self, exit_code: i32) {
        self.send(ExecEvent::End(exit_code)).await;
    }

    async fn error(&self, cause: &str) {
        self.send(ExecEvent::Error(cause.to_string())).await;
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.tx.is_closed()
    }
}

/// Delivers every event to each inner sink in order
pub struct FanOutSink {
    sinks: Vec<Arc<dyn ExecSink>>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<Arc<dyn ExecSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl ExecSink for FanOutSink {
    async fn meta(&self, line: &str) {
        for sink in &self.sinks {
            sink.meta(line).await;
        }
    }

    async fn stdout(&self, line: &str) {
        for sink in &self.sinks {
            sink.stdout(line).await;
        }
    }

    async fn stderr(&self, line: &str) {
        for sink in &self.sinks {
            sink.stderr(line).await;
        }
    }

    async fn end(&self, exit_code: i32) {
        for sink in &self.sinks {
            sink.end(exit_code).await;
        }
    }

    async fn error(&self, cause: &str) {
        for sink in &self.sinks {
            sink.error(cause).await;
        }
    }

    // Closed only when every observer is gone; the durable log never is
    fn is_closed(&self) -> bool {
        self.sinks.iter().all(|s| s.is_closed())
    }
}
