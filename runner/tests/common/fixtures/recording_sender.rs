//! Message sender that records every request instead of delivering it

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use runner::services::{MessageSender, SendRequest, SendResult};

#[derive(Clone, Default)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<SendRequest>>>,
    fail_with: Option<String>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sender whose every attempt fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            sent: Arc::default(),
            fail_with: Some(message.to_string()),
        }
    }

    pub async fn sent(&self) -> Vec<SendRequest> {
        self.sent.lock().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, request: SendRequest) -> SendResult {
        self.sent.lock().await.push(request);
        match &self.fail_with {
            Some(message) => SendResult::failed(message.clone()),
            None => SendResult::ok(),
        }
    }
}
