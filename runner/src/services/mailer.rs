use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::constants::mail;
use crate::database::NotifyLogId;

/// Composed message handed to a sender
#[derive(Debug, Clone, Serialize)]
pub struct SendRequest {
    pub correlation_id: NotifyLogId,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Outcome of one send; code 0 is success
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub code: i32,
    pub message: String,
}

impl SendResult {
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: "sent".to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            code: -1,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, request: SendRequest) -> SendResult;
}

/// Delivers mail by POSTing `{correlation_id, to, subject, html}` to a relay
pub struct WebhookMailer {
    relay_url: String,
    client: Client,
}

impl WebhookMailer {
    pub fn new(relay_url: String) -> Self {
        let client = Client::builder()
            .timeout(mail::REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build mail relay client, using defaults: {}", e);
                Client::new()
            });

        Self { relay_url, client }
    }

    pub fn is_enabled(&self) -> bool {
        !self.relay_url.is_empty()
    }
}

#[async_trait]
impl MessageSender for WebhookMailer {
    async fn send(&self, request: SendRequest) -> SendResult {
        if self.relay_url.is_empty() {
            debug!("No mail relay configured, dropping mail {}", request.correlation_id);
            return SendResult::failed("mail relay not configured");
        }

        match timeout(
            mail::REQUEST_TIMEOUT,
            self.client.post(&self.relay_url).json(&request).send(),
        )
        .await
        {
            Ok(Ok(response)) => {
                if response.status().is_success() {
                    info!("Mail {} sent to {}", request.correlation_id, request.to);
                    SendResult::ok()
                } else {
                    warn!(
                        "Mail relay returned status {} for {}",
                        response.status(),
                        request.correlation_id
                    );
                    SendResult::failed(format!("relay returned {}", response.status()))
                }
            }
            Ok(Err(e)) => {
                warn!("Failed to send mail {}: {}", request.correlation_id, e);
                SendResult::failed(e.to_string())
            }
            Err(_) => {
                warn!("Mail relay timeout for {}", request.correlation_id);
                SendResult::failed("relay timeout")
            }
        }
    }
}
