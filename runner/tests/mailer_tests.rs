//! Webhook mailer delivery against a mock relay

mod common;

use common::fixtures::*;
use runner::database::NotifyLogId;
use runner::services::{MessageSender, SendRequest, WebhookMailer};

fn request() -> SendRequest {
    SendRequest {
        correlation_id: NotifyLogId(7),
        to: addresses::OPS.to_string(),
        subject: "[FAIL] cron job nightly (run #3)".to_string(),
        html: "<html></html>".to_string(),
    }
}

#[tokio::test]
async fn test_successful_delivery() {
    let relay = MockMailRelay::start().await;
    relay.mock_success().await;

    let mailer = WebhookMailer::new(relay.relay_url());
    let result = mailer.send(request()).await;

    assert!(result.is_success());
    assert_eq!(result.code, 0);

    let bodies = relay.received_bodies().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["to"], addresses::OPS);
    assert_eq!(bodies[0]["correlation_id"], 7);
    assert_eq!(bodies[0]["subject"], "[FAIL] cron job nightly (run #3)");
}

#[tokio::test]
async fn test_relay_error_status_fails() {
    let relay = MockMailRelay::start().await;
    relay.mock_failure(500).await;

    let result = WebhookMailer::new(relay.relay_url()).send(request()).await;

    assert!(!result.is_success());
    assert_eq!(result.code, -1);
    assert!(result.message.contains("500"));
}

#[tokio::test]
async fn test_unconfigured_relay_fails_without_request() {
    let mailer = WebhookMailer::new(String::new());
    assert!(!mailer.is_enabled());

    let result = mailer.send(request()).await;
    assert_eq!(result.code, -1);
    assert_eq!(result.message, "mail relay not configured");
}
