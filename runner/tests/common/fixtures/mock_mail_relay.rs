//! Mock mail relay for testing webhook delivery
//!
//! This simulates the relay endpoint that receives composed mails,
//! allowing tests to verify what the mailer posts.

use serde_json::Value;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub struct MockMailRelay {
    pub server: MockServer,
}

impl MockMailRelay {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Accept every mail
    pub async fn mock_success(&self) {
        Mock::given(method("POST"))
            .and(path("/mail"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
    }

    /// Reject every mail with `status_code`
    pub async fn mock_failure(&self, status_code: u16) {
        Mock::given(method("POST"))
            .and(path("/mail"))
            .respond_with(ResponseTemplate::new(status_code))
            .mount(&self.server)
            .await;
    }

    pub fn relay_url(&self) -> String {
        format!("{}/mail", self.server.uri())
    }

    /// JSON bodies of every request the relay received
    pub async fn received_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|req| req.body_json::<Value>().ok())
            .collect()
    }
}
