//! Common test data and helpers

use std::future::Future;
use std::time::Duration;

/// Common script names
pub mod scripts {
    pub const ECHO_HI: &str = "echo-hi";
    pub const SLEEP_TEN: &str = "sleep-ten";
    pub const FAILING: &str = "exit-three";
    pub const SELECT_ZERO: &str = "select-zero";
    pub const SELECT_ONE: &str = "select-one";
}

/// Common job schedules
pub mod crons {
    pub const NIGHTLY: &str = "0 0 2 * * *";
    pub const EVERY_SECOND: &str = "* * * * * *";
    pub const NEVER_SOON: &str = "0 0 0 1 1 *";
}

pub mod addresses {
    pub const OPS: &str = "ops@example.com";
}

/// Poll `check` until it yields `Some`, failing after `timeout`
pub async fn wait_for<T, F, Fut>(timeout: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return Some(value);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
