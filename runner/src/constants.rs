//! Central repository for configuration constants and magic numbers
//!
//! Organized by category so timeouts, limits and wire-level values have a
//! single source of truth.

use std::time::Duration;

/// Execution log limits
pub mod log_limits {
    /// Maximum stored size of the output or error column, in bytes
    pub const MAX_TEXT_BYTES: usize = 100 * 1024;

    /// Appended once a column overflows; nothing is stored after it
    pub const TRUNCATED_MARKER: &str = "\n...[truncated]";

    /// Number of recent logs returned per job
    pub const RECENT_LOGS_PER_JOB: i64 = 10;
}

/// Exit code conventions
pub mod exit_codes {
    /// Reported when the wall-clock timeout fires
    pub const TIMEOUT: i32 = 124;

    /// Reported for setup errors, rejected pre-flight and failed SQL checks
    pub const FAILURE: i32 = -1;

    pub const SUCCESS: i32 = 0;
}

/// Job definition limits
pub mod jobs {
    /// Timeout used when a job does not set one
    pub const DEFAULT_TIMEOUT_SECONDS: i64 = 300;

    pub const MIN_TIMEOUT_SECONDS: i64 = 1;

    /// One day
    pub const MAX_TIMEOUT_SECONDS: i64 = 86_400;

    /// Connect-info snapshot used when the target cannot be resolved
    pub const UNKNOWN_TARGET: &str = "UNKNOWN";

    /// Prefix of the scheduler trigger key
    pub const TRIGGER_KEY_PREFIX: &str = "job-";
}

/// SSH transport constants
pub mod ssh {
    use super::Duration;

    pub const DEFAULT_PORT: u16 = 22;

    /// Default handshake timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default interval between channel-closed checks
    pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

    /// How long the stream pumps of a timed-out or cancelled run get before
    /// they are aborted
    pub const PUMP_JOIN_GRACE: Duration = Duration::from_secs(1);

    /// Upper bound for helper commands (chmod, rm, scp sink)
    pub const HELPER_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

    /// In-memory pipe size between the channel driver and its readers
    pub const PIPE_CAPACITY: usize = 64 * 1024;

    /// Remote upload location; a uuid and `.sh` are appended
    pub const REMOTE_SCRIPT_PREFIX: &str = "/tmp/devops-";

    /// File name announced in the SCP header
    pub const SCP_FILE_NAME: &str = "script.sh";

    /// Mode announced in the SCP header
    pub const SCP_FILE_MODE: u32 = 0o700;

    /// Test command used when neither request nor server provides one
    pub const DEFAULT_TEST_COMMAND: &str = "echo ping";
}

/// Worker pool sizes
pub mod pools {
    pub const SSH_CONCURRENCY: usize = 16;
    pub const SSH_QUEUE_CAPACITY: usize = 100;

    pub const DB_CONCURRENCY: usize = 16;
    pub const DB_QUEUE_CAPACITY: usize = 100;

    pub const MAIL_CONCURRENCY: usize = 4;
    pub const MAIL_QUEUE_CAPACITY: usize = 200;
}

/// Live stream constants
pub mod stream {
    /// Idle time after which a live stream is closed (30 minutes)
    pub const IDLE_TIMEOUT_SECONDS: u64 = 1800;

    /// Buffered events between a running job and its live observer
    pub const CHANNEL_CAPACITY: usize = 1024;

    /// Rows shown by a database connection test
    pub const DB_TEST_MAX_ROWS: usize = 5;
}

/// Mail relay constants
pub mod mail {
    use super::Duration;

    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
}
