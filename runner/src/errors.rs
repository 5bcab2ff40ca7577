//! Custom error types for the job runner
//!
//! Provides structured error handling for the failure classes the engine
//! distinguishes: rejected configuration, unresolved targets, transport
//! setup, notification delivery and cancellation.

use std::fmt;

/// Main error type for the job runner
#[derive(Debug)]
pub enum RunnerError {
    /// Configuration-related errors (job definitions, cron descriptors, config file)
    Config(ConfigError),

    /// Job target or script could not be resolved
    Resolution(ResolutionError),

    /// Remote transport setup errors (connect, auth, upload, channel)
    Transport(TransportError),

    /// Notification dispatch errors
    Notify(NotifyError),

    /// Execution was cancelled before it finished
    Cancelled,

    /// Other errors with context
    Other(String),
}

/// Configuration error variants
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to load configuration file
    LoadFailed { path: String, reason: String },

    /// Cron descriptor rejected by the scheduler
    InvalidCron { expr: String, reason: String },

    /// Invalid configuration value
    InvalidValue { field: String, reason: String },

    /// Missing required field
    MissingField { field: String },

    /// Another job already uses this name
    DuplicateName { name: String },

    /// Configuration parsing error
    ParseError { reason: String },
}

/// Pre-flight resolution error variants
#[derive(Debug)]
pub enum ResolutionError {
    /// Job not found
    JobNotFound { job_id: i64 },

    /// Referenced server missing or disabled
    ServerUnavailable { reason: String },

    /// Referenced database missing or disabled
    DatabaseUnavailable { reason: String },

    /// Referenced script missing or disabled
    ScriptUnavailable { reason: String },
}

/// Transport error variants
#[derive(Debug)]
pub enum TransportError {
    /// TCP/SSH handshake failed
    ConnectionFailed { host: String, reason: String },

    /// Handshake did not finish within the connect timeout
    ConnectTimeout { host: String, seconds: u64 },

    /// Server rejected the credentials
    AuthenticationFailed { host: String, user: String },

    /// Remote `scp -t` sink reported an error or spoke garbage
    UploadRejected { reason: String },

    /// Channel could not be opened or the exec request failed
    ChannelFailed { reason: String },
}

/// Notification error variants
#[derive(Debug)]
pub enum NotifyError {
    /// Target referenced by a binding does not exist
    TargetNotFound { target_id: i64 },

    /// Sender reported a failure
    SendFailed { reason: String },
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Config(e) => write!(f, "Configuration error: {}", e),
            RunnerError::Resolution(e) => write!(f, "Resolution error: {}", e),
            RunnerError::Transport(e) => write!(f, "Transport error: {}", e),
            RunnerError::Notify(e) => write!(f, "Notification error: {}", e),
            RunnerError::Cancelled => write!(f, "execution cancelled"),
            RunnerError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path, reason)
            }
            ConfigError::InvalidCron { expr, reason } => {
                write!(f, "Invalid cron expression '{}': {}", expr, reason)
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
            ConfigError::MissingField { field } => {
                write!(f, "Missing required field: {}", field)
            }
            ConfigError::DuplicateName { name } => {
                write!(f, "Job name '{}' is already in use", name)
            }
            ConfigError::ParseError { reason } => {
                write!(f, "Failed to parse config: {}", reason)
            }
        }
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::JobNotFound { job_id } => write!(f, "job {} not found", job_id),
            ResolutionError::ServerUnavailable { reason }
            | ResolutionError::DatabaseUnavailable { reason }
            | ResolutionError::ScriptUnavailable { reason } => write!(f, "{}", reason),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ConnectionFailed { host, reason } => {
                write!(f, "SSH connection to {} failed: {}", host, reason)
            }
            TransportError::ConnectTimeout { host, seconds } => {
                write!(f, "SSH connection to {} timed out after {}s", host, seconds)
            }
            TransportError::AuthenticationFailed { host, user } => {
                write!(f, "SSH authentication failed for {}@{}", user, host)
            }
            TransportError::UploadRejected { reason } => {
                write!(f, "script upload rejected: {}", reason)
            }
            TransportError::ChannelFailed { reason } => {
                write!(f, "SSH channel failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::TargetNotFound { target_id } => {
                write!(f, "notify target {} not found", target_id)
            }
            NotifyError::SendFailed { reason } => write!(f, "send failed: {}", reason),
        }
    }
}

impl std::error::Error for RunnerError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for ResolutionError {}
impl std::error::Error for TransportError {}
impl std::error::Error for NotifyError {}

impl From<anyhow::Error> for RunnerError {
    fn from(err: anyhow::Error) -> Self {
        RunnerError::Other(err.to_string())
    }
}

impl From<ConfigError> for RunnerError {
    fn from(err: ConfigError) -> Self {
        RunnerError::Config(err)
    }
}

impl From<ResolutionError> for RunnerError {
    fn from(err: ResolutionError) -> Self {
        RunnerError::Resolution(err)
    }
}

impl From<TransportError> for RunnerError {
    fn from(err: TransportError) -> Self {
        RunnerError::Transport(err)
    }
}

impl From<NotifyError> for RunnerError {
    fn from(err: NotifyError) -> Self {
        RunnerError::Notify(err)
    }
}
