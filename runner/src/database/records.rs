//! Database record types (entities).
//!
//! This module contains all the record structs used by the database layer,
//! plus the small enums stored as upper-case text columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{exit_codes, jobs};

// ============================================================================
// Enumerations stored as text
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobType {
    Shell,
    Sql,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Shell => "SHELL",
            JobType::Sql => "SQL",
        }
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SHELL" => Ok(JobType::Shell),
            "SQL" => Ok(JobType::Sql),
            other => Err(format!("unknown job type '{}'", other)),
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of one execution log row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecStatus {
    Running,
    Success,
    Fail,
    Timeout,
    Error,
}

impl ExecStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecStatus::Running => "RUNNING",
            ExecStatus::Success => "SUCCESS",
            ExecStatus::Fail => "FAIL",
            ExecStatus::Timeout => "TIMEOUT",
            ExecStatus::Error => "ERROR",
        }
    }

    /// Terminal status for a normal `end(exit_code)`
    pub fn from_exit_code(exit_code: i32) -> Self {
        match exit_code {
            exit_codes::SUCCESS => ExecStatus::Success,
            exit_codes::TIMEOUT => ExecStatus::Timeout,
            _ => ExecStatus::Fail,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecStatus::Running)
    }
}

impl FromStr for ExecStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(ExecStatus::Running),
            "SUCCESS" => Ok(ExecStatus::Success),
            "FAIL" => Ok(ExecStatus::Fail),
            "TIMEOUT" => Ok(ExecStatus::Timeout),
            "ERROR" => Ok(ExecStatus::Error),
            other => Err(format!("unknown execution status '{}'", other)),
        }
    }
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthType {
    #[serde(rename = "password")]
    Password,
    #[serde(rename = "privateKey")]
    PrivateKey,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Password => "password",
            AuthType::PrivateKey => "privateKey",
        }
    }
}

impl FromStr for AuthType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "password" => Ok(AuthType::Password),
            "privateKey" => Ok(AuthType::PrivateKey),
            other => Err(format!("unknown auth type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotifyChannel {
    Email,
    Phone,
}

impl NotifyChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyChannel::Email => "EMAIL",
            NotifyChannel::Phone => "PHONE",
        }
    }
}

impl FromStr for NotifyChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EMAIL" => Ok(NotifyChannel::Email),
            "PHONE" => Ok(NotifyChannel::Phone),
            other => Err(format!("unknown notify channel '{}'", other)),
        }
    }
}

/// Status of a single notification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotifyStatus {
    Running,
    Success,
    Fail,
}

impl NotifyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyStatus::Running => "RUNNING",
            NotifyStatus::Success => "SUCCESS",
            NotifyStatus::Fail => "FAIL",
        }
    }
}

/// Identity of a notify-log row, carried through the mail sender so the
/// completion can be written back to the right attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotifyLogId(pub i64);

impl fmt::Display for NotifyLogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Job definitions and their targets
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub name: String,
    pub job_type: JobType,
    pub cron_expr: String,
    pub script_name: String,
    pub server_id: Option<i64>,
    pub database_id: Option<i64>,
    pub args_text: Option<String>,
    pub timeout_seconds: Option<i64>,
    pub disabled: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Wall-clock budget, falling back to `default` when unset or out of range
    pub fn effective_timeout_seconds(&self, default: i64) -> i64 {
        match self.timeout_seconds {
            Some(t) if (jobs::MIN_TIMEOUT_SECONDS..=jobs::MAX_TIMEOUT_SECONDS).contains(&t) => t,
            _ => default,
        }
    }
}

/// Runtime status shown in the job list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobRuntimeStatus {
    Disabled,
    Paused,
    Ready,
    Running,
}

impl JobRuntimeStatus {
    pub fn derive(disabled: bool, registered: bool, engine_started: bool) -> Self {
        if disabled {
            JobRuntimeStatus::Disabled
        } else if !registered {
            JobRuntimeStatus::Paused
        } else if !engine_started {
            JobRuntimeStatus::Ready
        } else {
            JobRuntimeStatus::Running
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: i64,
    pub name: String,
    pub host: String,
    pub port: i64,
    pub username: String,
    pub auth_type: AuthType,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
    #[serde(skip_serializing)]
    pub passphrase: Option<String>,
    pub test_command: Option<String>,
    pub disabled: bool,
}

impl ServerRecord {
    /// `user@host:port` snapshot stored on execution logs
    pub fn connect_info(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseRecord {
    pub id: i64,
    pub name: String,
    pub db_type: String,
    pub url: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub test_sql: Option<String>,
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub id: i64,
    pub name: String,
    pub body: String,
    pub workdir: Option<String>,
    pub script_type: Option<String>,
    pub disabled: bool,
}

// ============================================================================
// Execution and notification history
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogRecord {
    pub id: i64,
    pub job_id: i64,
    pub connect_info: String,
    pub script_name: Option<String>,
    pub script_content: Option<String>,
    pub args_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub exit_code: Option<i32>,
    pub status: ExecStatus,
    pub output_text: Option<String>,
    pub error_text: Option<String>,
}

/// Failed execution joined with its job name, for the daily failure view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedExecutionRecord {
    pub log_id: i64,
    pub job_id: i64,
    pub job_name: Option<String>,
    pub status: ExecStatus,
    pub exit_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyBindingRecord {
    pub id: i64,
    pub job_id: i64,
    pub target_id: i64,
    /// Comma separated terminal statuses, e.g. `FAIL,TIMEOUT`
    pub trigger_statuses: String,
    pub disabled: bool,
}

impl NotifyBindingRecord {
    pub fn triggers_on(&self, status: ExecStatus) -> bool {
        self.trigger_statuses
            .split(',')
            .map(str::trim)
            .any(|s| s.eq_ignore_ascii_case(status.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyTargetRecord {
    pub id: i64,
    pub display_name: String,
    pub username: String,
    pub channel: NotifyChannel,
    pub address: String,
    pub disabled: bool,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyLogRecord {
    pub id: i64,
    pub binding_id: i64,
    pub execution_log_id: i64,
    pub username: String,
    pub channel: NotifyChannel,
    pub address: String,
    pub job_name: String,
    pub exec_status: ExecStatus,
    pub status: NotifyStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
