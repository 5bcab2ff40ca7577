//! HTTP request handlers for the runner API.
//!
//! This module is organized by domain:
//! - `common` - Shared response envelope, error mapping and query structs
//! - `connections` - Server and database connection tests (SSE)
//! - `cron` - Scheduler start/stop/status/reload
//! - `jobs` - Job definitions and the live run stream (SSE)
//! - `logs` - Execution log queries and mail preview

pub mod common;
pub mod connections;
pub mod cron;
pub mod jobs;
pub mod logs;

pub use connections::*;
pub use cron::*;
pub use jobs::*;
pub use logs::*;
