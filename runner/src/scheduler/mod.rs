//! Cron-based job scheduling
//!
//! Every enabled job is registered with a recurring trigger keyed
//! `job-<id>`. When a trigger fires, the job is handed to the execution
//! strategy for its type.
//!
//! # Cron format
//!
//! Descriptors use the 6-field format (sec min hour day month dow):
//!
//! ```text
//! 0 0 2 * * *     daily at 02:00
//! 0 */5 * * * *   every five minutes
//! ```
//!
//! # Lifecycle
//!
//! `start` reloads all jobs and enables firing, `stop` disables firing.
//! Both are idempotent and serialized; `status` never blocks.

pub mod engine;
pub use engine::{trigger_key, validate_cron, CronEngine, EngineStatus};
