pub mod config;
pub mod constants;
pub mod database;
pub mod errors;
pub mod exec;
pub mod scheduler;
pub mod services;
pub mod ssh;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigManager};
pub use database::Database;
pub use errors::RunnerError;
pub use exec::{ExecContext, ExecutionStrategy, StrategyRegistry};
pub use scheduler::CronEngine;
pub use services::{JobService, NotifyDispatcher};
