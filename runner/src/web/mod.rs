pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, start_web_server};

use std::sync::Arc;

use crate::config::Config;
use crate::database::Database;
use crate::scheduler::CronEngine;
use crate::services::{ConnectionTester, JobService};

// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Arc<Database>,
    pub engine: Arc<CronEngine>,
    pub job_service: Arc<JobService>,
    pub connection_tester: Arc<ConnectionTester>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        database: Arc<Database>,
        engine: Arc<CronEngine>,
        job_service: Arc<JobService>,
        connection_tester: Arc<ConnectionTester>,
    ) -> Self {
        Self {
            config,
            database,
            engine,
            job_service,
            connection_tester,
        }
    }
}
