//! This module provides reusable test utilities:
//! - In-memory test databases with seed helpers
//! - A local-process shell transport standing in for SSH
//! - Recording and mock mail senders
//! - A fully wired engine harness
//! - Common test data

// Allow unused code in test fixtures - not every test uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod harness;
pub mod local_shell;
pub mod mock_mail_relay;
pub mod recording_sender;
pub mod test_data;
pub mod test_database;

// Re-export commonly used items
pub use harness::TestHarness;
pub use local_shell::LocalShellConnector;
pub use mock_mail_relay::MockMailRelay;
pub use recording_sender::RecordingSender;
pub use test_data::*;
pub use test_database::TestDatabase;
