pub mod job_service;
pub mod mailer;
pub mod notify;
pub mod render;

pub use connection_test::ConnectionTester;
pub use job_service::{JobSaveRequest, JobService, JobView};
pub use mailer::{MessageSender, SendRequest, SendResult, WebhookMailer};
pub use notify::NotifyDispatcher;
