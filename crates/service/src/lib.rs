//! Orchestration layer: transactional task mutations with activity logging
//! and post-commit assignment notifications.

pub mod error;
pub mod notify;
pub mod tasks;

pub use error::{ServiceError, ServiceResult};
pub use notify::{LoggingNotifier, Notifier, NotifyError};
pub use tasks::TaskService;
