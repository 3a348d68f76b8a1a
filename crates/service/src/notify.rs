//! Assignment notification port.
//!
//! Notifications are fire-and-forget: they run after the owning transaction
//! has committed, and a failed delivery is logged, never surfaced to the
//! caller. Swap the implementation at composition time to plug in a real
//! delivery channel.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivery channel for assignment notifications.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Tell `email` they were assigned the task named `task_title`.
    async fn notify_assignment(&self, email: &str, task_title: &str) -> Result<(), NotifyError>;
}

/// Default channel: writes a structured log line instead of delivering
/// anything. Stands in until a real channel (email, webhook) is wired up.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify_assignment(&self, email: &str, task_title: &str) -> Result<(), NotifyError> {
        info!(email, task_title, "assignment notification");
        Ok(())
    }
}
