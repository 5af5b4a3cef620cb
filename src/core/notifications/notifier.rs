use super::notification_models::{DeliveryOutcome, NotificationChannel};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// One concrete alert channel.
///
/// An `Err` means the attempt never got a verdict from the remote side; a
/// rejected delivery comes back as `Ok` with a failed outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> NotificationChannel;

    async fn send(
        &self,
        message: &str,
        recipient: Option<&str>,
    ) -> Result<DeliveryOutcome, NotifyError>;
}
