// Alert channel implementations.

pub mod email_client;
pub mod slack_client;

pub use email_client::BrevoEmailNotifier;
pub use slack_client::SlackNotifier;

use crate::core::config::NotificationConfig;
use crate::core::notifications::{NotificationDispatcher, NotifyError};
use std::sync::Arc;
use std::time::Duration;

// Request URLs can carry secrets (webhook paths, query keys), so they never
// reach the error text.
impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Transport(err.without_url().to_string())
    }
}

/// Register every configured channel. A channel that fails to build is
/// left out, so alerts for it are logged as "Provider not configured".
pub fn build_dispatcher(config: &NotificationConfig, timeout: Duration) -> NotificationDispatcher {
    let mut dispatcher = NotificationDispatcher::new();

    if let Some(slack) = &config.slack {
        match SlackNotifier::new(slack, timeout) {
            Ok(notifier) => dispatcher.register(Arc::new(notifier)),
            Err(e) => tracing::warn!("Failed to initialize Slack notifier: {}", e),
        }
    }

    if let Some(email) = &config.email {
        match BrevoEmailNotifier::new(email, timeout) {
            Ok(notifier) => {
                if email.sender_email.is_none() {
                    tracing::warn!("SENDER_EMAIL is not set; email alerts will fail");
                }
                if email.recipient_override.is_none() {
                    tracing::warn!(
                        "ALERT_EMAIL_RECIPIENT is not set; only submitters with an email identity get alerts"
                    );
                }
                dispatcher.register(Arc::new(notifier));
            }
            Err(e) => tracing::warn!("Failed to initialize email notifier: {}", e),
        }
    }

    tracing::info!(channels = ?dispatcher.channels(), "Notification channels ready");
    dispatcher
}
