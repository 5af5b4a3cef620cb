// Fan-out of one alert across every configured channel.
//
// Each channel is attempted on its own: an error from one never stops the
// others, and a requested channel that isn't configured still gets a
// (failed) outcome so the caller can log it.

use super::notification_models::{DeliveryOutcome, ModerationAlert, NotificationChannel};
use super::notifier::Notifier;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
pub struct NotificationDispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel. A second notifier for the same channel replaces the first.
    pub fn register(&mut self, notifier: Arc<dyn Notifier>) {
        let channel = notifier.channel();
        self.notifiers.retain(|n| n.channel() != channel);
        self.notifiers.push(notifier);
    }

    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.register(notifier);
        self
    }

    /// Configured channels in registration order.
    pub fn channels(&self) -> Vec<NotificationChannel> {
        self.notifiers.iter().map(|n| n.channel()).collect()
    }

    fn notifier_for(&self, channel: NotificationChannel) -> Option<&Arc<dyn Notifier>> {
        self.notifiers.iter().find(|n| n.channel() == channel)
    }

    /// Send `message` on the requested channels, or on all configured ones.
    ///
    /// Always returns one outcome per targeted channel.
    pub async fn send(
        &self,
        message: &str,
        recipient: Option<&str>,
        channels: Option<&[NotificationChannel]>,
    ) -> BTreeMap<NotificationChannel, DeliveryOutcome> {
        let targets = match channels {
            Some(requested) if !requested.is_empty() => requested.to_vec(),
            _ => self.channels(),
        };

        let mut outcomes = BTreeMap::new();
        for channel in targets {
            let outcome = match self.notifier_for(channel) {
                Some(notifier) => match notifier.send(message, recipient).await {
                    Ok(outcome) => outcome,
                    Err(e) => DeliveryOutcome::failed(channel, e.to_string()),
                },
                None => DeliveryOutcome::failed(channel, "Provider not configured"),
            };

            if outcome.is_success() {
                tracing::debug!(channel = %channel, "Notification delivered");
            } else {
                tracing::warn!(channel = %channel, detail = %outcome.detail, "Notification failed");
            }
            outcomes.insert(channel, outcome);
        }

        outcomes
    }

    /// Render a moderation alert and fan it out, addressed to the submitter.
    pub async fn send_moderation_alert(
        &self,
        alert: &ModerationAlert,
        channels: Option<&[NotificationChannel]>,
    ) -> BTreeMap<NotificationChannel, DeliveryOutcome> {
        let message = alert.render();
        self.send(&message, Some(&alert.submitter), channels).await
    }
}
