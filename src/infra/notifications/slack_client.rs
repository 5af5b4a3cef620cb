// Slack incoming-webhook notifier.
//
// The webhook decides where the message lands; the `channel` field is only a
// hint that legacy webhooks honour. Slack answers 200 on success.

use crate::core::config::SlackConfig;
use crate::core::notifications::{DeliveryOutcome, NotificationChannel, Notifier, NotifyError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    channel: &'a str,
    text: String,
    username: &'a str,
    icon_emoji: &'a str,
}

pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
    channel: String,
    username: String,
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig, timeout: Duration) -> Result<Self, NotifyError> {
        if config.webhook_url.is_empty() {
            return Err(NotifyError::Config(
                "Slack webhook URL not configured".to_string(),
            ));
        }

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            webhook_url: config.webhook_url.clone(),
            channel: config.channel.clone(),
            username: config.username.clone(),
        })
    }

    fn payload<'a>(&'a self, message: &str) -> WebhookPayload<'a> {
        WebhookPayload {
            channel: &self.channel,
            text: format!("🚨 Content Moderation Alert\n\n{}", message),
            username: &self.username,
            icon_emoji: ":warning:",
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Slack
    }

    /// Slack webhooks are broadcast; the recipient is ignored.
    async fn send(
        &self,
        message: &str,
        _recipient: Option<&str>,
    ) -> Result<DeliveryOutcome, NotifyError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&self.payload(message))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            Ok(DeliveryOutcome::success(
                NotificationChannel::Slack,
                "Notification sent successfully",
            ))
        } else {
            Ok(DeliveryOutcome::failed(
                NotificationChannel::Slack,
                format!("Slack API error: {}", status.as_u16()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier_for(webhook_url: String) -> SlackNotifier {
        let config = SlackConfig {
            webhook_url,
            channel: "#moderation".to_string(),
            username: "SCM Bot".to_string(),
        };
        SlackNotifier::new(&config, Duration::from_secs(5)).unwrap()
    }

    fn notifier() -> SlackNotifier {
        let config = SlackConfig {
            webhook_url: "https://hooks.slack.com/services/T/B/X".to_string(),
            channel: "#moderation".to_string(),
            username: "SCM Bot".to_string(),
        };
        SlackNotifier::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_payload_shape() {
        let notifier = notifier();
        let payload = serde_json::to_value(notifier.payload("**User:** a@b.c")).unwrap();

        assert_eq!(payload["channel"], "#moderation");
        assert_eq!(payload["username"], "SCM Bot");
        assert_eq!(payload["icon_emoji"], ":warning:");
        assert_eq!(
            payload["text"],
            "🚨 Content Moderation Alert\n\n**User:** a@b.c"
        );
    }

    #[test]
    fn test_empty_webhook_is_config_error() {
        let config = SlackConfig {
            webhook_url: String::new(),
            channel: "#general".to_string(),
            username: "SCM Bot".to_string(),
        };
        assert!(matches!(
            SlackNotifier::new(&config, Duration::from_secs(5)),
            Err(NotifyError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_ok_response_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/T/B/X"))
            .and(body_partial_json(serde_json::json!({"channel": "#moderation"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = notifier_for(format!("{}/services/T/B/X", server.uri()))
            .send("alert", None)
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.channel, NotificationChannel::Slack);
    }

    #[tokio::test]
    async fn test_rejected_webhook_is_failed_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no_service"))
            .mount(&server)
            .await;

        let outcome = notifier_for(format!("{}/services/T/B/X", server.uri()))
            .send("alert", None)
            .await
            .unwrap();

        assert!(!outcome.is_success());
        assert_eq!(outcome.detail, "Slack API error: 404");
    }

    #[tokio::test]
    async fn test_unreachable_webhook_error_hides_url() {
        let err = notifier_for("http://127.0.0.1:1/services/T/B/SECRET".to_string())
            .send("alert", None)
            .await
            .unwrap_err();

        assert!(matches!(err, NotifyError::Transport(_)));
        assert!(!err.to_string().contains("SECRET"));
    }
}
