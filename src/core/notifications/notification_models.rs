use crate::core::moderation::{Classification, ContentKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Alert channels a deployment can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    /// Broadcast webhook, no per-recipient addressing.
    Slack,
    /// Addressed channel, needs a recipient.
    Email,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Slack => "slack",
            NotificationChannel::Email => "email",
        }
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "slack" => Ok(NotificationChannel::Slack),
            "email" => Ok(NotificationChannel::Email),
            other => Err(format!("unknown notification channel '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// What happened when one channel was asked to deliver one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryOutcome {
    pub status: DeliveryStatus,
    pub channel: NotificationChannel,
    pub detail: String,
}

impl DeliveryOutcome {
    pub fn success(channel: NotificationChannel, detail: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::Success,
            channel,
            detail: detail.into(),
        }
    }

    pub fn failed(channel: NotificationChannel, detail: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::Failed,
            channel,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}

/// Everything an alert about flagged content mentions.
#[derive(Debug, Clone)]
pub struct ModerationAlert {
    pub submitter: String,
    pub kind: ContentKind,
    pub classification: Classification,
    pub confidence: f64,
    pub reasoning: String,
}

impl ModerationAlert {
    pub fn render(&self) -> String {
        format!(
            "**Content Moderation Alert**\n\n\
             **User:** {}\n\
             **Content Type:** {}\n\
             **Classification:** {}\n\
             **Confidence:** {:.2}\n\
             **Reasoning:** {}\n\n\
             **Action Required:** Review this content and take appropriate action.",
            self.submitter,
            self.kind,
            self.classification.as_str().to_uppercase(),
            self.confidence,
            self.reasoning
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_mentions_every_field() {
        let alert = ModerationAlert {
            submitter: "mallory@example.com".to_string(),
            kind: ContentKind::Text,
            classification: Classification::Spam,
            confidence: 0.9,
            reasoning: "promotional language".to_string(),
        };

        let message = alert.render();
        assert!(message.contains("**User:** mallory@example.com"));
        assert!(message.contains("**Content Type:** text"));
        assert!(message.contains("**Classification:** SPAM"));
        assert!(message.contains("**Confidence:** 0.90"));
        assert!(message.contains("**Reasoning:** promotional language"));
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(" Slack ".parse::<NotificationChannel>(), Ok(NotificationChannel::Slack));
        assert_eq!("email".parse::<NotificationChannel>(), Ok(NotificationChannel::Email));
        assert!("sms".parse::<NotificationChannel>().is_err());
    }
}
