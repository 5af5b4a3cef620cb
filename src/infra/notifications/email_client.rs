// Transactional email notifier backed by Brevo (formerly Sendinblue).
//
// Brevo answers 201 Created when the message is accepted.
// See: https://developers.brevo.com/reference/sendtransacemail

use crate::core::config::EmailConfig;
use crate::core::notifications::{DeliveryOutcome, NotificationChannel, Notifier, NotifyError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";
const SENDER_NAME: &str = "SCM Content Moderation";
const SUBJECT: &str = "Content Moderation Alert";

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest<'a> {
    sender: Address<'a>,
    to: Vec<Address<'a>>,
    subject: &'a str,
    html_content: String,
}

pub struct BrevoEmailNotifier {
    client: Client,
    send_url: String,
    api_key: String,
    sender_email: Option<String>,
    recipient_override: Option<String>,
}

impl BrevoEmailNotifier {
    pub fn new(config: &EmailConfig, timeout: Duration) -> Result<Self, NotifyError> {
        if config.api_key.is_empty() {
            return Err(NotifyError::Config(
                "Brevo API key not configured".to_string(),
            ));
        }

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            send_url: BREVO_SEND_URL.to_string(),
            api_key: config.api_key.clone(),
            sender_email: config.sender_email.clone(),
            recipient_override: config.recipient_override.clone(),
        })
    }

    #[cfg(test)]
    fn with_send_url(mut self, send_url: impl Into<String>) -> Self {
        self.send_url = send_url.into();
        self
    }

    fn request<'a>(
        &self,
        sender: &'a str,
        recipient: &'a str,
        message: &str,
    ) -> SendEmailRequest<'a> {
        SendEmailRequest {
            sender: Address {
                email: sender,
                name: SENDER_NAME,
            },
            to: vec![Address {
                email: recipient,
                name: recipient.split('@').next().unwrap_or(recipient),
            }],
            subject: SUBJECT,
            html_content: html_body(message),
        }
    }
}

fn is_email_address(candidate: &str) -> bool {
    match candidate.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.contains('@')
        }
        None => false,
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\n' => escaped.push_str("<br>"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn html_body(message: &str) -> String {
    format!(
        "<html><body>\
         <h2>🚨 Content Moderation Alert</h2>\
         <p>{}</p>\
         <hr>\
         <p><small>This is an automated message from the SCM Content Moderation System.</small></p>\
         </body></html>",
        escape_html(message)
    )
}

#[async_trait]
impl Notifier for BrevoEmailNotifier {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Email
    }

    async fn send(
        &self,
        message: &str,
        recipient: Option<&str>,
    ) -> Result<DeliveryOutcome, NotifyError> {
        let sender = self
            .sender_email
            .as_deref()
            .ok_or_else(|| NotifyError::Config("Sender email not configured".to_string()))?;
        let recipient = self
            .recipient_override
            .as_deref()
            .or(recipient)
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| NotifyError::Config("No email recipient".to_string()))?;
        // Chat handles are not deliverable.
        if !is_email_address(recipient) {
            return Err(NotifyError::Config(format!(
                "Recipient '{}' is not an email address",
                recipient
            )));
        }

        let response = self
            .client
            .post(&self.send_url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&self.request(sender, recipient, message))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CREATED {
            Ok(DeliveryOutcome::success(
                NotificationChannel::Email,
                "Email sent successfully",
            ))
        } else {
            let text = response.text().await.unwrap_or_default();
            Ok(DeliveryOutcome::failed(
                NotificationChannel::Email,
                format!("Brevo API error: {} - {}", status.as_u16(), text),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(sender: Option<&str>, recipient_override: Option<&str>) -> BrevoEmailNotifier {
        let config = EmailConfig {
            api_key: "xkeysib-test".to_string(),
            sender_email: sender.map(str::to_string),
            recipient_override: recipient_override.map(str::to_string),
        };
        BrevoEmailNotifier::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_request_shape() {
        let notifier = notifier(Some("alerts@example.com"), None);
        let request = notifier.request("alerts@example.com", "mallory@example.com", "hi");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["sender"]["name"], "SCM Content Moderation");
        assert_eq!(json["sender"]["email"], "alerts@example.com");
        assert_eq!(json["to"][0]["email"], "mallory@example.com");
        assert_eq!(json["to"][0]["name"], "mallory");
        assert_eq!(json["subject"], "Content Moderation Alert");
        assert!(json["htmlContent"].as_str().unwrap().contains("<p>hi</p>"));
    }

    #[test]
    fn test_html_body_escapes_message() {
        let body = html_body("<script>x</script> & co\nline two");
        assert!(body.contains("&lt;script&gt;x&lt;/script&gt; &amp; co<br>line two"));
    }

    #[tokio::test]
    async fn test_missing_sender_is_config_error() {
        let notifier = notifier(None, None);
        let err = notifier.send("hi", Some("a@b.c")).await.unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_recipient_is_config_error() {
        let notifier = notifier(Some("alerts@example.com"), None);
        let err = notifier.send("hi", None).await.unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)));
    }

    #[tokio::test]
    async fn test_chat_handle_recipient_is_config_error() {
        let notifier = notifier(Some("alerts@example.com"), None);
        let err = notifier.send("hi", Some("alice")).await.unwrap_err();

        match err {
            NotifyError::Config(detail) => assert!(detail.contains("not an email address")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_email_address_check() {
        assert!(is_email_address("mallory@example.com"));
        assert!(!is_email_address("alice"));
        assert!(!is_email_address("@example.com"));
        assert!(!is_email_address("a@localhost"));
    }

    #[tokio::test]
    async fn test_created_response_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/smtp/email"))
            .and(header("api-key", "xkeysib-test"))
            .and(body_partial_json(serde_json::json!({
                "to": [{"email": "moderators@example.com"}]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "messageId": "<abc@smtp-relay.mailin.fr>"
            })))
            .expect(1)
            .mount(&server)
            .await;

        // The override wins over the submitter's handle.
        let notifier = notifier(Some("alerts@example.com"), Some("moderators@example.com"))
            .with_send_url(format!("{}/v3/smtp/email", server.uri()));
        let outcome = notifier.send("hi", Some("alice")).await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.channel, NotificationChannel::Email);
    }

    #[tokio::test]
    async fn test_rejected_send_is_failed_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid sender"))
            .mount(&server)
            .await;

        let notifier = notifier(Some("alerts@example.com"), None)
            .with_send_url(format!("{}/v3/smtp/email", server.uri()));
        let outcome = notifier.send("hi", Some("mallory@example.com")).await.unwrap();

        assert!(!outcome.is_success());
        assert_eq!(outcome.detail, "Brevo API error: 400 - invalid sender");
    }
}
