// Application configuration.
//
// Read once at startup from the environment (after `dotenv` has merged any
// `.env` file) and handed to the composition root. Nothing else in the crate
// reads environment variables.

use crate::core::notifications::NotificationChannel;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DATABASE_PATH: &str = "data/moderation.db";
/// `MODERATION_DB_PATH` value that selects the in-memory store.
pub const IN_MEMORY_DATABASE: &str = ":memory:";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

// ============================================================================
// CLASSIFIERS
// ============================================================================

/// Wire protocol a classifier speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    /// OpenAI-style chat completions (OpenAI itself and OpenRouter).
    ChatCompletions,
    /// Google Gemini `generateContent`.
    Gemini,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Provider name callers use to select it ("openai", "gemini", ...).
    pub name: String,
    pub kind: ClassifierKind,
    pub api_key: String,
    pub model: String,
    pub vision_model: String,
    pub base_url: String,
}

struct ProviderDefaults {
    name: &'static str,
    kind: ClassifierKind,
    key_var: &'static str,
    model_var: &'static str,
    vision_model_var: &'static str,
    base_url_var: &'static str,
    model: &'static str,
    vision_model: &'static str,
    base_url: &'static str,
}

// Registration order; the first configured entry is the default provider.
const PROVIDERS: [ProviderDefaults; 3] = [
    ProviderDefaults {
        name: "openai",
        kind: ClassifierKind::ChatCompletions,
        key_var: "OPENAI_API_KEY",
        model_var: "OPENAI_MODEL",
        vision_model_var: "OPENAI_VISION_MODEL",
        base_url_var: "OPENAI_BASE_URL",
        model: "gpt-4",
        vision_model: "gpt-4-vision-preview",
        base_url: "https://api.openai.com/v1",
    },
    ProviderDefaults {
        name: "gemini",
        kind: ClassifierKind::Gemini,
        key_var: "GEMINI_API_KEY",
        model_var: "GEMINI_MODEL",
        vision_model_var: "GEMINI_VISION_MODEL",
        base_url_var: "GEMINI_BASE_URL",
        model: "gemini-2.5-pro",
        vision_model: "gemini-2.5-pro",
        base_url: "https://generativelanguage.googleapis.com/v1beta",
    },
    ProviderDefaults {
        name: "openrouter",
        kind: ClassifierKind::ChatCompletions,
        key_var: "OPENROUTER_API_KEY",
        model_var: "OPENROUTER_MODEL",
        vision_model_var: "OPENROUTER_VISION_MODEL",
        base_url_var: "OPENROUTER_BASE_URL",
        model: "deepseek/deepseek-chat-v3.1:free",
        vision_model: "openai/gpt-4o-mini",
        base_url: "https://openrouter.ai/api/v1",
    },
];

// ============================================================================
// NOTIFICATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SlackConfig {
    pub webhook_url: String,
    pub channel: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailConfig {
    pub api_key: String,
    /// Checked at send time, so a missing sender only fails the email channel.
    pub sender_email: Option<String>,
    /// When set, every alert goes here instead of to the submitter.
    pub recipient_override: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationConfig {
    pub slack: Option<SlackConfig>,
    pub email: Option<EmailConfig>,
}

// ============================================================================
// APP CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub discord_token: String,
    pub database_path: String,
    pub classifiers: Vec<ClassifierConfig>,
    pub notifications: NotificationConfig,
    /// Channels alerts go to; `None` means every configured channel.
    pub alert_channels: Option<Vec<NotificationChannel>>,
    pub http_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let discord_token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;
        let database_path =
            get("MODERATION_DB_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());

        let http_timeout = match get("HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "HTTP_TIMEOUT_SECS",
                        value: raw,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let mut classifiers: Vec<ClassifierConfig> = PROVIDERS
            .iter()
            .filter_map(|p| {
                let api_key = get(p.key_var).filter(|key| !is_placeholder(p.name, key))?;
                Some(ClassifierConfig {
                    name: p.name.to_string(),
                    kind: p.kind,
                    api_key,
                    model: get(p.model_var).unwrap_or_else(|| p.model.to_string()),
                    vision_model: get(p.vision_model_var)
                        .unwrap_or_else(|| p.vision_model.to_string()),
                    base_url: get(p.base_url_var).unwrap_or_else(|| p.base_url.to_string()),
                })
            })
            .collect();

        if let Some(order) = get("CLASSIFIER_ORDER") {
            reorder(&mut classifiers, &order);
        }

        let slack = get("SLACK_WEBHOOK_URL").map(|webhook_url| SlackConfig {
            webhook_url,
            channel: get("SLACK_CHANNEL").unwrap_or_else(|| "#general".to_string()),
            username: get("SLACK_USERNAME").unwrap_or_else(|| "SCM Bot".to_string()),
        });
        let email = get("BREVO_API_KEY").map(|api_key| EmailConfig {
            api_key,
            sender_email: get("SENDER_EMAIL"),
            recipient_override: get("ALERT_EMAIL_RECIPIENT"),
        });

        let alert_channels = match get("ALERT_CHANNELS") {
            Some(raw) => Some(parse_channels(&raw)?),
            None => None,
        };

        Ok(Self {
            discord_token,
            database_path,
            classifiers,
            notifications: NotificationConfig { slack, email },
            alert_channels,
            http_timeout,
        })
    }

    pub fn uses_in_memory_store(&self) -> bool {
        self.database_path == IN_MEMORY_DATABASE
    }
}

/// Sample configs ship keys as `your_<name>_api_key_here`.
fn is_placeholder(provider: &str, key: &str) -> bool {
    key == format!("your_{provider}_api_key_here")
}

/// Move the named providers to the front, in the given order.
/// Unknown names are ignored; unnamed providers keep their relative order.
fn reorder(classifiers: &mut Vec<ClassifierConfig>, order: &str) {
    let mut ordered = Vec::with_capacity(classifiers.len());
    for name in order.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if let Some(pos) = classifiers.iter().position(|c| c.name == name) {
            ordered.push(classifiers.remove(pos));
        }
    }
    ordered.append(classifiers);
    *classifiers = ordered;
}

fn parse_channels(raw: &str) -> Result<Vec<NotificationChannel>, ConfigError> {
    let mut channels = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let channel = name
            .parse::<NotificationChannel>()
            .map_err(|_| ConfigError::Invalid {
                name: "ALERT_CHANNELS",
                value: raw.to_string(),
            })?;
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }
    Ok(channels)
}
