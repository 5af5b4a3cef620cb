// Classification port and outcome coercion.
//
// Every backend answers with free-form model output. This module turns that
// output into the fixed three-field outcome. A malformed answer never becomes
// an error: it degrades to a `safe` verdict with the failure spelled out in
// the reasoning. Transport and credential problems DO surface as errors.

use crate::core::moderation::Classification;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Confidence used whenever the model's answer could not be read.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Missing credentials or no provider registered at all.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network failure, timeout or non-success HTTP status.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// The verdict a provider produced for one piece of content.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationOutcome {
    pub classification: Classification,
    pub confidence: f64,
    pub reasoning: String,
    /// Provider payload the outcome was read from.
    pub raw: Value,
}

impl ClassificationOutcome {
    /// Benign verdict used when the model's answer is unreadable.
    pub fn safe_default(reasoning: impl Into<String>, raw: Value) -> Self {
        Self {
            classification: Classification::Safe,
            confidence: FALLBACK_CONFIDENCE,
            reasoning: reasoning.into(),
            raw,
        }
    }

    /// Read an outcome from a JSON object such as
    /// `{"classification": "spam", "confidence": 0.9, "reasoning": "..."}`.
    ///
    /// Returns `None` when the classification is missing or not one of the
    /// four labels. Confidence defaults to 0.0 and reasoning to "".
    pub fn from_value(value: &Value, raw: Value) -> Option<Self> {
        let classification = value
            .get("classification")?
            .as_str()?
            .trim()
            .to_lowercase()
            .parse::<Classification>()
            .ok()?;

        let confidence = match value.get("confidence") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        };

        let reasoning = value
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Some(Self {
            classification,
            confidence,
            reasoning,
            raw,
        })
    }

    /// Coerce a model's text answer into an outcome, never failing.
    pub fn from_model_text(text: &str, raw: Value) -> Self {
        match extract_json_object(text) {
            Some(value) => Self::from_value(&value, raw.clone()).unwrap_or_else(|| {
                tracing::warn!("Model answer has no valid classification, defaulting to safe");
                Self::safe_default("Unable to parse LLM response: invalid classification", raw)
            }),
            None => {
                tracing::warn!(
                    "Model answer is not JSON ({} chars), defaulting to safe",
                    text.len()
                );
                Self::safe_default("Unable to parse LLM response", raw)
            }
        }
    }
}

/// Find the JSON object in a model answer.
///
/// Models sometimes wrap the object in a markdown fence or a sentence, so we
/// fall back to the outermost `{ ... }` span.
fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }

    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// A concrete LLM backend able to classify text and images.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn analyze_text(&self, text: &str) -> Result<ClassificationOutcome, ClassifierError>;

    /// `encoded_image` is the base64 encoding of the image bytes.
    async fn analyze_image(
        &self,
        encoded_image: &str,
    ) -> Result<ClassificationOutcome, ClassifierError>;
}
