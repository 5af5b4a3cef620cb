// OpenAI-compatible chat completions classifier.
//
// Speaks the `/chat/completions` protocol, so the same client serves OpenAI
// itself and OpenRouter; only the base URL, key and model names differ.
// The model's answer is at `choices[0].message.content`.

use crate::core::classification::prompts::{image_mime_type, image_prompt, text_prompt};
use crate::core::classification::{ClassificationOutcome, Classifier, ClassifierError};
use crate::core::config::ClassifierConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const TEXT_TEMPERATURE: f64 = 0.1;
const IMAGE_MAX_TOKENS: u32 = 300;

pub struct OpenAiCompatibleClient {
    client: Client,
    /// Provider name, used in logs and error messages.
    name: String,
    api_key: String,
    base_url: String,
    model: String,
    vision_model: String,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &ClassifierConfig, timeout: Duration) -> Result<Self, ClassifierError> {
        if config.api_key.is_empty() {
            return Err(ClassifierError::Config(format!(
                "{} API key not configured",
                config.name
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            name: config.name.clone(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            vision_model: config.vision_model.clone(),
        })
    }

    fn text_payload(&self, text: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [{"role": "user", "content": text_prompt(text)}],
            "temperature": TEXT_TEMPERATURE,
        })
    }

    fn image_payload(&self, encoded_image: &str) -> Value {
        let data_uri = format!(
            "data:{};base64,{}",
            image_mime_type(encoded_image),
            encoded_image.trim()
        );

        json!({
            "model": self.vision_model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": image_prompt()},
                    {"type": "image_url", "image_url": {"url": data_uri}},
                ],
            }],
            "max_tokens": IMAGE_MAX_TOKENS,
        })
    }

    async fn complete(&self, payload: Value) -> Result<ClassificationOutcome, ClassifierError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(ClassifierError::Transport(format!(
                "{} API error: {} - {}",
                self.name, status, text
            )));
        }

        let body: Value = response.json().await?;
        tracing::debug!(provider = %self.name, "Chat completion received");

        Ok(outcome_from_response(body))
    }
}

/// Read the outcome out of a chat completions response body.
fn outcome_from_response(body: Value) -> ClassificationOutcome {
    match body["choices"][0]["message"]["content"].as_str() {
        Some(content) => {
            let content = content.to_string();
            ClassificationOutcome::from_model_text(&content, body)
        }
        None => {
            tracing::warn!("Chat completion has no message content, defaulting to safe");
            ClassificationOutcome::safe_default("Unable to parse LLM response: empty answer", body)
        }
    }
}

#[async_trait]
impl Classifier for OpenAiCompatibleClient {
    async fn analyze_text(&self, text: &str) -> Result<ClassificationOutcome, ClassifierError> {
        self.complete(self.text_payload(text)).await
    }

    async fn analyze_image(
        &self,
        encoded_image: &str,
    ) -> Result<ClassificationOutcome, ClassifierError> {
        self.complete(self.image_payload(encoded_image)).await
    }
}
