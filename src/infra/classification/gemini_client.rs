// =============================================================================
// GEMINI CLASSIFIER - Google AI Studio generateContent
// =============================================================================
//
// Differences from the chat completions client:
// - Authentication: API key goes in the `x-goog-api-key` header.
// - The verdict comes back as a call to the `content_moderation_tool`
//   function declaration; the call's `args` object IS the outcome.
// - Images are sent inline (`inlineData`) next to the prompt text.
// - Thinking is enabled with a dynamic budget (-1).

use crate::core::classification::prompts::{image_mime_type, image_prompt, text_prompt};
use crate::core::classification::{ClassificationOutcome, Classifier, ClassifierError};
use crate::core::config::ClassifierConfig;
use crate::core::moderation::Classification;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

const TOOL_NAME: &str = "content_moderation_tool";
const TOOL_INSTRUCTION: &str = "Use the content_moderation_tool to provide your analysis with classification, confidence, and reasoning.";
const DYNAMIC_THINKING_BUDGET: i32 = -1;

// =============================================================================
// GEMINI API DATA STRUCTURES
// =============================================================================
//
// See: https://ai.google.dev/api/generate-content

/// A single part of content: text, inline image data or a function call.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    /// Base64-encoded bytes.
    data: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct GeminiFunctionCall {
    name: String,
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    /// -1 lets the model decide how much to think.
    thinking_budget: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: GeminiFunctionParameters,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionParameters {
    #[serde(rename = "type")]
    param_type: String,

    properties: BTreeMap<String, GeminiPropertySchema>,

    required: Vec<String>,
}

#[derive(Debug, Serialize)]
struct GeminiPropertySchema {
    #[serde(rename = "type")]
    prop_type: String,

    description: String,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    enum_values: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    tools: Vec<GeminiTool>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

/// The single function the model is asked to call with its verdict.
fn moderation_tool() -> GeminiTool {
    let property = |prop_type: &str, description: &str| GeminiPropertySchema {
        prop_type: prop_type.to_string(),
        description: description.to_string(),
        enum_values: None,
    };

    let mut properties = BTreeMap::new();
    properties.insert(
        "classification".to_string(),
        GeminiPropertySchema {
            enum_values: Some(
                Classification::ALL
                    .iter()
                    .map(|c| c.as_str().to_string())
                    .collect(),
            ),
            ..property(
                "STRING",
                "Content classification: toxic, spam, harassment, or safe",
            )
        },
    );
    properties.insert(
        "confidence".to_string(),
        property("NUMBER", "Confidence score between 0 and 1"),
    );
    properties.insert(
        "reasoning".to_string(),
        property("STRING", "Detailed reasoning for the classification"),
    );

    GeminiTool {
        function_declarations: vec![GeminiFunctionDeclaration {
            name: TOOL_NAME.to_string(),
            description: "Analyze content for moderation and provide detailed reasoning"
                .to_string(),
            parameters: GeminiFunctionParameters {
                param_type: "OBJECT".to_string(),
                properties,
                required: vec![
                    "classification".to_string(),
                    "confidence".to_string(),
                    "reasoning".to_string(),
                ],
            },
        }],
    }
}

// =============================================================================
// GEMINI CLIENT IMPLEMENTATION
// =============================================================================

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    vision_model: String,
}

impl GeminiClient {
    pub fn new(config: &ClassifierConfig, timeout: Duration) -> Result<Self, ClassifierError> {
        if config.api_key.is_empty() {
            return Err(ClassifierError::Config(
                "Gemini API key not configured".to_string(),
            ));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            vision_model: config.vision_model.clone(),
        })
    }

    fn text_part(text: String) -> Part {
        Part {
            text: Some(text),
            ..Part::default()
        }
    }

    fn build_request(parts: Vec<Part>) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: GenerationConfig {
                thinking_config: ThinkingConfig {
                    thinking_budget: DYNAMIC_THINKING_BUDGET,
                },
            },
            tools: vec![moderation_tool()],
        }
    }

    fn text_request(text: &str) -> GenerateContentRequest {
        Self::build_request(vec![Self::text_part(format!(
            "{}\n\n{}",
            text_prompt(text),
            TOOL_INSTRUCTION
        ))])
    }

    fn image_request(encoded_image: &str) -> GenerateContentRequest {
        Self::build_request(vec![
            Part {
                inline_data: Some(InlineData {
                    mime_type: image_mime_type(encoded_image).to_string(),
                    data: encoded_image.trim().to_string(),
                }),
                ..Part::default()
            },
            Self::text_part(format!("{}\n\n{}", image_prompt(), TOOL_INSTRUCTION)),
        ])
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<ClassificationOutcome, ClassifierError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        tracing::debug!(
            "Gemini request to model {}: {} parts",
            model,
            request.contents.iter().map(|c| c.parts.len()).sum::<usize>()
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            // Try to parse as Gemini error response for better error messages
            let detail = serde_json::from_str::<GeminiErrorResponse>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(ClassifierError::Transport(format!(
                "Gemini API error ({}): {}",
                status, detail
            )));
        }

        let body: Value = response.json().await?;
        Ok(outcome_from_response(body))
    }
}

/// Pull the verdict out of a generateContent response body.
///
/// Preference order: a `content_moderation_tool` call, then a text part
/// holding the JSON answer, then the safe default.
fn outcome_from_response(body: Value) -> ClassificationOutcome {
    let parsed = match serde_json::from_value::<GenerateContentResponse>(body.clone()) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Unexpected Gemini response shape: {}", e);
            return ClassificationOutcome::safe_default(
                "Unable to parse LLM response - no function call found",
                body,
            );
        }
    };

    let parts: Vec<Part> = parsed
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts)
        .unwrap_or_default();

    if let Some(call) = parts
        .iter()
        .filter_map(|p| p.function_call.as_ref())
        .find(|call| call.name == TOOL_NAME)
    {
        if let Some(outcome) = ClassificationOutcome::from_value(&call.args, body.clone()) {
            return outcome;
        }
        tracing::warn!("Gemini function call has no valid classification, defaulting to safe");
        return ClassificationOutcome::safe_default(
            "Unable to parse LLM response: invalid classification",
            body,
        );
    }

    let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
    if !text.trim().is_empty() {
        return ClassificationOutcome::from_model_text(&text, body);
    }

    tracing::warn!("Gemini answered without a function call, defaulting to safe");
    ClassificationOutcome::safe_default(
        "Unable to parse LLM response - no function call found",
        body,
    )
}

#[async_trait]
impl Classifier for GeminiClient {
    async fn analyze_text(&self, text: &str) -> Result<ClassificationOutcome, ClassifierError> {
        self.generate(&self.model, &Self::text_request(text)).await
    }

    async fn analyze_image(
        &self,
        encoded_image: &str,
    ) -> Result<ClassificationOutcome, ClassifierError> {
        self.generate(&self.vision_model, &Self::image_request(encoded_image))
            .await
    }
}
