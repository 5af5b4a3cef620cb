// LLM classification backends.

pub mod gemini_client;
pub mod openai_client;

pub use gemini_client::GeminiClient;
pub use openai_client::OpenAiCompatibleClient;

use crate::core::classification::{Classifier, ClassifierError, ClassifierRegistry};
use crate::core::config::{ClassifierConfig, ClassifierKind};
use std::sync::Arc;
use std::time::Duration;

// Request URLs can carry secrets (webhook paths, query keys), so they never
// reach the error text.
impl From<reqwest::Error> for ClassifierError {
    fn from(err: reqwest::Error) -> Self {
        ClassifierError::Transport(err.without_url().to_string())
    }
}

/// Build a registry from the configured providers, keeping their order.
///
/// A provider that fails to initialise is skipped with a warning so the
/// others stay usable.
pub fn build_classifiers(configs: &[ClassifierConfig], timeout: Duration) -> ClassifierRegistry {
    let mut registry = ClassifierRegistry::new();

    for config in configs {
        let built: Result<Arc<dyn Classifier>, ClassifierError> = match config.kind {
            ClassifierKind::ChatCompletions => OpenAiCompatibleClient::new(config, timeout)
                .map(|c| Arc::new(c) as Arc<dyn Classifier>),
            ClassifierKind::Gemini => {
                GeminiClient::new(config, timeout).map(|c| Arc::new(c) as Arc<dyn Classifier>)
            }
        };

        match built {
            Ok(classifier) => {
                tracing::info!(provider = %config.name, model = %config.model, "Classifier registered");
                registry.register(config.name.clone(), classifier);
            }
            Err(e) => tracing::warn!(provider = %config.name, "Failed to initialize classifier: {}", e),
        }
    }

    if registry.is_empty() {
        tracing::warn!("No LLM providers configured; every submission will fail");
    }

    registry
}
