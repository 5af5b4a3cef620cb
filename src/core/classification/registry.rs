// Named, ordered set of configured classifiers.
//
// Registration order matters: the first registered provider is the default
// whenever the caller names no provider or names one that isn't registered.

use super::classifier::{ClassificationOutcome, Classifier, ClassifierError};
use std::sync::Arc;

/// An outcome together with the name of the provider that produced it.
#[derive(Debug, Clone)]
pub struct ProviderOutcome {
    pub provider: String,
    pub outcome: ClassificationOutcome,
}

struct RegisteredClassifier {
    name: String,
    classifier: Arc<dyn Classifier>,
}

#[derive(Default)]
pub struct ClassifierRegistry {
    providers: Vec<RegisteredClassifier>,
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider. Re-registering a name replaces it in place.
    pub fn register(&mut self, name: impl Into<String>, classifier: Arc<dyn Classifier>) {
        let name = name.into();
        if let Some(existing) = self.providers.iter_mut().find(|p| p.name == name) {
            existing.classifier = classifier;
        } else {
            self.providers.push(RegisteredClassifier { name, classifier });
        }
    }

    pub fn with(mut self, name: impl Into<String>, classifier: Arc<dyn Classifier>) -> Self {
        self.register(name, classifier);
        self
    }

    /// Provider names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Pick the requested provider, falling back to the first registered one.
    pub fn resolve(
        &self,
        requested: Option<&str>,
    ) -> Result<(&str, &Arc<dyn Classifier>), ClassifierError> {
        let chosen = requested
            .and_then(|name| self.providers.iter().find(|p| p.name == name))
            .or_else(|| self.providers.first())
            .ok_or_else(|| ClassifierError::Config("No LLM providers configured".to_string()))?;

        if let Some(name) = requested {
            if name != chosen.name {
                tracing::warn!(
                    requested = name,
                    provider = %chosen.name,
                    "Requested classifier not configured, using default"
                );
            }
        }

        Ok((chosen.name.as_str(), &chosen.classifier))
    }

    pub async fn analyze_text(
        &self,
        text: &str,
        provider: Option<&str>,
    ) -> Result<ProviderOutcome, ClassifierError> {
        let (name, classifier) = self.resolve(provider)?;
        let outcome = classifier.analyze_text(text).await?;
        Ok(ProviderOutcome {
            provider: name.to_string(),
            outcome,
        })
    }

    pub async fn analyze_image(
        &self,
        encoded_image: &str,
        provider: Option<&str>,
    ) -> Result<ProviderOutcome, ClassifierError> {
        let (name, classifier) = self.resolve(provider)?;
        let outcome = classifier.analyze_image(encoded_image).await?;
        Ok(ProviderOutcome {
            provider: name.to_string(),
            outcome,
        })
    }
}
