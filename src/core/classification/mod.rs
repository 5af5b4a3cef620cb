// Core classification module - the provider abstraction over LLM backends.

pub mod classifier;
pub mod prompts;
pub mod registry;

pub use classifier::{ClassificationOutcome, Classifier, ClassifierError};
pub use registry::{ClassifierRegistry, ProviderOutcome};
