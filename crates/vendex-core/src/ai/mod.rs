//! Pluggable classifier backend abstraction
//!
//! # Architecture
//!
//! - `ClassifierBackend` trait: the single operation Vendex needs from a
//!   language model, mapping a transaction description to a vendor
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `OllamaBackend`, `MockBackend`
//!
//! # Usage
//!
//! ```rust,ignore
//! let client = AIClient::from_config(&config.classifier);
//! let known = vec!["Amazon".to_string()];
//! let result = client.classify_vendor("AMZN MKTP US*1234 WA", &known).await?;
//! println!("Vendor: {}", result.vendor);
//! ```

mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;

pub use mock::{classify_mock, MockBackend};
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::config::{BackendKind, ClassifierConfig};
use crate::error::{Error, Result};
use crate::models::VendorClassification;
use crate::prompts::{PromptId, PromptLibrary};

/// Trait implemented by every classifier backend
#[async_trait]
pub trait ClassifierBackend: Send + Sync {
    /// Classify a transaction description
    ///
    /// `known_vendors` are hints the model should reuse when the description
    /// matches one of them. Callers decide how many to pass.
    async fn classify_vendor(
        &self,
        description: &str,
        known_vendors: &[String],
    ) -> Result<VendorClassification>;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// OpenAI chat completions API (or any compatible server)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Ollama chat API
    Ollama(OllamaBackend),
    /// Mock backend for testing and offline runs
    Mock(MockBackend),
}

impl AIClient {
    /// Build the client selected by the classifier config
    pub fn from_config(config: &ClassifierConfig) -> Self {
        match config.backend {
            BackendKind::OpenAI => AIClient::OpenAICompatible(
                OpenAICompatibleBackend::with_api_key(
                    &config.openai.base_url,
                    &config.openai.model,
                    &config.openai.api_key,
                )
                .with_temperature(config.temperature),
            ),
            BackendKind::Ollama => AIClient::Ollama(
                OllamaBackend::new(&config.ollama.host, &config.ollama.model)
                    .with_temperature(config.temperature),
            ),
            BackendKind::Mock => AIClient::Mock(MockBackend::new()),
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl ClassifierBackend for AIClient {
    async fn classify_vendor(
        &self,
        description: &str,
        known_vendors: &[String],
    ) -> Result<VendorClassification> {
        match self {
            AIClient::OpenAICompatible(b) => b.classify_vendor(description, known_vendors).await,
            AIClient::Ollama(b) => b.classify_vendor(description, known_vendors).await,
            AIClient::Mock(b) => b.classify_vendor(description, known_vendors).await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Ollama(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Ollama(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

/// System and user messages for a vendor extraction request
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExtractionPrompt {
    pub system: String,
    pub user: String,
}

impl ExtractionPrompt {
    pub(crate) fn render(
        prompts: &RwLock<PromptLibrary>,
        description: &str,
        known_vendors: &[String],
    ) -> Result<Self> {
        let mut prompts = prompts
            .write()
            .map_err(|_| Error::Classifier("Failed to acquire prompt library lock".into()))?;
        let template = prompts.get(PromptId::ExtractVendor)?;

        let hints = known_vendors.join(", ");
        let mut vars = HashMap::new();
        vars.insert("description", description);
        if !hints.is_empty() {
            vars.insert("known_vendors", hints.as_str());
        }

        Ok(Self {
            system: template.render_system(&vars),
            user: template.render_user(&vars),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_ai_client_mock() {
        let client = AIClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
    }

    #[test]
    fn test_from_config_selects_backend() {
        let mut config = Config::default();
        let client = AIClient::from_config(&config.classifier);
        assert!(matches!(client, AIClient::OpenAICompatible(_)));
        assert_eq!(client.model(), "gpt-4o-mini");
        assert_eq!(client.host(), "https://api.openai.com");

        config.classifier.backend = BackendKind::Ollama;
        let client = AIClient::from_config(&config.classifier);
        assert!(matches!(client, AIClient::Ollama(_)));
        assert_eq!(client.model(), "llama3.2");

        config.classifier.backend = BackendKind::Mock;
        let client = AIClient::from_config(&config.classifier);
        assert!(matches!(client, AIClient::Mock(_)));
    }

    #[test]
    fn test_extraction_prompt_includes_hints() {
        let prompts = RwLock::new(PromptLibrary::embedded_only());
        let known = vec!["Amazon".to_string(), "Costco".to_string()];
        let prompt = ExtractionPrompt::render(&prompts, "AMZN MKTP", &known).unwrap();
        assert!(prompt.system.contains("Known vendors"));
        assert!(prompt.system.contains("Amazon, Costco"));
        assert!(prompt.user.contains("AMZN MKTP"));

        let prompt = ExtractionPrompt::render(&prompts, "AMZN MKTP", &[]).unwrap();
        assert!(!prompt.system.contains("Known vendors"));
    }

    #[test]
    fn test_description_with_placeholder_sent_verbatim() {
        let prompts = RwLock::new(PromptLibrary::embedded_only());
        let known = vec!["SECRETVENDOR".to_string()];

        for _ in 0..20 {
            let prompt =
                ExtractionPrompt::render(&prompts, "PAY i {{known_vendors}}", &known).unwrap();
            assert_eq!(
                prompt.user,
                "Transaction description: \"PAY i {{known_vendors}}\""
            );
            assert!(prompt.system.contains("SECRETVENDOR"));
        }
    }

    #[tokio::test]
    async fn test_mock_classify_vendor() {
        let client = AIClient::mock();
        let result = client.classify_vendor("NETFLIX.COM", &[]).await.unwrap();
        assert_eq!(result.vendor, "Netflix");
        assert!(result.category.is_some());
    }
}
