//! Vendor resolution with a per-run cache
//!
//! Looks up a description in the cache first, then asks the classifier.
//! Classifier failures degrade to a low-confidence fallback that is never
//! cached, so a later occurrence of the same description gets another try.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::ai::ClassifierBackend;
use crate::models::VendorClassification;

/// Number of known vendors passed to the classifier as hints
pub const DEFAULT_MAX_HINTS: usize = 20;

/// Outcome of resolving one description
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The classifier answered
    Classified(VendorClassification),
    /// Answered from the cache without a classifier call
    Cached(VendorClassification),
    /// The classifier failed; carries the fallback classification
    Fallback {
        classification: VendorClassification,
        error: String,
    },
}

impl Resolution {
    pub fn classification(&self) -> &VendorClassification {
        match self {
            Resolution::Classified(c) | Resolution::Cached(c) => c,
            Resolution::Fallback { classification, .. } => classification,
        }
    }

    pub fn into_classification(self) -> VendorClassification {
        match self {
            Resolution::Classified(c) | Resolution::Cached(c) => c,
            Resolution::Fallback { classification, .. } => classification,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback { .. })
    }

    /// Whether resolving this description made a classifier call
    pub fn reached_classifier(&self) -> bool {
        !matches!(self, Resolution::Cached(_))
    }
}

/// Resolves descriptions to vendors, caching successful classifications
///
/// The cache key is the lowercased description. The cache lives as long as
/// the resolver, which is one run.
pub struct VendorResolver<B: ClassifierBackend> {
    backend: B,
    cache: HashMap<String, VendorClassification>,
    max_hints: usize,
}

impl<B: ClassifierBackend> VendorResolver<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: HashMap::new(),
            max_hints: DEFAULT_MAX_HINTS,
        }
    }

    /// Start from a pre-populated cache
    pub fn with_cache(backend: B, cache: HashMap<String, VendorClassification>) -> Self {
        let mut resolver = Self::new(backend);
        for (description, classification) in cache {
            resolver.seed(&description, classification);
        }
        resolver
    }

    pub fn with_max_hints(mut self, max_hints: usize) -> Self {
        self.max_hints = max_hints;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cache(&self) -> &HashMap<String, VendorClassification> {
        &self.cache
    }

    /// Cached classification for a description, if any
    pub fn cached(&self, description: &str) -> Option<&VendorClassification> {
        self.cache.get(&cache_key(description))
    }

    /// Insert a known classification for a description
    pub fn seed(&mut self, description: &str, classification: VendorClassification) {
        self.cache.insert(cache_key(description), classification);
    }

    /// Resolve a description to a vendor classification
    ///
    /// Only the first `max_hints` known vendors are sent to the classifier.
    pub async fn resolve(&mut self, description: &str, known_vendors: &[String]) -> Resolution {
        let key = cache_key(description);
        if let Some(cached) = self.cache.get(&key) {
            debug!("Classifier cache hit for '{}'", description);
            return Resolution::Cached(cached.clone());
        }

        let hints = &known_vendors[..known_vendors.len().min(self.max_hints)];
        match self.backend.classify_vendor(description, hints).await {
            Ok(classification) => {
                debug!(
                    description,
                    vendor = %classification.vendor,
                    confidence = classification.confidence,
                    "Classified"
                );
                self.cache.insert(key, classification.clone());
                Resolution::Classified(classification)
            }
            Err(e) => {
                warn!(description, error = %e, "Vendor extraction failed, using fallback");
                Resolution::Fallback {
                    classification: VendorClassification::fallback(),
                    error: e.to_string(),
                }
            }
        }
    }
}

fn cache_key(description: &str) -> String {
    description.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockBackend, OpenAICompatibleBackend};
    use crate::models::FALLBACK_CONFIDENCE;
    use crate::prompts::PromptLibrary;
    use crate::test_utils::MockClassifierServer;

    #[tokio::test]
    async fn test_cache_hit_skips_classifier() {
        let backend = MockBackend::new();
        let mut resolver = VendorResolver::new(backend.clone());

        let first = resolver.resolve("NETFLIX.COM", &[]).await;
        assert!(matches!(first, Resolution::Classified(_)));
        assert_eq!(backend.calls(), 1);

        // Same description with different case hits the cache
        let second = resolver.resolve("netflix.com", &[]).await;
        assert!(matches!(second, Resolution::Cached(_)));
        assert!(!second.reached_classifier());
        assert_eq!(second.classification(), first.classification());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let backend = MockBackend::failing();
        let mut resolver = VendorResolver::new(backend.clone());

        for _ in 0..3 {
            let resolution = resolver.resolve("MYSTERY CHARGE", &[]).await;
            assert!(resolution.is_fallback());
            assert!(resolution.reached_classifier());
            let c = resolution.classification();
            assert_eq!(c.vendor, "Unknown");
            assert_eq!(c.category, None);
            assert_eq!(c.tx_type, "expense");
            assert_eq!(c.statement_type, "profit_loss");
            assert_eq!(c.confidence, FALLBACK_CONFIDENCE);
        }
        assert_eq!(backend.calls(), 3);
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_carries_error() {
        let mut resolver = VendorResolver::new(MockBackend::failing());
        match resolver.resolve("MYSTERY CHARGE", &[]).await {
            Resolution::Fallback { error, .. } => {
                assert!(error.contains("mock classifier failure"))
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_seeded_cache() {
        let backend = MockBackend::new();
        let mut cache = HashMap::new();
        cache.insert(
            "Corner Store 42".to_string(),
            VendorClassification {
                vendor: "Corner Store".to_string(),
                category: Some("Groceries".to_string()),
                tx_type: "expense".to_string(),
                statement_type: "profit_loss".to_string(),
                confidence: 1.0,
            },
        );
        let mut resolver = VendorResolver::with_cache(backend.clone(), cache);

        assert!(resolver.cached("CORNER STORE 42").is_some());
        let resolution = resolver.resolve("corner store 42", &[]).await;
        assert_eq!(resolution.classification().vendor, "Corner Store");
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_known_vendor_hint_reused() {
        let server = MockClassifierServer::start().await;
        let backend = OpenAICompatibleBackend::with_api_key(&server.url(), "gpt-4o-mini", "sk-test")
            .with_prompts(PromptLibrary::embedded_only());
        let mut resolver = VendorResolver::new(backend);

        let known = vec!["Amazon".to_string()];
        let resolution = resolver.resolve("AMZN MKTP US*1234 WA", &known).await;
        assert_eq!(resolution.classification().vendor, "Amazon");
    }

    #[tokio::test]
    async fn test_hints_truncated() {
        let server = MockClassifierServer::start().await;
        let backend = OpenAICompatibleBackend::with_api_key(&server.url(), "gpt-4o-mini", "sk-test")
            .with_prompts(PromptLibrary::embedded_only());
        let mut resolver = VendorResolver::new(backend);

        let known: Vec<String> = (1..=30).map(|i| format!("Vendor{:02}", i)).collect();
        resolver.resolve("COFFEE SHOP", &known).await;

        let request = &server.requests()[0];
        let system = request.body["messages"][0]["content"].as_str().unwrap();
        assert!(system.contains("Vendor20"));
        assert!(!system.contains("Vendor21"));
    }

    #[tokio::test]
    async fn test_custom_hint_limit() {
        let server = MockClassifierServer::start().await;
        let backend = OpenAICompatibleBackend::with_api_key(&server.url(), "gpt-4o-mini", "sk-test")
            .with_prompts(PromptLibrary::embedded_only());
        let mut resolver = VendorResolver::new(backend).with_max_hints(2);

        let known: Vec<String> = vec!["Alpha".into(), "Beta".into(), "Gamma".into()];
        resolver.resolve("COFFEE SHOP", &known).await;

        let system = server.requests()[0].body["messages"][0]["content"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(system.contains("Alpha, Beta"));
        assert!(!system.contains("Gamma"));
    }
}
