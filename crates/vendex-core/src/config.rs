//! Layered configuration
//!
//! Resolution order, lowest to highest priority:
//! 1. Compiled-in defaults (mirrored by `config/vendex.toml`)
//! 2. TOML config file (`--config` path, or ~/.local/share/vendex/config.toml)
//! 3. Environment variables
//! 4. Explicit overrides (CLI flags)
//!
//! Environment variables:
//! - `AI_BACKEND`: openai, ollama or mock
//! - `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL`
//! - `OLLAMA_HOST`, `OLLAMA_MODEL`
//! - `SUPABASE_URL`, `SUPABASE_KEY`

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Template config file (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/vendex.toml");

/// Which classifier backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    OpenAI,
    Ollama,
    Mock,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" | "openai_compatible" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "mock" => Ok(Self::Mock),
            other => Err(Error::Config(format!("Unknown classifier backend: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    pub backend: BackendKind,
    /// Sampling temperature; kept low so labels repeat across runs
    pub temperature: f32,
    pub openai: OpenAIConfig,
    pub ollama: OllamaConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub url: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Records per upload request
    pub batch_size: usize,
    /// Delay between classifier calls, in milliseconds (0 disables)
    pub throttle_ms: u64,
    /// Records the embedding function should process per trigger
    pub embeddings_limit: usize,
    /// Known vendor names passed to the classifier as hints
    pub max_vendor_hints: usize,
    /// Attach an import_hash and ask the store to ignore duplicates
    pub dedupe: bool,
}

impl PipelineConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub classifier: ClassifierConfig,
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig {
                backend: BackendKind::OpenAI,
                temperature: 0.2,
                openai: OpenAIConfig {
                    api_key: "your-openai-api-key".to_string(),
                    base_url: "https://api.openai.com".to_string(),
                    model: "gpt-4o-mini".to_string(),
                },
                ollama: OllamaConfig {
                    host: "http://localhost:11434".to_string(),
                    model: "llama3.2".to_string(),
                },
            },
            store: StoreConfig {
                url: "http://localhost:54321".to_string(),
                key: "your-supabase-key".to_string(),
            },
            pipeline: PipelineConfig {
                batch_size: 20,
                throttle_ms: 100,
                embeddings_limit: 50,
                max_vendor_hints: 20,
                dedupe: false,
            },
        }
    }
}

/// Values supplied explicitly on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend: Option<BackendKind>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub store_url: Option<String>,
    pub store_key: Option<String>,
    pub batch_size: Option<usize>,
    pub throttle_ms: Option<u64>,
    pub embeddings_limit: Option<usize>,
    pub dedupe: bool,
}

impl Config {
    /// Load config from defaults, config file and the process environment
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                config.apply_toml(&content)?;
            }
            None => {
                if let Some(default_path) = default_config_path().filter(|p| p.exists()) {
                    let content = fs::read_to_string(&default_path).map_err(|e| {
                        Error::Config(format!("Failed to read {}: {}", default_path.display(), e))
                    })?;
                    config.apply_toml(&content)?;
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Merge values from a TOML document
    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        if let Some(classifier) = raw.classifier {
            if let Some(backend) = classifier.backend {
                self.classifier.backend = backend.parse()?;
            }
            if let Some(temperature) = classifier.temperature {
                self.classifier.temperature = temperature;
            }
            if let Some(openai) = classifier.openai {
                set(&mut self.classifier.openai.api_key, openai.api_key);
                set(&mut self.classifier.openai.base_url, openai.base_url);
                set(&mut self.classifier.openai.model, openai.model);
            }
            if let Some(ollama) = classifier.ollama {
                set(&mut self.classifier.ollama.host, ollama.host);
                set(&mut self.classifier.ollama.model, ollama.model);
            }
        }

        if let Some(store) = raw.store {
            set(&mut self.store.url, store.url);
            set(&mut self.store.key, store.key);
        }

        if let Some(pipeline) = raw.pipeline {
            set(&mut self.pipeline.batch_size, pipeline.batch_size);
            set(&mut self.pipeline.throttle_ms, pipeline.throttle_ms);
            set(&mut self.pipeline.embeddings_limit, pipeline.embeddings_limit);
            set(&mut self.pipeline.max_vendor_hints, pipeline.max_vendor_hints);
            set(&mut self.pipeline.dedupe, pipeline.dedupe);
        }

        Ok(())
    }

    /// Merge values from environment variables
    ///
    /// Takes a lookup function so tests don't have to mutate the process env.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(backend) = var("AI_BACKEND") {
            self.classifier.backend = backend.parse()?;
        }
        set(&mut self.classifier.openai.api_key, var("OPENAI_API_KEY"));
        set(&mut self.classifier.openai.base_url, var("OPENAI_BASE_URL"));
        set(&mut self.classifier.openai.model, var("OPENAI_MODEL"));
        set(&mut self.classifier.ollama.host, var("OLLAMA_HOST"));
        set(&mut self.classifier.ollama.model, var("OLLAMA_MODEL"));
        set(&mut self.store.url, var("SUPABASE_URL"));
        set(&mut self.store.key, var("SUPABASE_KEY"));
        Ok(())
    }

    /// Apply explicit overrides, then validate
    pub fn apply_overrides(&mut self, overrides: Overrides) -> Result<()> {
        if let Some(backend) = overrides.backend {
            self.classifier.backend = backend;
        }
        set(&mut self.classifier.openai.api_key, overrides.api_key);
        if let Some(model) = overrides.model {
            match self.classifier.backend {
                BackendKind::Ollama => self.classifier.ollama.model = model,
                _ => self.classifier.openai.model = model,
            }
        }
        set(&mut self.store.url, overrides.store_url);
        set(&mut self.store.key, overrides.store_key);
        set(&mut self.pipeline.batch_size, overrides.batch_size);
        set(&mut self.pipeline.throttle_ms, overrides.throttle_ms);
        set(&mut self.pipeline.embeddings_limit, overrides.embeddings_limit);
        if overrides.dedupe {
            self.pipeline.dedupe = true;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.classifier.temperature) {
            return Err(Error::Config(format!(
                "temperature must be between 0 and 2, got {}",
                self.classifier.temperature
            )));
        }
        Ok(())
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("vendex").join("config.toml"))
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    classifier: Option<RawClassifier>,
    store: Option<RawStore>,
    pipeline: Option<RawPipeline>,
}

#[derive(Debug, Deserialize)]
struct RawClassifier {
    backend: Option<String>,
    temperature: Option<f32>,
    openai: Option<RawOpenAI>,
    ollama: Option<RawOllama>,
}

#[derive(Debug, Deserialize)]
struct RawOpenAI {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOllama {
    host: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStore {
    url: Option<String>,
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPipeline {
    batch_size: Option<usize>,
    throttle_ms: Option<u64>,
    embeddings_limit: Option<usize>,
    max_vendor_hints: Option<usize>,
    dedupe: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_embedded_template_matches_defaults() {
        let mut config = Config::default();
        config.apply_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.classifier.backend, BackendKind::OpenAI);
        assert_eq!(config.pipeline.batch_size, 20);
        assert_eq!(config.pipeline.throttle(), Duration::from_millis(100));
        assert_eq!(config.pipeline.embeddings_limit, 50);
        assert_eq!(config.pipeline.max_vendor_hints, 20);
        assert!(!config.pipeline.dedupe);
    }

    #[test]
    fn test_partial_toml() {
        let mut config = Config::default();
        config
            .apply_toml(
                r#"
[classifier]
backend = "ollama"

[classifier.ollama]
model = "qwen2.5"

[pipeline]
throttle_ms = 0
"#,
            )
            .unwrap();

        assert_eq!(config.classifier.backend, BackendKind::Ollama);
        assert_eq!(config.classifier.ollama.model, "qwen2.5");
        assert_eq!(config.classifier.ollama.host, "http://localhost:11434");
        assert_eq!(config.pipeline.throttle_ms, 0);
        assert_eq!(config.pipeline.batch_size, 20);
    }

    #[test]
    fn test_invalid_toml() {
        let mut config = Config::default();
        let err = config.apply_toml("[pipeline]\nbatch_size = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unknown_backend() {
        let mut config = Config::default();
        let result = config.apply_env(env(&[("AI_BACKEND", "gpt-cloud")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::default();
        config
            .apply_toml("[store]\nurl = \"https://from-file.example\"\nkey = \"file-key\"")
            .unwrap();
        config
            .apply_env(env(&[
                ("SUPABASE_URL", "https://from-env.example"),
                ("OPENAI_API_KEY", "sk-env"),
                ("SUPABASE_KEY", ""),
            ]))
            .unwrap();

        assert_eq!(config.store.url, "https://from-env.example");
        // Empty variables are ignored
        assert_eq!(config.store.key, "file-key");
        assert_eq!(config.classifier.openai.api_key, "sk-env");
    }

    #[test]
    fn test_flags_override_env() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("OPENAI_API_KEY", "sk-env"), ("SUPABASE_KEY", "env-key")]))
            .unwrap();
        config
            .apply_overrides(Overrides {
                api_key: Some("sk-flag".to_string()),
                batch_size: Some(5),
                dedupe: true,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(config.classifier.openai.api_key, "sk-flag");
        assert_eq!(config.store.key, "env-key");
        assert_eq!(config.pipeline.batch_size, 5);
        assert!(config.pipeline.dedupe);
    }

    #[test]
    fn test_model_override_follows_backend() {
        let mut config = Config::default();
        config
            .apply_overrides(Overrides {
                backend: Some(BackendKind::Ollama),
                model: Some("mistral".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.classifier.ollama.model, "mistral");
        assert_eq!(config.classifier.openai.model, "gpt-4o-mini");
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = Config::default();
        let result = config.apply_overrides(Overrides {
            batch_size: Some(0),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vendex.toml");
        fs::write(&path, "[pipeline]\nbatch_size = 7\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.pipeline.batch_size, 7);

        let missing = Config::load(Some(&dir.path().join("missing.toml")));
        assert!(missing.is_err());
    }
}
