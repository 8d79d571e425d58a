//! OpenAI-compatible backend implementation
//!
//! Talks to the OpenAI `/v1/chat/completions` API, or any server that
//! implements it (vLLM, LocalAI, llama-server). Requests JSON-mode output.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::VendorClassification;
use crate::prompts::PromptLibrary;

use super::parsing::parse_classification;
use super::{ClassifierBackend, ExtractionPrompt};

/// OpenAI-compatible backend
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            temperature: 0.2,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()).filter(|k| !k.is_empty()),
            ..Self::new(base_url, model)
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Use a specific prompt library (tests, custom override dirs)
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    /// Make a chat completion request in JSON mode
    async fn chat_completion(&self, prompt: &ExtractionPrompt) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
            temperature: Some(self.temperature),
            response_format: Some(ResponseFormat {
                kind: "json_object".to_string(),
            }),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Classifier(format!(
                "OpenAI API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Classifier("No response from OpenAI API".into()))
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// `{"type": "json_object"}` switches the model into JSON mode
#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl ClassifierBackend for OpenAICompatibleBackend {
    async fn classify_vendor(
        &self,
        description: &str,
        known_vendors: &[String],
    ) -> Result<VendorClassification> {
        let prompt = ExtractionPrompt::render(&self.prompts, description, known_vendors)?;

        let response = self.chat_completion(&prompt).await?;
        debug!("OpenAI-compatible response: {}", response);

        parse_classification(&response)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockClassifierServer;

    fn backend(url: &str) -> OpenAICompatibleBackend {
        OpenAICompatibleBackend::with_api_key(url, "gpt-4o-mini", "sk-test")
            .with_prompts(PromptLibrary::embedded_only())
    }

    #[test]
    fn test_backend_new_trims_trailing_slash() {
        let backend = OpenAICompatibleBackend::new("http://localhost:12434/", "llama3.2");
        assert_eq!(backend.host(), "http://localhost:12434");
        assert_eq!(backend.model(), "llama3.2");
        assert!(backend.api_key.is_none());
    }

    #[test]
    fn test_empty_api_key_is_ignored() {
        let backend = OpenAICompatibleBackend::with_api_key("http://localhost", "m", "");
        assert!(backend.api_key.is_none());
    }

    #[test]
    fn test_chat_completion_request_serialization() {
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage {
                role: "system".to_string(),
                content: "Hello".to_string(),
            }],
            temperature: Some(0.2),
            response_format: Some(ResponseFormat {
                kind: "json_object".to_string(),
            }),
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "Hello");
        assert_eq!(json["response_format"]["type"], "json_object");
        let temp = json["temperature"].as_f64().unwrap();
        assert!((temp - 0.2).abs() < 0.001);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_chat_completion_response_deserialization() {
        let json = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "{\"vendor\": \"Netflix\"}"},
                "finish_reason": "stop"
            }]
        }"#;

        let response: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.choices[0].message.content.as_deref(),
            Some("{\"vendor\": \"Netflix\"}")
        );
    }

    #[tokio::test]
    async fn test_classify_sends_json_mode_request() {
        let server = MockClassifierServer::start().await;
        let backend = backend(&server.url());

        let result = backend
            .classify_vendor("NETFLIX.COM 866-579-7172", &[])
            .await
            .unwrap();
        assert_eq!(result.vendor, "Netflix");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.authorization.as_deref(), Some("Bearer sk-test"));
        assert_eq!(request.body["model"], "gpt-4o-mini");
        assert_eq!(request.body["response_format"]["type"], "json_object");
        let temp = request.body["temperature"].as_f64().unwrap();
        assert!((temp - 0.2).abs() < 0.001);
        assert_eq!(request.body["messages"][0]["role"], "system");
        assert_eq!(request.body["messages"][1]["role"], "user");
    }

    #[tokio::test]
    async fn test_known_vendor_hint_is_reused() {
        let server = MockClassifierServer::start().await;
        let backend = backend(&server.url());
        let known = vec!["Amazon".to_string()];

        let result = backend
            .classify_vendor("AMZN MKTP US*1234 WA", &known)
            .await
            .unwrap();
        assert_eq!(result.vendor, "Amazon");

        let system = server.requests()[0].body["messages"][0]["content"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(system.contains("Known vendors"));
        assert!(system.contains("Amazon"));
    }

    #[tokio::test]
    async fn test_classify_error_status() {
        let server = MockClassifierServer::start().await;
        server.fail_next(1);
        let backend = backend(&server.url());

        let err = backend.classify_vendor("COFFEE", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Classifier(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_classify_unreachable() {
        let backend = backend("http://127.0.0.1:1");
        let err = backend.classify_vendor("COFFEE", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
