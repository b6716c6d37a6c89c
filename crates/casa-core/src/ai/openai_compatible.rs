//! OpenAI-compatible backend implementation
//!
//! Works with OpenAI itself and any server that implements the chat
//! completions API (vLLM, LocalAI, llama-server). Transcription uses
//! `/v1/audio/transcriptions`, which not every compatible server offers.
//!
//! # Configuration
//!
//! Environment variables:
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (default: https://api.openai.com)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key
//! - `OPENAI_TRANSCRIPTION_MODEL`: Speech-to-text model (default: whisper-1)

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result};

use super::types::{ChatTurn, CLASSIFIER_MAX_TOKENS, CLASSIFIER_TEMPERATURE};
use super::AIBackend;

pub const DEFAULT_HOST: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// OpenAI-compatible backend
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    transcription_model: String,
    api_key: Option<String>,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            api_key: None,
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(base_url, model)
        }
    }

    /// Create a new instance with a different speech-to-text model
    pub fn with_transcription_model(&self, model: &str) -> Self {
        Self {
            transcription_model: model.to_string(),
            ..self.clone()
        }
    }

    /// Create from environment variables
    ///
    /// Returns None when neither `OPENAI_COMPATIBLE_API_KEY` nor
    /// `OPENAI_COMPATIBLE_HOST` is set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_COMPATIBLE_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let host = std::env::var("OPENAI_COMPATIBLE_HOST").ok();
        if api_key.is_none() && host.is_none() {
            return None;
        }

        let host = host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        let model =
            std::env::var("OPENAI_COMPATIBLE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let transcription_model = std::env::var("OPENAI_TRANSCRIPTION_MODEL")
            .unwrap_or_else(|_| DEFAULT_TRANSCRIPTION_MODEL.to_string());

        let mut backend = Self::new(&host, &model).with_transcription_model(&transcription_model);
        backend.api_key = api_key;
        Some(backend)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(api_key) => builder.header("Authorization", format!("Bearer {}", api_key)),
            None => builder,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    temperature: f32,
    max_tokens: u32,
    response_format: Value,
    stream: bool,
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
    content: Option<ChatContent>,
}

/// Message content is either plain text or a list of typed parts
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

impl ChatContent {
    fn into_text(self) -> String {
        match self {
            ChatContent::Text(text) => text,
            ChatContent::Parts(parts) => parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn complete_json(&self, messages: &[ChatTurn], schema: &Value) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: CLASSIFIER_TEMPERATURE,
            max_tokens: CLASSIFIER_MAX_TOKENS,
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "chat_classification",
                    "schema": schema,
                }
            }),
            stream: false,
        };

        let response = self
            .authorized(
                self.http_client
                    .post(format!("{}/v1/chat/completions", self.base_url)),
            )
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Gateway(format!(
                "OpenAI API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(ChatContent::into_text)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(Error::Gateway("Empty response from OpenAI API".into()));
        }
        debug!(model = %self.model, "OpenAI-compatible completion received");
        Ok(content)
    }

    async fn transcribe(&self, audio: &[u8], filename: &str) -> Result<String> {
        let file = Part::bytes(audio.to_vec()).file_name(filename.to_string());
        let form = Form::new()
            .part("file", file)
            .text("model", self.transcription_model.clone())
            .text("response_format", "text");

        let response = self
            .authorized(
                self.http_client
                    .post(format!("{}/v1/audio/transcriptions", self.base_url)),
            )
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Transcription(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transcription(format!(
                "Transcription API error {}: {}",
                status, body
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Transcription(e.to_string()))?;
        Ok(text.trim().to_string())
    }

    async fn health_check(&self) -> bool {
        // /v1/models is the standard OpenAI endpoint
        if let Ok(resp) = self
            .authorized(self.http_client.get(format!("{}/v1/models", self.base_url)))
            .send()
            .await
        {
            if resp.status().is_success() {
                return true;
            }
        }

        // Try /health (common for LocalAI and llama-server)
        if let Ok(resp) = self
            .http_client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            return resp.status().is_success();
        }

        false
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

    #[test]
    fn test_backend_new() {
        let backend = OpenAICompatibleBackend::new("http://localhost:8000", "gpt-4o-mini");
        assert_eq!(backend.model(), "gpt-4o-mini");
        assert_eq!(backend.host(), "http://localhost:8000");
        assert_eq!(backend.transcription_model, "whisper-1");
    }

    #[test]
    fn test_backend_new_trims_trailing_slash() {
        let backend = OpenAICompatibleBackend::new("http://localhost:8000/", "gpt-4o-mini");
        assert_eq!(backend.host(), "http://localhost:8000");
    }

    #[test]
    fn test_backend_with_api_key() {
        let backend =
            OpenAICompatibleBackend::with_api_key(DEFAULT_HOST, "gpt-4o", "sk-test123");
        assert_eq!(backend.model(), "gpt-4o");
        assert_eq!(backend.api_key, Some("sk-test123".to_string()));
    }

    #[test]
    fn test_backend_from_env_missing() {
        std::env::remove_var("OPENAI_COMPATIBLE_HOST");
        std::env::remove_var("OPENAI_COMPATIBLE_API_KEY");

        let result = OpenAICompatibleBackend::from_env();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = OpenAICompatibleBackend::new("http://localhost:99999", "gpt-4o-mini");
        assert!(!backend.health_check().await);
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatTurn::system("sys"), ChatTurn::user("Gastei 45")];
        let schema = json!({"type": "object"});
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: CLASSIFIER_TEMPERATURE,
            max_tokens: CLASSIFIER_MAX_TOKENS,
            response_format: json!({"type": "json_schema", "json_schema": {"name": "x", "schema": schema}}),
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Gastei 45");
        assert_eq!(json["max_tokens"], 800);
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 0.001);
        assert_eq!(json["response_format"]["type"], "json_schema");
    }

    #[test]
    fn test_response_content_variants() {
        let text: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"{\"intent\":\"greeting\"}"}}]}"#,
        )
        .unwrap();
        let content = text.choices.into_iter().next().unwrap().message.content.unwrap();
        assert_eq!(content.into_text(), r#"{"intent":"greeting"}"#);

        let parts: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":[{"type":"text","text":"{\"a\":"},{"type":"text","text":"1}"}]}}]}"#,
        )
        .unwrap();
        let content = parts.choices.into_iter().next().unwrap().message.content.unwrap();
        assert_eq!(content.into_text(), r#"{"a":1}"#);
    }
}
