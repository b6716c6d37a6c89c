//! Ollama backend implementation
//!
//! HTTP client for the Ollama chat API. Ollama cannot enforce a JSON schema,
//! so requests only ask for JSON output and the classifier repairs the rest.
//! Ollama has no speech-to-text endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

use super::types::{ChatTurn, CLASSIFIER_MAX_TOKENS, CLASSIFIER_TEMPERATURE};
use super::AIBackend;

pub const DEFAULT_MODEL: &str = "llama3.2";

/// Ollama backend
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Create from environment variables
    ///
    /// Required: `OLLAMA_HOST`
    /// Optional: `OLLAMA_MODEL` (default: llama3.2)
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Some(Self::new(&host, &model))
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn complete_json(&self, messages: &[ChatTurn], _schema: &Value) -> Result<String> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: CLASSIFIER_TEMPERATURE,
                num_predict: CLASSIFIER_MAX_TOKENS,
            },
        };

        let response = self
            .http_client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Gateway(format!("Ollama error {}: {}", status, body)));
        }

        let chat: OllamaChatResponse = response.json().await?;
        if chat.message.content.trim().is_empty() {
            return Err(Error::Gateway("Empty response from Ollama".into()));
        }
        debug!(model = %self.model, "Ollama completion received");
        Ok(chat.message.content)
    }

    async fn transcribe(&self, _audio: &[u8], _filename: &str) -> Result<String> {
        Err(Error::Transcription(
            "The Ollama backend does not support transcription".into(),
        ))
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
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
    fn test_backend_new_trims_trailing_slash() {
        let backend = OllamaBackend::new("http://localhost:11434/", "llama3.2");
        assert_eq!(backend.host(), "http://localhost:11434");
        assert_eq!(backend.model(), "llama3.2");
    }

    #[test]
    fn test_request_asks_for_json() {
        let messages = vec![ChatTurn::user("oi")];
        let request = OllamaChatRequest {
            model: "llama3.2",
            messages: &messages,
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: CLASSIFIER_TEMPERATURE,
                num_predict: CLASSIFIER_MAX_TOKENS,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["format"], "json");
        assert_eq!(json["options"]["num_predict"], 800);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_transcription_unsupported() {
        let backend = OllamaBackend::new("http://localhost:11434", "llama3.2");
        let err = backend.transcribe(b"RIFF", "audio.wav").await.unwrap_err();
        assert!(matches!(err, Error::Transcription(_)));
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = OllamaBackend::new("http://localhost:99999", "llama3.2");
        assert!(!backend.health_check().await);
    }
}
