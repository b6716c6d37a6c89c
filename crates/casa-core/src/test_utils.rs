//! Test utilities for casa-core
//!
//! This module provides a mock OpenAI-compatible server that answers chat
//! completions and transcriptions, for development and integration tests.
//!
//! Completions are scripted with [`MockAiServer::push_reply`]; when the
//! script is empty the server guesses an intent from keywords in the last
//! user message, the way a small model would.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::Local;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::ai::{AIClient, OpenAICompatibleBackend};

/// Text returned by the transcription endpoint unless scripted otherwise
pub const MOCK_TRANSCRIPTION: &str = "gastei 30 reais no mercado";

#[derive(Default)]
struct MockState {
    replies: Mutex<VecDeque<Value>>,
    transcriptions: Mutex<VecDeque<String>>,
    completions: Mutex<usize>,
}

/// Mock OpenAI-compatible server for testing and development
pub struct MockAiServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockAiServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_completion))
            .route("/v1/audio/transcriptions", post(handle_transcription))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A client talking to this server
    pub fn client(&self) -> AIClient {
        AIClient::OpenAICompatible(OpenAICompatibleBackend::with_api_key(
            &self.url(),
            "mock-model",
            "test-key",
        ))
    }

    /// Queue the classifier object returned by the next completion
    pub fn push_reply(&self, reply: Value) {
        self.state.replies.lock().unwrap().push_back(reply);
    }

    /// Queue the text returned by the next transcription
    pub fn push_transcription(&self, text: impl Into<String>) {
        self.state.transcriptions.lock().unwrap().push_back(text.into());
    }

    /// Number of completions served so far
    pub fn completions(&self) -> usize {
        *self.state.completions.lock().unwrap()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockAiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Model listing (health check)
async fn handle_models() -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{"id": "mock-model", "object": "model", "owned_by": "casa"}]
    }))
}

#[derive(Deserialize)]
struct CompletionRequest {
    messages: Vec<CompletionMessage>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    role: String,
    content: String,
}

async fn handle_completion(
    State(state): State<Arc<MockState>>,
    Json(request): Json<CompletionRequest>,
) -> Json<Value> {
    *state.completions.lock().unwrap() += 1;

    let scripted = state.replies.lock().unwrap().pop_front();
    let reply = scripted.unwrap_or_else(|| {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        guess_reply(last_user)
    });

    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": reply.to_string()},
            "finish_reason": "stop"
        }]
    }))
}

/// Transcriptions answer in `response_format=text`
async fn handle_transcription(
    State(state): State<Arc<MockState>>,
    mut multipart: Multipart,
) -> Result<String, StatusCode> {
    let mut has_file = false;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        if field.name() == Some("file") {
            let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            has_file = !bytes.is_empty();
        }
    }
    if !has_file {
        return Err(StatusCode::BAD_REQUEST);
    }

    let scripted = state.transcriptions.lock().unwrap().pop_front();
    Ok(scripted.unwrap_or_else(|| MOCK_TRANSCRIPTION.to_string()))
}

/// Keyword classifier standing in for the model
fn guess_reply(message: &str) -> Value {
    let lower = message.to_lowercase();
    let amount = Regex::new(r"(\d+(?:[.,]\d{1,2})?)")
        .ok()
        .and_then(|re| re.captures(&lower))
        .and_then(|c| c[1].replace(',', ".").parse::<f64>().ok());
    let today = Local::now().date_naive().to_string();

    if ["oi", "olá", "ola", "bom dia", "boa tarde"]
        .iter()
        .any(|g| lower.starts_with(g))
    {
        return json!({
            "intent": "greeting",
            "clarification_needed": false,
            "assistant_message": "Olá! Como posso ajudar com as finanças da casa?",
            "confidence": 0.9
        });
    }

    if lower.contains("quanto") || lower.contains("resumo") || lower.contains("saldo") {
        return json!({
            "intent": "query_summary",
            "clarification_needed": false,
            "assistant_message": "Aqui está o resumo:",
            "query": {"summary_type": "month_total", "type": "todas"},
            "confidence": 0.85
        });
    }

    match amount {
        Some(amount) if lower.contains("gastei") || lower.contains("paguei") => json!({
            "intent": "create_transaction",
            "clarification_needed": false,
            "assistant_message": "Anotado!",
            "transaction": {
                "type": "despesa",
                "amount": amount,
                "title": message,
                "category": if lower.contains("mercado") { "Mercado" } else { "Outros" },
                "date": today
            },
            "confidence": 0.9
        }),
        Some(amount) if lower.contains("recebi") => json!({
            "intent": "create_transaction",
            "clarification_needed": false,
            "assistant_message": "Que bom!",
            "transaction": {"type": "receita", "amount": amount, "title": message, "date": today},
            "confidence": 0.9
        }),
        _ => json!({
            "intent": "unknown",
            "clarification_needed": false,
            "assistant_message": "Não entendi. Pode reformular?",
            "confidence": 0.2
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIBackend, ChatTurn};

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockAiServer::start().await;
        assert!(server.url().starts_with("http://127.0.0.1:"));
        assert!(server.client().health_check().await);
    }

    #[tokio::test]
    async fn test_guessed_create() {
        let server = MockAiServer::start().await;
        let raw = server
            .client()
            .complete_json(&[ChatTurn::user("gastei 30 no mercado")], &json!({}))
            .await
            .unwrap();

        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["intent"], "create_transaction");
        assert_eq!(value["transaction"]["amount"], 30.0);
        assert_eq!(value["transaction"]["category"], "Mercado");
        assert_eq!(server.completions(), 1);
    }

    #[tokio::test]
    async fn test_scripted_reply_wins() {
        let server = MockAiServer::start().await;
        server.push_reply(json!({"intent": "small_talk"}));

        let raw = server
            .client()
            .complete_json(&[ChatTurn::user("gastei 30")], &json!({}))
            .await
            .unwrap();
        assert!(raw.contains("small_talk"));
    }

    #[tokio::test]
    async fn test_transcription() {
        let server = MockAiServer::start().await;
        let text = server
            .client()
            .transcribe(b"OggS....", "voz.ogg")
            .await
            .unwrap();
        assert_eq!(text, MOCK_TRANSCRIPTION);
    }
}
