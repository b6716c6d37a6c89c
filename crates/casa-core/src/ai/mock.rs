//! Mock backend for testing
//!
//! Replies are scripted per test: each call pops the next queued completion
//! or transcription, falling back to a fixed default. Every completion
//! request is recorded so tests can inspect what the classifier sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};

use super::types::ChatTurn;
use super::AIBackend;

/// Reply used when no completion is queued
pub const DEFAULT_MOCK_REPLY: &str = r#"{"intent": "unknown", "clarification_needed": false, "assistant_message": "Desculpe, não entendi. Pode reformular?"}"#;

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail(String),
}

#[derive(Default)]
struct Script {
    completions: VecDeque<Scripted>,
    transcriptions: VecDeque<Scripted>,
    calls: Vec<Vec<ChatTurn>>,
    transcription_calls: usize,
}

fn lock(script: &Mutex<Script>) -> MutexGuard<'_, Script> {
    script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock AI backend for testing
///
/// Clones share the same script, so a test can keep one handle and give
/// another to the code under test.
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    /// Delay before every reply, for timeout tests
    pub delay: Option<Duration>,
    script: Arc<Mutex<Script>>,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Self::default()
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self::default()
    }

    /// Delay every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a raw completion
    pub fn push_completion(&self, raw: impl Into<String>) {
        lock(&self.script)
            .completions
            .push_back(Scripted::Reply(raw.into()));
    }

    /// Queue a completion from a JSON value
    pub fn push_json(&self, value: Value) {
        self.push_completion(value.to_string());
    }

    /// Queue a failing completion
    pub fn push_failure(&self, message: impl Into<String>) {
        lock(&self.script)
            .completions
            .push_back(Scripted::Fail(message.into()));
    }

    /// Queue a transcription
    pub fn push_transcription(&self, text: impl Into<String>) {
        lock(&self.script)
            .transcriptions
            .push_back(Scripted::Reply(text.into()));
    }

    /// Queue a failing transcription
    pub fn push_transcription_failure(&self, message: impl Into<String>) {
        lock(&self.script)
            .transcriptions
            .push_back(Scripted::Fail(message.into()));
    }

    /// Messages of every completion request so far
    pub fn calls(&self) -> Vec<Vec<ChatTurn>> {
        lock(&self.script).calls.clone()
    }

    /// Number of transcription requests so far
    pub fn transcription_calls(&self) -> usize {
        lock(&self.script).transcription_calls
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn complete_json(&self, messages: &[ChatTurn], _schema: &Value) -> Result<String> {
        let next = {
            let mut script = lock(&self.script);
            script.calls.push(messages.to_vec());
            script.completions.pop_front()
        };
        self.pause().await;

        match next {
            Some(Scripted::Reply(raw)) => Ok(raw),
            Some(Scripted::Fail(message)) => Err(Error::Gateway(message)),
            None => Ok(DEFAULT_MOCK_REPLY.to_string()),
        }
    }

    async fn transcribe(&self, _audio: &[u8], _filename: &str) -> Result<String> {
        let next = {
            let mut script = lock(&self.script);
            script.transcription_calls += 1;
            script.transcriptions.pop_front()
        };
        self.pause().await;

        match next {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail(message)) => Err(Error::Transcription(message)),
            None => Ok("mensagem de áudio".to_string()),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_is_consumed_in_order() {
        let mock = MockBackend::new();
        mock.push_completion("first");
        mock.push_failure("boom");

        let turns = [ChatTurn::user("oi")];
        assert_eq!(mock.complete_json(&turns, &Value::Null).await.unwrap(), "first");
        let err = mock.complete_json(&turns, &Value::Null).await.unwrap_err();
        assert!(err.is_gateway());
        let fallback = mock.complete_json(&turns, &Value::Null).await.unwrap();
        assert_eq!(fallback, DEFAULT_MOCK_REPLY);
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_clones_share_script() {
        let mock = MockBackend::new();
        let handle = mock.clone();
        handle.push_transcription("gastei vinte reais");

        assert_eq!(mock.transcribe(b"..", "a.webm").await.unwrap(), "gastei vinte reais");
        assert_eq!(handle.transcription_calls(), 1);
    }

    #[tokio::test]
    async fn test_unhealthy() {
        assert!(!MockBackend::unhealthy().health_check().await);
    }
}
