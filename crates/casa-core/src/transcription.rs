//! Transcription gateway
//!
//! Speech-to-text for voice messages. No retry: a failure is reported to the
//! chat pipeline, which apologizes to the user.

use std::time::Duration;

use tracing::{debug, warn};

use crate::ai::{AIBackend, AIClient};
use crate::error::{Error, Result};

/// File name sent when the client gives none
pub const DEFAULT_AUDIO_FILENAME: &str = "audio.webm";

pub struct Transcriber {
    client: Option<AIClient>,
    timeout: Duration,
}

impl Transcriber {
    pub fn new(client: Option<AIClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Transcribe an audio clip into trimmed, non-empty text
    pub async fn transcribe(&self, audio: &[u8], filename: Option<&str>) -> Result<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| Error::Transcription("No AI backend configured".into()))?;
        if audio.is_empty() {
            return Err(Error::Transcription("Empty audio".into()));
        }

        let filename = filename
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_AUDIO_FILENAME);
        debug!(bytes = audio.len(), filename, "Transcribing audio");

        let text = tokio::time::timeout(self.timeout, client.transcribe(audio, filename))
            .await
            .map_err(|_| Error::Timeout(self.timeout.as_secs()))?
            .map_err(|e| {
                warn!(error = %e, "Transcription failed");
                e
            })?;

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Transcription("Transcription came back empty".into()));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockBackend, OllamaBackend};

    fn transcriber(mock: &MockBackend) -> Transcriber {
        Transcriber::new(Some(AIClient::Mock(mock.clone())), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_trims_text() {
        let mock = MockBackend::new();
        mock.push_transcription("  gastei vinte reais no café \n");
        let text = transcriber(&mock).transcribe(b"OggS", None).await.unwrap();
        assert_eq!(text, "gastei vinte reais no café");
    }

    #[tokio::test]
    async fn test_empty_result_is_error() {
        let mock = MockBackend::new();
        mock.push_transcription("   ");
        let err = transcriber(&mock)
            .transcribe(b"OggS", Some("voz.ogg"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transcription(_)));
    }

    #[tokio::test]
    async fn test_empty_audio_never_calls_backend() {
        let mock = MockBackend::new();
        assert!(transcriber(&mock).transcribe(b"", None).await.is_err());
        assert_eq!(mock.transcription_calls(), 0);
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock = MockBackend::new().with_delay(Duration::from_millis(200));
        let t = Transcriber::new(Some(AIClient::Mock(mock)), Duration::from_millis(10));
        let err = t.transcribe(b"OggS", None).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_ollama_cannot_transcribe() {
        let t = Transcriber::new(
            Some(AIClient::Ollama(OllamaBackend::new(
                "http://localhost:11434",
                "llama3.2",
            ))),
            Duration::from_secs(1),
        );
        let err = t.transcribe(b"OggS", None).await.unwrap_err();
        assert!(err.is_gateway());
    }
}
