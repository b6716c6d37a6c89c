//! Chat handlers
//!
//! `POST /api/chat/message` accepts either a JSON body (audio inline as
//! base64) or a multipart form (audio as a file part). Both end up as one
//! [`ChatRequest`] for the pipeline.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Query, Request, State},
    http::header,
    Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::read_json;
use crate::{member, AppError, AppState, Identity, MAX_AUDIO_BYTES, MAX_UPLOAD_SIZE};
use casa_core::chat::{AudioClip, ChatCaller, ChatRequest, ChatResponse, HistoryTurn};
use casa_core::db::MAX_HISTORY_LIMIT;

/// JSON form of a chat message
#[derive(Debug, Default, Deserialize)]
pub struct ChatMessageBody {
    pub message: Option<String>,
    /// Audio clip, base64 (a `data:` URL prefix is accepted)
    pub audio_base64: Option<String>,
    pub audio_filename: Option<String>,
    /// Prior turns: array, or the same array JSON-encoded as a string
    #[serde(default)]
    pub context: Value,
    pub pending_transaction_id: Option<i64>,
}

impl ChatMessageBody {
    fn into_request(self) -> Result<ChatRequest, AppError> {
        let audio = match self.audio_base64.as_deref().map(str::trim) {
            Some(encoded) if !encoded.is_empty() => {
                let encoded = encoded
                    .split_once(";base64,")
                    .map_or(encoded, |(_, data)| data);
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| AppError::bad_request(&format!("Invalid base64 audio: {}", e)))?;
                Some(audio_clip(bytes, self.audio_filename)?)
            }
            _ => None,
        };
        Ok(ChatRequest {
            message: self.message,
            audio,
            context: self.context,
            pending_transaction_id: self.pending_transaction_id,
        })
    }
}

fn audio_clip(bytes: Vec<u8>, filename: Option<String>) -> Result<AudioClip, AppError> {
    if bytes.len() > MAX_AUDIO_BYTES {
        return Err(AppError::bad_request(&format!(
            "Audio too large. Maximum size is {} MB",
            MAX_AUDIO_BYTES / 1024 / 1024
        )));
    }
    Ok(AudioClip { bytes, filename })
}

/// Read the multipart form of a chat message
///
/// Fields: `message`, `audio` (file), `context` (JSON string),
/// `pending_transaction_id`.
async fn read_multipart(mut multipart: Multipart) -> Result<ChatRequest, AppError> {
    let mut request = ChatRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "audio" => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read audio data"))?;
                if !bytes.is_empty() {
                    request.audio = Some(audio_clip(bytes.to_vec(), filename)?);
                }
            }
            "message" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read message"))?;
                request.message = Some(value);
            }
            "context" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read context"))?;
                request.context = Value::String(value);
            }
            "pending_transaction_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read pending_transaction_id"))?;
                let value = value.trim();
                if !value.is_empty() {
                    request.pending_transaction_id = Some(value.parse().map_err(|_| {
                        AppError::bad_request(&format!("Invalid pending_transaction_id: {}", value))
                    })?);
                }
            }
            _ => {}
        }
    }

    Ok(request)
}

/// POST /api/chat/message - Run one message through the chat pipeline
///
/// Anonymous callers (no identity header, or no household yet) get the
/// classification only; nothing is stored for them.
pub async fn chat_message(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ChatResponse>, AppError> {
    let caller = request
        .extensions()
        .get::<Identity>()
        .and_then(|identity| identity.member.as_ref())
        .and_then(|member| {
            member.household_id.map(|household_id| ChatCaller {
                member_id: member.id,
                household_id,
            })
        });

    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let chat_request = if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| AppError::bad_request(&format!("Invalid multipart body: {}", e)))?;
        read_multipart(multipart).await?
    } else {
        read_json::<ChatMessageBody>(request, MAX_UPLOAD_SIZE)
            .await?
            .into_request()?
    };

    let response = state.chat.handle(caller, chat_request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<HistoryTurn>,
    /// Number of turns (two per logged exchange)
    pub count: usize,
}

/// GET /api/chat/history - The caller's recent exchanges, oldest first
pub async fn chat_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQuery>,
    request: Request,
) -> Result<Json<HistoryResponse>, AppError> {
    let member = member(&request)?;
    let limit = params.limit.map(|l| l.clamp(1, MAX_HISTORY_LIMIT));

    let messages = state.chat.history(member.id, limit)?;
    Ok(Json(HistoryResponse {
        count: messages.len(),
        messages,
    }))
}
