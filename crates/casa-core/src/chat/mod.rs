//! Chat pipeline
//!
//! One inbound message goes through these stages:
//!
//! received → transcribed? → classified → dispatched → persisted? → logged → replied
//!
//! Every path ends in a reply: gateway failures become an apology with intent
//! `unknown`, missing data becomes a clarification question, and storage
//! failures during dispatch become a generic apology. Only invalid input
//! (no message and no audio, both, or an oversized message) is returned as
//! an error.
//!
//! Writes for one household are serialized by an async mutex held across the
//! whole dispatch, so two messages resolving the same draft cannot both
//! promote it.

mod reconciler;
pub mod replies;
pub mod reports;


use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::ai::{AIClient, ChatRole};
use crate::classifier::{history_from_context, IntentClassifier};
use crate::config::ChatConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::intent::{Classification, Intent};
use crate::transcription::Transcriber;

pub use reconciler::{DEFAULT_ACCOUNT_NAME, DEFAULT_CATEGORY_NAME, MAX_TITLE_CHARS};

use reconciler::Reconciler;

/// Longest accepted text message, in characters
pub const MAX_MESSAGE_CHARS: usize = 5000;

/// History entries returned when the client does not ask for a number
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// Voice message attached to a chat request
#[derive(Debug, Clone, Default)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
}

/// Inbound chat message
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub audio: Option<AudioClip>,
    /// Prior turns as sent by the client (array or JSON-encoded array)
    pub context: Value,
    /// Draft the client says this message resolves
    pub pending_transaction_id: Option<i64>,
}

/// The member behind a request, once resolved to a household
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatCaller {
    pub member_id: i64,
    pub household_id: i64,
}

/// Reply to a chat message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    pub intent: String,
    pub clarification_needed: bool,
    pub assistant_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcribed_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_saved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_pending: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_generated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_set: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_checked: Option<bool>,
}

impl ChatResponse {
    fn from_classification(c: &Classification) -> Self {
        let payload = |key: &str| c.raw.get(key).filter(|v| !v.is_null()).cloned();
        let assistant_message = match (c.message_repaired, c.intent.is_conversational()) {
            (true, true) => replies::canned_reply(&c.intent).to_string(),
            (true, false) => replies::ACKNOWLEDGED.to_string(),
            (false, _) => c.assistant_message.clone(),
        };
        Self {
            intent: c.intent.name().to_string(),
            clarification_needed: c.clarification_needed,
            assistant_message,
            transaction: payload("transaction"),
            query: payload("query"),
            confidence: c.confidence,
            ..Self::default()
        }
    }
}

/// One side of a logged exchange, for the history view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The chat pipeline
pub struct ChatService {
    db: Database,
    classifier: IntentClassifier,
    transcriber: Transcriber,
    config: ChatConfig,
    household_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChatService {
    /// Build the pipeline around one AI client (or none)
    pub fn new(db: Database, client: Option<AIClient>, config: ChatConfig) -> Result<Self> {
        let classifier = IntentClassifier::new(client.clone(), config.clone())?;
        let transcriber = Transcriber::new(client, config.ai_timeout);
        Ok(Self::with_gateways(db, classifier, transcriber, config))
    }

    pub fn with_gateways(
        db: Database,
        classifier: IntentClassifier,
        transcriber: Transcriber,
        config: ChatConfig,
    ) -> Self {
        Self {
            db,
            classifier,
            transcriber,
            config,
            household_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    /// Serialization lock for one household's writes
    ///
    /// Entries nobody else holds a handle to are dropped on the way in, so
    /// the map only keeps households with a write in flight.
    fn household_lock(&self, household_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .household_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|id, lock| *id == household_id || Arc::strong_count(lock) > 1);
        locks.entry(household_id).or_default().clone()
    }

    /// Process one message end to end
    ///
    /// Anonymous callers (`None`) get the classification only: nothing is
    /// persisted or logged.
    pub async fn handle(&self, caller: Option<ChatCaller>, request: ChatRequest) -> Result<ChatResponse> {
        let text = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());
        let audio = request.audio.as_ref().filter(|a| !a.bytes.is_empty());

        let (mut message, transcribed) = match (text, audio) {
            (Some(_), Some(_)) => {
                return Err(Error::Validation(
                    "Send either a message or an audio clip, not both".into(),
                ))
            }
            (None, None) => {
                return Err(Error::Validation("A message or an audio clip is required".into()))
            }
            (Some(text), None) => (text.to_string(), false),
            (None, Some(audio)) => {
                debug!(stage = "received", bytes = audio.bytes.len(), "Voice message");
                match self
                    .transcriber
                    .transcribe(&audio.bytes, audio.filename.as_deref())
                    .await
                {
                    Ok(text) => {
                        debug!(stage = "transcribed", chars = text.chars().count(), "Audio transcribed");
                        (text, true)
                    }
                    Err(e) => {
                        warn!(error = %e, "Could not transcribe voice message");
                        let response = ChatResponse {
                            intent: Intent::Unknown.name().to_string(),
                            assistant_message: replies::TRANSCRIPTION_FAILED.to_string(),
                            ..ChatResponse::default()
                        };
                        if let Some(caller) = caller {
                            self.log(caller, replies::UNTRANSCRIBED_AUDIO, &response, None);
                        }
                        return Ok(response);
                    }
                }
            }
        };
        if !transcribed {
            debug!(stage = "received", chars = message.chars().count(), "Text message");
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            if !transcribed {
                return Err(Error::Validation(format!(
                    "Message exceeds {} characters",
                    MAX_MESSAGE_CHARS
                )));
            }
            message = message.chars().take(MAX_MESSAGE_CHARS).collect();
        }

        let history = history_from_context(&request.context, self.config.max_context_turns);
        let classification = match self.classifier.classify(&message, &history).await {
            Ok(c) => c,
            Err(e) => {
                if e.is_gateway() {
                    warn!(error = %e, "Classifier unavailable");
                } else {
                    error!(error = %e, "Classifier failed");
                }
                Classification::unavailable(replies::CLASSIFIER_UNAVAILABLE)
            }
        };
        debug!(stage = "classified", intent = classification.intent.name(), "Message classified");

        let mut response = ChatResponse::from_classification(&classification);
        if transcribed {
            response.transcribed_text = Some(message.clone());
        }

        let Some(caller) = caller else {
            debug!(stage = "replied", "Anonymous caller, nothing persisted");
            return Ok(response);
        };

        if !classification.intent.is_conversational() {
            let lock = self.household_lock(caller.household_id);
            let _guard = lock.lock().await;
            debug!(stage = "dispatched", intent = classification.intent.name(), "Dispatching");
            if let Err(e) = self.dispatch(
                caller,
                &classification.intent,
                &message,
                request.pending_transaction_id,
                &mut response,
            ) {
                error!(error = %e, intent = classification.intent.name(), "Chat dispatch failed");
                response.assistant_message = replies::SAVE_FAILED.to_string();
                response.transaction_saved = None;
                response.transaction_pending = None;
            }
        }

        self.log(
            caller,
            &message,
            &response,
            transcribed.then_some(message.as_str()),
        );
        info!(
            member_id = caller.member_id,
            intent = %response.intent,
            clarification_needed = response.clarification_needed,
            "Chat message handled"
        );
        Ok(response)
    }

    fn dispatch(
        &self,
        caller: ChatCaller,
        intent: &Intent,
        message: &str,
        pending_transaction_id: Option<i64>,
        response: &mut ChatResponse,
    ) -> Result<()> {
        let ledger = self.db.ledger(caller.household_id);
        let today = self.config.today();
        let reconciler = Reconciler::new(ledger, &self.config, caller.member_id);

        match intent {
            Intent::CreateTransaction(drafts) => {
                reconciler.create(drafts, message, pending_transaction_id, response)
            }
            Intent::EditTransaction { criteria, patch } => {
                reconciler.edit(criteria, patch, response)
            }
            Intent::QuerySummary(query) => reports::query_summary(ledger, today, query, response),
            Intent::SetGoal(goal) => reports::set_goal(ledger, today, goal, response),
            Intent::CheckGoal(goal) => reports::check_goal(ledger, today, goal, response),
            Intent::Greeting | Intent::Clarification | Intent::SmallTalk | Intent::Unknown => {
                Ok(())
            }
        }
    }

    /// Append to the conversation log; a failure only costs the log entry
    fn log(
        &self,
        caller: ChatCaller,
        user_message: &str,
        response: &ChatResponse,
        transcribed: Option<&str>,
    ) {
        match self.db.append_conversation(
            caller.member_id,
            user_message,
            &response.assistant_message,
            Some(&response.intent),
            transcribed,
        ) {
            Ok(_) => debug!(stage = "logged", "Conversation logged"),
            Err(e) => warn!(error = %e, "Failed to log conversation"),
        }
    }

    /// The member's recent exchanges as alternating user/assistant turns
    pub fn history(&self, member_id: i64, limit: Option<i64>) -> Result<Vec<HistoryTurn>> {
        let entries = self
            .db
            .recent_conversation(member_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))?;
        Ok(entries
            .into_iter()
            .flat_map(|entry| {
                [
                    HistoryTurn {
                        role: ChatRole::User,
                        content: entry.user_message,
                        intent: None,
                        timestamp: entry.created_at,
                    },
                    HistoryTurn {
                        role: ChatRole::Assistant,
                        content: entry.assistant_reply,
                        intent: entry.intent,
                        timestamp: entry.created_at,
                    },
                ]
            })
            .collect())
    }
}
