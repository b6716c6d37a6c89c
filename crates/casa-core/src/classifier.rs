//! Intent classifier gateway
//!
//! Wraps the remote chat-completion call: renders the system prompt with the
//! household's dates, forwards the recent conversation, enforces a timeout
//! and parses the JSON answer into a [`Classification`].

use std::collections::HashMap;

use chrono::Duration;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::ai::parsing::extract_json_object;
use crate::ai::{AIBackend, AIClient, ChatRole, ChatTurn};
use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::intent::Classification;
use crate::prompts::{Prompt, PromptId, PromptLibrary};

/// Intents the classifier may answer with
pub const INTENT_NAMES: &[&str] = &[
    "create_transaction",
    "edit_transaction",
    "query_summary",
    "set_goal",
    "check_goal",
    "greeting",
    "clarification",
    "small_talk",
    "unknown",
];

/// JSON schema of the classifier answer
pub fn classification_schema() -> Value {
    let draft = json!({
        "type": "object",
        "properties": {
            "type": {"type": "string", "enum": ["despesa", "receita"]},
            "amount": {"type": "number", "description": "Valor positivo em reais."},
            "title": {"type": "string"},
            "category": {"type": "string"},
            "account": {"type": "string"},
            "date": {"type": "string", "format": "date"},
            "notes": {"type": "string"}
        },
        "additionalProperties": false
    });

    json!({
        "type": "object",
        "properties": {
            "intent": {"type": "string", "enum": INTENT_NAMES},
            "clarification_needed": {"type": "boolean"},
            "assistant_message": {"type": "string"},
            "confidence": {"type": "number", "minimum": 0, "maximum": 1},
            "transaction": {
                "anyOf": [draft.clone(), {"type": "array", "items": draft}]
            },
            "search_criteria": {
                "type": "object",
                "properties": {
                    "category": {"type": "string"},
                    "account": {"type": "string"},
                    "date": {"type": "string", "format": "date"},
                    "min_amount": {"type": "number"},
                    "max_amount": {"type": "number"},
                    "title_contains": {"type": "string"}
                },
                "additionalProperties": false
            },
            "query": {
                "type": "object",
                "properties": {
                    "summary_type": {
                        "type": "string",
                        "enum": ["month_total", "category_total", "period_total", "list_transactions", "balance"]
                    },
                    "category": {"type": "string"},
                    "type": {"type": "string", "enum": ["despesa", "receita", "todas"]},
                    "period": {
                        "type": "object",
                        "properties": {
                            "start_date": {"type": "string", "format": "date"},
                            "end_date": {"type": "string", "format": "date"}
                        },
                        "additionalProperties": false
                    }
                },
                "additionalProperties": false
            },
            "goal": {
                "type": "object",
                "properties": {
                    "type": {"type": "string", "enum": ["spending_cap", "savings_target", "category_cap"]},
                    "amount": {"type": "number"},
                    "category": {"type": "string"},
                    "period": {
                        "type": "object",
                        "properties": {
                            "month": {"type": "integer", "minimum": 1, "maximum": 12},
                            "year": {"type": "integer"}
                        },
                        "additionalProperties": false
                    }
                },
                "additionalProperties": false
            }
        },
        "required": ["intent", "clarification_needed", "assistant_message"],
        "additionalProperties": false
    })
}

/// Turn a client-supplied conversation context into chat turns
///
/// Accepts an array of `{role, content}` objects or that array encoded as a
/// JSON string. Anything else, unknown roles and empty messages are dropped.
/// At most `max_turns` of the latest turns are kept.
pub fn history_from_context(context: &Value, max_turns: usize) -> Vec<ChatTurn> {
    let decoded;
    let items = match context {
        Value::Array(items) => items,
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => {
                decoded = items;
                &decoded
            }
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    let turns: Vec<ChatTurn> = items
        .iter()
        .filter_map(|item| {
            let role = ChatRole::from_client(item.get("role")?.as_str()?)?;
            let content = item.get("content")?.as_str()?.trim();
            (!content.is_empty()).then(|| ChatTurn {
                role,
                content: content.to_string(),
            })
        })
        .collect();

    let skip = turns.len().saturating_sub(max_turns);
    turns.into_iter().skip(skip).collect()
}

/// Classifier gateway
pub struct IntentClassifier {
    client: Option<AIClient>,
    prompt: Prompt,
    schema: Value,
    config: ChatConfig,
}

impl IntentClassifier {
    /// Create a classifier with the system prompt from the prompt library
    pub fn new(client: Option<AIClient>, config: ChatConfig) -> Result<Self> {
        let library = PromptLibrary::new();
        let prompt = library.load(PromptId::ChatAssistant)?;
        if prompt.is_override {
            info!(path = ?prompt.override_path, "Using chat prompt override");
        }
        Ok(Self::with_prompt(client, config, prompt))
    }

    /// Create a classifier with an explicit prompt
    pub fn with_prompt(client: Option<AIClient>, config: ChatConfig, prompt: Prompt) -> Self {
        Self {
            client,
            prompt,
            schema: classification_schema(),
            config,
        }
    }

    /// Whether a backend is configured
    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    pub fn client(&self) -> Option<&AIClient> {
        self.client.as_ref()
    }

    /// System prompt with today's dates in the household timezone
    pub fn system_prompt(&self) -> String {
        let today = self.config.today();
        let iso = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
        let vars = HashMap::from([
            ("today", today.format("%d/%m/%Y").to_string()),
            ("today_iso", today.to_string()),
            ("yesterday_iso", iso(today.checked_sub_signed(Duration::days(1)))),
            ("tomorrow_iso", iso(today.checked_add_signed(Duration::days(1)))),
            ("timezone", self.config.timezone_name.clone()),
        ]);
        self.prompt.render_system(&vars)
    }

    /// Classify one user message given the prior conversation
    pub async fn classify(&self, message: &str, history: &[ChatTurn]) -> Result<Classification> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| Error::Gateway("No AI backend configured".into()))?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatTurn::system(self.system_prompt()));
        let skip = history.len().saturating_sub(self.config.max_context_turns);
        messages.extend(
            history
                .iter()
                .skip(skip)
                .filter(|t| t.role != ChatRole::System)
                .cloned(),
        );
        messages.push(ChatTurn::user(message));

        debug!(
            model = client.model(),
            turns = messages.len(),
            "Sending message to classifier"
        );

        let timeout = self.config.ai_timeout;
        let raw = tokio::time::timeout(timeout, client.complete_json(&messages, &self.schema))
            .await
            .map_err(|_| Error::Timeout(timeout.as_secs()))??;

        let classification = Classification::from_value(extract_json_object(&raw)?);
        if !classification.deviations.is_empty() {
            warn!(
                deviations = ?classification.deviations,
                "Classifier answer deviated from schema"
            );
        }
        debug!(
            intent = classification.intent.name(),
            clarification_needed = classification.clarification_needed,
            "Message classified"
        );
        Ok(classification)
    }
}
