//! Casa Core Library
//!
//! Shared functionality for the Casa household expense tracker:
//! - Encrypted SQLite ledger scoped per household
//! - Chat pipeline turning Portuguese messages into ledger operations
//! - Pluggable AI backends for intent classification and transcription
//! - Prompt library with user overrides
//! - Reports, dashboard and monthly goals

pub mod ai;
pub mod chat;
pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod intent;
pub mod models;
pub mod prompts;
pub mod transcription;

/// Test utilities including a mock OpenAI-compatible server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, ChatRole, ChatTurn, MockBackend, OllamaBackend, OpenAICompatibleBackend};
pub use chat::{
    AudioClip, ChatCaller, ChatRequest, ChatResponse, ChatService, HistoryTurn, MAX_MESSAGE_CHARS,
};
pub use classifier::IntentClassifier;
pub use config::ChatConfig;
pub use db::{Database, DraftLookup, Ledger, TransactionFilter, TransactionPage};
pub use error::{Error, Result};
pub use intent::{Classification, Intent};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use transcription::Transcriber;
