//! Runtime settings for the chat pipeline
//!
//! Environment variables:
//! - `CASA_TZ_OFFSET_MINUTES`: household UTC offset in minutes (default: -180, São Paulo)
//! - `CASA_TZ_NAME`: timezone label shown to the classifier (default: America/Sao_Paulo)
//! - `CASA_AI_TIMEOUT_SECS`: classifier/transcription timeout (default: 30)
//! - `CASA_DRAFT_WINDOW_DAYS`: how long a pending draft can be promoted (default: 2)

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDate, Utc};
use tracing::warn;

/// Default household timezone offset (UTC-3)
pub const DEFAULT_TZ_OFFSET_MINUTES: i32 = -180;

/// Default validity window for pending drafts
pub const DEFAULT_DRAFT_WINDOW_DAYS: i64 = 2;

/// Default timeout for remote AI calls
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;

/// Number of prior turns forwarded to the classifier
pub const MAX_CONTEXT_TURNS: usize = 20;

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub timezone: FixedOffset,
    pub timezone_name: String,
    pub ai_timeout: Duration,
    pub draft_window: ChronoDuration,
    pub max_context_turns: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            timezone: offset_from_minutes(DEFAULT_TZ_OFFSET_MINUTES),
            timezone_name: "America/Sao_Paulo".to_string(),
            ai_timeout: Duration::from_secs(DEFAULT_AI_TIMEOUT_SECS),
            draft_window: ChronoDuration::days(DEFAULT_DRAFT_WINDOW_DAYS),
            max_context_turns: MAX_CONTEXT_TURNS,
        }
    }
}

impl ChatConfig {
    /// Load settings from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(minutes) = env_parse::<i32>("CASA_TZ_OFFSET_MINUTES") {
            config.timezone = offset_from_minutes(minutes);
        }
        if let Ok(name) = std::env::var("CASA_TZ_NAME") {
            if !name.trim().is_empty() {
                config.timezone_name = name.trim().to_string();
            }
        }
        if let Some(secs) = env_parse::<u64>("CASA_AI_TIMEOUT_SECS").filter(|s| *s > 0) {
            config.ai_timeout = Duration::from_secs(secs);
        }
        if let Some(days) = env_parse::<i64>("CASA_DRAFT_WINDOW_DAYS").filter(|d| *d > 0) {
            config.draft_window = ChronoDuration::days(days);
        }

        config
    }

    /// Current instant in the household timezone
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.timezone)
    }

    /// Today's date in the household timezone
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

fn offset_from_minutes(minutes: i32) -> FixedOffset {
    match FixedOffset::east_opt(minutes.saturating_mul(60)) {
        Some(offset) => offset,
        None => {
            warn!(minutes, "Invalid timezone offset, using UTC-3");
            offset_from_minutes(DEFAULT_TZ_OFFSET_MINUTES)
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}
