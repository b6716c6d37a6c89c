//! Error types for Casa

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation would break a referential or uniqueness rule
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// The classifier service failed or returned something unusable
    #[error("Classifier gateway error: {0}")]
    Gateway(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// True for failures of the remote AI services (classification, transcription, timeouts)
    pub fn is_gateway(&self) -> bool {
        matches!(
            self,
            Self::Gateway(_) | Self::Transcription(_) | Self::Timeout(_) | Self::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
