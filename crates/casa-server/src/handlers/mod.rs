//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod accounts;
pub mod categories;
pub mod chat;
pub mod goals;
pub mod health;
pub mod household;
pub mod reports;
pub mod transactions;

// Re-export all handlers for use in router
pub use accounts::*;
pub use categories::*;
pub use chat::*;
pub use goals::*;
pub use health::*;
pub use household::*;
pub use reports::*;
pub use transactions::*;

use axum::extract::Request;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use crate::AppError;

/// Largest JSON body accepted by the CRUD endpoints
pub const MAX_JSON_BODY: usize = 64 * 1024;

/// Read and parse a JSON request body
pub(crate) async fn read_json<T: DeserializeOwned>(
    request: Request,
    limit: usize,
) -> Result<T, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    serde_json::from_slice(&bytes).map_err(|e| AppError::bad_request(&format!("Invalid JSON: {}", e)))
}

/// Parse an optional `YYYY-MM-DD` query parameter
pub(crate) fn parse_date(value: Option<&str>, field: &str) -> Result<Option<NaiveDate>, AppError> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .map_err(|_| AppError::bad_request(&format!("Invalid {} date format (use YYYY-MM-DD)", field)))
}
