//! Health check handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::warn;

use crate::AppState;
use casa_core::ai::AIBackend;

#[derive(Serialize)]
pub struct HealthResponse {
    /// "ok" when the database answers
    pub status: &'static str,
    pub database: bool,
    pub ai_configured: bool,
    pub ai_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
}

/// GET /api/health - Database and AI backend status
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match state.db.conn() {
        Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
        Err(e) => {
            warn!(error = %e, "Health check could not reach the database");
            false
        }
    };

    let client = state.chat.classifier().client();
    let ai_available = match client {
        Some(client) => client.health_check().await,
        None => false,
    };

    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
        ai_configured: client.is_some(),
        ai_available,
        ai_host: client.map(|c| c.host().to_string()),
        ai_model: client.map(|c| c.model().to_string()),
    })
}
