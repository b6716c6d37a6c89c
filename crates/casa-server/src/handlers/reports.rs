//! Report handlers

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    Json,
};
use serde::Deserialize;

use super::categories::parse_kind;
use super::parse_date;
use crate::{caller, AppError, AppState};
use casa_core::chat::reports::resolve_period;
use casa_core::intent::{PeriodRequest, ReportQuery};
use casa_core::models::{Dashboard, Overview, PeriodSummary};

/// Query parameters for the period summary
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Start date (YYYY-MM-DD)
    pub from: Option<String>,
    /// End date (YYYY-MM-DD)
    pub to: Option<String>,
    /// Category name substring
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// GET /api/reports/summary - Paid totals over a period
///
/// The period resolves the same way as a chat report: both bounds as given
/// (swapped if reversed), only `from` runs to today, only `to` starts at its
/// month, neither means the current month.
pub async fn report_summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SummaryQuery>,
    request: Request,
) -> Result<Json<PeriodSummary>, AppError> {
    let caller = caller(&request)?;

    let start_date = parse_date(params.from.as_deref(), "from")?;
    let end_date = parse_date(params.to.as_deref(), "to")?;
    let kind = parse_kind(params.kind.as_deref())?;
    let category = params
        .category
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let query = ReportQuery {
        period: (start_date.is_some() || end_date.is_some()).then_some(PeriodRequest {
            start_date,
            end_date,
        }),
        ..ReportQuery::default()
    };
    let period = resolve_period(&query, state.chat.config().today());

    let summary = state
        .db
        .ledger(caller.household_id)
        .period_summary(period, category, kind)?;
    Ok(Json(summary))
}

/// GET /api/reports/overview - Trailing twelve months
pub async fn report_overview(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Overview>, AppError> {
    let caller = caller(&request)?;
    let overview = state
        .db
        .ledger(caller.household_id)
        .overview(state.chat.config().today())?;
    Ok(Json(overview))
}

/// GET /api/dashboard - Balances, this month's totals and recent entries
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Dashboard>, AppError> {
    let caller = caller(&request)?;
    let dashboard = state
        .db
        .ledger(caller.household_id)
        .dashboard(state.chat.config().today())?;
    Ok(Json(dashboard))
}
