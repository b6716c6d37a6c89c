//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::categories::parse_kind;
use super::{parse_date, read_json, MAX_JSON_BODY};
use crate::{caller, AppError, AppState, Caller, SuccessResponse, MAX_PAGE_LIMIT};
use casa_core::models::{
    NewTransaction, Recurrence, TitleSuggestion, Transaction, TransactionPatch, TransactionStatus,
    TransactionType,
};

/// Query parameters for listing transactions
#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    /// 1-based page number
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Start date (YYYY-MM-DD), inclusive
    pub from: Option<String>,
    /// End date (YYYY-MM-DD), inclusive
    pub to: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category_id: Option<i64>,
    pub account_id: Option<i64>,
    pub status: Option<String>,
    /// Title substring
    pub search: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    50
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub transactions: Vec<Transaction>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    /// Paid totals over the whole filter
    pub income_total: f64,
    pub expense_total: f64,
    pub balance: f64,
}

/// GET /api/transactions - List transactions
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TransactionQuery>,
    request: Request,
) -> Result<Json<TransactionResponse>, AppError> {
    let caller = caller(&request)?;

    // Input validation: clamp pagination parameters
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let page = params.page.max(1);

    let from = parse_date(params.from.as_deref(), "from")?;
    let to = parse_date(params.to.as_deref(), "to")?;
    let kind = parse_kind(params.kind.as_deref())?;
    let status = params
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.parse::<TransactionStatus>()
                .map_err(|_| AppError::bad_request(&format!("Unknown status: {}", s)))
        })
        .transpose()?;
    let search = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let ledger = state.db.ledger(caller.household_id);
    let filter = ledger
        .filter()
        .date_range(from, to)
        .kind(kind)
        .status(status)
        .category_id(params.category_id)
        .account_id(params.account_id)
        .search(search);
    let result = ledger.list_transactions(filter, limit, (page - 1) * limit)?;

    Ok(Json(TransactionResponse {
        transactions: result.transactions,
        total: result.total_count,
        page,
        limit,
        income_total: result.income_total,
        expense_total: result.expense_total,
        balance: result.balance,
    }))
}

/// Request body for the full entry form
///
/// A `type` field is ignored: the type always comes from the category.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub account_id: i64,
    pub category_id: i64,
    pub title: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub status: Option<TransactionStatus>,
    #[serde(default)]
    pub note: String,
    pub payer_id: Option<i64>,
    #[serde(default)]
    pub split_with: Vec<i64>,
    pub recurrence: Option<Recurrence>,
    pub attachment: Option<String>,
}

/// POST /api/transactions - Create a transaction from the full form
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Transaction>, AppError> {
    let caller = caller(&request)?;
    let req: CreateTransactionRequest = read_json(request, MAX_JSON_BODY).await?;
    let ledger = state.db.ledger(caller.household_id);

    // Income from the form is always settled
    let is_income = ledger
        .get_category(req.category_id)?
        .is_some_and(|c| c.kind == TransactionType::Income);
    let status = if is_income {
        TransactionStatus::Paid
    } else {
        req.status.unwrap_or(TransactionStatus::Paid)
    };

    let new = NewTransaction {
        account_id: req.account_id,
        category_id: req.category_id,
        title: req.title,
        amount: req.amount,
        date: req.date,
        status,
        note: req.note,
        payer_id: Some(req.payer_id.unwrap_or(caller.member.id)),
        split_with: req.split_with,
        recurrence: req.recurrence,
        attachment: req.attachment,
    };
    let transaction = ledger.insert_transaction(&new)?;
    log_created(&caller, &transaction, "form");
    Ok(Json(transaction))
}

/// Request body for quick entry
#[derive(Debug, Deserialize)]
pub struct QuickEntryRequest {
    pub account_id: i64,
    pub category_id: i64,
    pub title: String,
    pub amount: f64,
    /// Defaults to today in the household timezone
    pub date: Option<NaiveDate>,
    pub status: Option<TransactionStatus>,
    #[serde(default)]
    pub note: String,
}

/// POST /api/transactions/quick - Minimal entry, date defaults to today
pub async fn quick_entry(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Transaction>, AppError> {
    let caller = caller(&request)?;
    let req: QuickEntryRequest = read_json(request, MAX_JSON_BODY).await?;

    let new = NewTransaction {
        account_id: req.account_id,
        category_id: req.category_id,
        title: req.title,
        amount: req.amount,
        date: req.date.unwrap_or_else(|| state.chat.config().today()),
        status: req.status.unwrap_or(TransactionStatus::Paid),
        note: req.note,
        payer_id: Some(caller.member.id),
        split_with: vec![],
        recurrence: None,
        attachment: None,
    };
    let transaction = state
        .db
        .ledger(caller.household_id)
        .insert_transaction(&new)?;
    log_created(&caller, &transaction, "quick");
    Ok(Json(transaction))
}

fn log_created(caller: &Caller, transaction: &Transaction, source: &str) {
    info!(
        user = %caller.member.email,
        transaction_id = transaction.id,
        kind = %transaction.kind,
        status = %transaction.status,
        source,
        "Transaction created"
    );
}

/// GET /api/transactions/:id - Get a single transaction
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Transaction>, AppError> {
    let caller = caller(&request)?;
    let transaction = state
        .db
        .ledger(caller.household_id)
        .get_transaction(id)?
        .ok_or_else(|| AppError::not_found(&format!("Transaction {} not found", id)))?;
    Ok(Json(transaction))
}

/// PUT /api/transactions/:id - Update a transaction; omitted fields are kept
pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Transaction>, AppError> {
    let caller = caller(&request)?;
    let patch: TransactionPatch = read_json(request, MAX_JSON_BODY).await?;
    if patch.is_empty() {
        return Err(AppError::bad_request("Nothing to update"));
    }

    let transaction = state
        .db
        .ledger(caller.household_id)
        .update_transaction(id, &patch)?;
    info!(user = %caller.member.email, transaction_id = id, "Transaction updated");
    Ok(Json(transaction))
}

/// DELETE /api/transactions/:id - Delete a transaction
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let caller = caller(&request)?;
    state.db.ledger(caller.household_id).delete_transaction(id)?;
    info!(user = %caller.member.email, transaction_id = id, "Transaction deleted");
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// GET /api/transactions/suggestions - Previously used titles for autocomplete
pub async fn title_suggestions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestionQuery>,
    request: Request,
) -> Result<Json<Vec<TitleSuggestion>>, AppError> {
    let caller = caller(&request)?;
    let kind = parse_kind(params.kind.as_deref())?.unwrap_or(TransactionType::Expense);
    let suggestions = state
        .db
        .ledger(caller.household_id)
        .title_suggestions(kind)?;
    Ok(Json(suggestions))
}
