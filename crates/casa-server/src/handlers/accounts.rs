//! Account management handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    Json,
};
use tracing::info;

use super::{read_json, MAX_JSON_BODY};
use crate::{caller, AppError, AppState, SuccessResponse};
use casa_core::models::{Account, NewAccount};

/// GET /api/accounts - List the household's accounts with balances
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Vec<Account>>, AppError> {
    let caller = caller(&request)?;
    let accounts = state.db.ledger(caller.household_id).list_accounts()?;
    Ok(Json(accounts))
}

/// POST /api/accounts - Create a new account
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Account>, AppError> {
    let caller = caller(&request)?;
    let req: NewAccount = read_json(request, MAX_JSON_BODY).await?;

    let account = state.db.ledger(caller.household_id).create_account(&req)?;
    info!(
        user = %caller.member.email,
        account_id = account.id,
        kind = %account.kind,
        "Account created"
    );
    Ok(Json(account))
}

/// GET /api/accounts/:id - Get a single account
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Account>, AppError> {
    let caller = caller(&request)?;
    let account = state
        .db
        .ledger(caller.household_id)
        .get_account(id)?
        .ok_or_else(|| AppError::not_found(&format!("Account {} not found", id)))?;
    Ok(Json(account))
}

/// PUT /api/accounts/:id - Replace an account's fields
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Account>, AppError> {
    let caller = caller(&request)?;
    let req: NewAccount = read_json(request, MAX_JSON_BODY).await?;

    let account = state.db.ledger(caller.household_id).update_account(id, &req)?;
    Ok(Json(account))
}

/// DELETE /api/accounts/:id - Delete an account (409 while transactions use it)
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let caller = caller(&request)?;
    state.db.ledger(caller.household_id).delete_account(id)?;
    info!(user = %caller.member.email, account_id = id, "Account deleted");
    Ok(Json(SuccessResponse { success: true }))
}
