//! Category handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::{read_json, MAX_JSON_BODY};
use crate::{caller, AppError, AppState, SuccessResponse};
use casa_core::models::{Category, NewCategory, TransactionType};

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    /// expense | income (Portuguese names accepted)
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// GET /api/categories - List categories, optionally of one type
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CategoryQuery>,
    request: Request,
) -> Result<Json<Vec<Category>>, AppError> {
    let caller = caller(&request)?;
    let kind = parse_kind(params.kind.as_deref())?;
    let categories = state
        .db
        .ledger(caller.household_id)
        .list_categories(kind)?;
    Ok(Json(categories))
}

/// POST /api/categories - Create a category (409 on duplicate name and type)
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Category>, AppError> {
    let caller = caller(&request)?;
    let req: NewCategory = read_json(request, MAX_JSON_BODY).await?;

    let category = state.db.ledger(caller.household_id).create_category(&req)?;
    info!(
        user = %caller.member.email,
        category_id = category.id,
        "Category created"
    );
    Ok(Json(category))
}

/// GET /api/categories/:id - Get a single category
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Category>, AppError> {
    let caller = caller(&request)?;
    let category = state
        .db
        .ledger(caller.household_id)
        .get_category(id)?
        .ok_or_else(|| AppError::not_found(&format!("Category {} not found", id)))?;
    Ok(Json(category))
}

/// PUT /api/categories/:id - Replace a category's fields
///
/// Changing the type re-types every transaction in the category.
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Category>, AppError> {
    let caller = caller(&request)?;
    let req: NewCategory = read_json(request, MAX_JSON_BODY).await?;

    let category = state
        .db
        .ledger(caller.household_id)
        .update_category(id, &req)?;
    Ok(Json(category))
}

/// DELETE /api/categories/:id - Delete a category (409 while referenced)
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let caller = caller(&request)?;
    state.db.ledger(caller.household_id).delete_category(id)?;
    info!(user = %caller.member.email, category_id = id, "Category deleted");
    Ok(Json(SuccessResponse { success: true }))
}

/// Parse an optional `type` query parameter
pub(crate) fn parse_kind(value: Option<&str>) -> Result<Option<TransactionType>, AppError> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<TransactionType>()
                .map_err(|_| AppError::bad_request(&format!("Unknown type: {}", s)))
        })
        .transpose()
}
