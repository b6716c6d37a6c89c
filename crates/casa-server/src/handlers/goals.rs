//! Monthly goal handlers

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    Json,
};
use chrono::Datelike;
use serde::Deserialize;
use tracing::info;

use super::{read_json, MAX_JSON_BODY};
use crate::{caller, AppError, AppState};
use casa_core::models::{Goal, GoalProgress, GoalType, NewGoal};

/// Month selector; defaults to the current month
#[derive(Debug, Deserialize)]
pub struct GoalQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

/// Request body for defining a goal
#[derive(Debug, Deserialize)]
pub struct UpsertGoalRequest {
    pub goal_type: GoalType,
    pub category_id: Option<i64>,
    pub amount: f64,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

fn resolve_month(
    state: &AppState,
    month: Option<u32>,
    year: Option<i32>,
) -> Result<(u32, i32), AppError> {
    let today = state.chat.config().today();
    let month = month.unwrap_or(today.month());
    if !(1..=12).contains(&month) {
        return Err(AppError::bad_request("Month must be between 1 and 12"));
    }
    Ok((month, year.unwrap_or(today.year())))
}

/// GET /api/goals - Goals defined for a month
pub async fn list_goals(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GoalQuery>,
    request: Request,
) -> Result<Json<Vec<Goal>>, AppError> {
    let caller = caller(&request)?;
    let (month, year) = resolve_month(&state, params.month, params.year)?;
    let goals = state
        .db
        .ledger(caller.household_id)
        .list_goals(month, year)?;
    Ok(Json(goals))
}

/// PUT /api/goals - Define a goal, replacing the amount of an existing one
pub async fn upsert_goal(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Goal>, AppError> {
    let caller = caller(&request)?;
    let req: UpsertGoalRequest = read_json(request, MAX_JSON_BODY).await?;
    let (month, year) = resolve_month(&state, req.month, req.year)?;

    let goal = state.db.ledger(caller.household_id).upsert_goal(&NewGoal {
        goal_type: req.goal_type,
        category_id: req.category_id,
        amount: req.amount,
        month,
        year,
    })?;
    info!(
        user = %caller.member.email,
        goal_id = goal.id,
        goal_type = goal.goal_type.as_str(),
        "Goal saved"
    );
    Ok(Json(goal))
}

/// GET /api/goals/progress - Where each goal of a month stands
pub async fn goal_progress(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GoalQuery>,
    request: Request,
) -> Result<Json<Vec<GoalProgress>>, AppError> {
    let caller = caller(&request)?;
    let (month, year) = resolve_month(&state, params.month, params.year)?;
    let progress = state
        .db
        .ledger(caller.household_id)
        .goal_progress(month, year)?;
    Ok(Json(progress))
}
