//! Member and household handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{read_json, MAX_JSON_BODY};
use crate::{caller, identity, member, AppError, AppState};
use casa_core::models::{Household, Member};

/// Request body for registering the calling member
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
    pub phone: Option<String>,
    /// Create a new household with this name
    pub household_name: Option<String>,
    /// Or join an existing one
    pub invite_code: Option<String>,
}

/// The caller and their household
#[derive(Serialize)]
pub struct MeResponse {
    pub member: Member,
    pub household: Option<Household>,
}

#[derive(Serialize)]
pub struct HouseholdResponse {
    #[serde(flatten)]
    pub household: Household,
    pub members: Vec<Member>,
}

/// Request body for joining a household
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub invite_code: String,
}

/// POST /api/register - Register the caller, then create or join a household
///
/// The email comes from the identity header, never from the body.
pub async fn register(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<MeResponse>, AppError> {
    let identity = identity(&request)?;
    let req: RegisterRequest = read_json(request, MAX_JSON_BODY).await?;

    if req.household_name.is_some() && req.invite_code.is_some() {
        return Err(AppError::bad_request(
            "Provide household_name or invite_code, not both",
        ));
    }

    let member = state
        .db
        .register_member(&identity.email, &req.display_name, req.phone.as_deref())?;

    let household = match (&req.household_name, &req.invite_code, member.household_id) {
        (Some(name), None, None) => Some(state.db.create_household(member.id, name)?),
        (None, Some(code), _) => Some(state.db.join_household(member.id, code)?),
        (Some(_), None, Some(_)) => {
            return Err(AppError::conflict("Member already belongs to a household"))
        }
        (_, _, Some(id)) => state.db.get_household(id)?,
        _ => None,
    };

    info!(member_id = member.id, household = ?household.as_ref().map(|h| h.id), "Member registered");

    let member = state
        .db
        .get_member(member.id)?
        .ok_or_else(|| AppError::internal("Member not found after registration"))?;
    Ok(Json(MeResponse { member, household }))
}

/// GET /api/me - The calling member
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<MeResponse>, AppError> {
    let member = member(&request)?;
    let household = match member.household_id {
        Some(id) => state.db.get_household(id)?,
        None => None,
    };
    Ok(Json(MeResponse { member, household }))
}

/// GET /api/household - The caller's household with its members and invite code
pub async fn get_household(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<HouseholdResponse>, AppError> {
    let caller = caller(&request)?;
    let household = state
        .db
        .get_household(caller.household_id)?
        .ok_or_else(|| AppError::not_found("Household not found"))?;
    let members = state.db.list_household_members(household.id)?;
    Ok(Json(HouseholdResponse { household, members }))
}

/// POST /api/household/join - Join a household by invite code
pub async fn join_household(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Household>, AppError> {
    let member = member(&request)?;
    let req: JoinRequest = read_json(request, MAX_JSON_BODY).await?;

    let household = state.db.join_household(member.id, &req.invite_code)?;
    Ok(Json(household))
}
