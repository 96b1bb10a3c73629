//! Profile routes (`/api/appusers/`).
//!
//! Profiles are addressed by their account id.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use stitch_core::AccountId;

use crate::error::Result;
use crate::middleware::{RequireAuth, RequireStaff};
use crate::models::{Profile, ProfileFilter, ProfileUpdate};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::routes::pagination::{Pager, Paginated};
use crate::state::AppState;

/// GET /api/appusers/
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(principal): RequireStaff,
    pager: Pager,
    ApiQuery(filter): ApiQuery<ProfileFilter>,
) -> Result<Json<Paginated<Profile>>> {
    let page = state
        .accounts()
        .list_profiles(principal, &filter, pager.request())
        .await?;
    pager.respond(page)
}

/// GET /api/appusers/{id}/
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<AccountId>,
) -> Result<Json<Profile>> {
    Ok(Json(state.accounts().get_profile(principal, id).await?))
}

/// PATCH or PUT /api/appusers/{id}/
#[instrument(skip(state, update), fields(account_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<AccountId>,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<Profile>> {
    Ok(Json(
        state
            .accounts()
            .update_profile(principal, id, &update)
            .await?,
    ))
}

/// DELETE /api/appusers/{id}/
#[instrument(skip(state), fields(account_id = %id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<AccountId>,
) -> Result<StatusCode> {
    state.accounts().delete_profile(principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
