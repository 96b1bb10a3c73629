//! Address book routes (`/api/addresses/`).

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use stitch_core::AddressId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{Address, AddressFilter, AddressInput, AddressUpdate};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::routes::pagination::{Pager, Paginated};
use crate::state::AppState;

/// The caller's own addresses.
///
/// GET /api/addresses/
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    pager: Pager,
    ApiQuery(filter): ApiQuery<AddressFilter>,
) -> Result<Json<Paginated<Address>>> {
    let page = state
        .accounts()
        .list_addresses(principal, &filter, pager.request())
        .await?;
    pager.respond(page)
}

/// POST /api/addresses/
#[instrument(skip_all, fields(account_id = %principal.account_id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiJson(input): ApiJson<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = state.accounts().create_address(principal, &input).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// GET /api/addresses/{id}/
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<Json<Address>> {
    Ok(Json(state.accounts().get_address(principal, id).await?))
}

/// PATCH or PUT /api/addresses/{id}/
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<AddressId>,
    ApiJson(update): ApiJson<AddressUpdate>,
) -> Result<Json<Address>> {
    Ok(Json(
        state
            .accounts()
            .update_address(principal, id, &update)
            .await?,
    ))
}

/// DELETE /api/addresses/{id}/
#[instrument(skip(state), fields(address_id = %id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<StatusCode> {
    state.accounts().delete_address(principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
