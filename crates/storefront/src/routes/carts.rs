//! Shopping cart and cart item routes.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::instrument;

use stitch_core::{CartId, CartItemId};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{Cart, CartItem, CartItemFilter, CartUpdate};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::routes::pagination::{Pager, Paginated};
use crate::services::{AddCartItem, CartItemQuantity};
use crate::state::AppState;

// =============================================================================
// Carts
// =============================================================================

/// The caller's cart, as a list of zero or one.
///
/// GET /api/shoppingcarts/
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    pager: Pager,
) -> Result<Json<Paginated<Cart>>> {
    let page = state.carts().list_carts(principal, pager.request()).await?;
    pager.respond(page)
}

/// POST /api/shoppingcarts/
#[instrument(skip_all, fields(account_id = %principal.account_id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<(StatusCode, Json<Cart>)> {
    let cart = state.carts().create_cart(principal).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

/// GET /api/shoppingcarts/{id}/
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<CartId>,
) -> Result<Json<Cart>> {
    Ok(Json(state.carts().get_cart(principal, id).await?))
}

/// PATCH or PUT /api/shoppingcarts/{id}/
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<CartId>,
    ApiJson(update): ApiJson<CartUpdate>,
) -> Result<Json<Cart>> {
    Ok(Json(state.carts().update_cart(principal, id, &update).await?))
}

/// DELETE /api/shoppingcarts/{id}/
#[instrument(skip(state), fields(cart_id = %id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<CartId>,
) -> Result<StatusCode> {
    state.carts().delete_cart(principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Cart items
// =============================================================================

/// Lines in the caller's cart.
///
/// GET /api/cartitems/
pub async fn items(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    pager: Pager,
    ApiQuery(filter): ApiQuery<CartItemFilter>,
) -> Result<Json<Paginated<CartItem>>> {
    let page = state
        .carts()
        .list_items(principal, &filter, pager.request())
        .await?;
    pager.respond(page)
}

/// Add a product to the caller's cart, merging with an existing line.
///
/// POST /api/cartitems/
#[instrument(skip(state), fields(account_id = %principal.account_id))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiJson(add): ApiJson<AddCartItem>,
) -> Result<(StatusCode, Json<CartItem>)> {
    let item = state.carts().add_item(principal, add).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /api/cartitems/{id}/
pub async fn item(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<CartItemId>,
) -> Result<Json<CartItem>> {
    Ok(Json(state.carts().get_item(principal, id).await?))
}

/// Set a line's quantity. Zero or less removes the line and answers 204.
///
/// PATCH or PUT /api/cartitems/{id}/
#[instrument(skip(state), fields(cart_item_id = %id))]
pub async fn update_item(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<CartItemId>,
    ApiJson(body): ApiJson<CartItemQuantity>,
) -> Result<Response> {
    let updated = state
        .carts()
        .update_quantity(principal, id, body.quantity)
        .await?;
    Ok(match updated {
        Some(item) => Json(item).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// DELETE /api/cartitems/{id}/
#[instrument(skip(state), fields(cart_item_id = %id))]
pub async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<CartItemId>,
) -> Result<StatusCode> {
    state.carts().remove_item(principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
