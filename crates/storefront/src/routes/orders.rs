//! Order and order item routes.
//!
//! Order bodies embed their items and payment details. Order items are
//! read-only; they are written only by order creation.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use stitch_core::{OrderId, OrderItemId};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{
    Checkout, NewOrder, OrderChanges, OrderDetail, OrderFilter, OrderItem, OrderItemFilter,
};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::routes::pagination::{Pager, Paginated};
use crate::state::AppState;

/// GET /api/orders/
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    pager: Pager,
    ApiQuery(filter): ApiQuery<OrderFilter>,
) -> Result<Json<Paginated<OrderDetail>>> {
    let page = state
        .checkout()
        .list_orders(principal, &filter, pager.request())
        .await?;
    pager.respond(page)
}

/// Place an order from explicit lines.
///
/// POST /api/orders/
#[instrument(skip_all, fields(account_id = %principal.account_id, lines = new.items.len()))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiJson(new): ApiJson<NewOrder>,
) -> Result<(StatusCode, Json<OrderDetail>)> {
    let order = state.checkout().create_order(principal, &new).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Turn the caller's cart into an order and empty the cart.
///
/// POST /api/orders/checkout/
#[instrument(skip_all, fields(account_id = %principal.account_id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiJson(body): ApiJson<Checkout>,
) -> Result<(StatusCode, Json<OrderDetail>)> {
    let order = state.checkout().checkout_from_cart(principal, body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/{id}/
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(state.checkout().get_order(principal, id).await?))
}

/// PATCH or PUT /api/orders/{id}/
#[instrument(skip(state, changes), fields(order_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(changes): ApiJson<OrderChanges>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(
        state
            .checkout()
            .update_order(principal, id, &changes)
            .await?,
    ))
}

/// DELETE /api/orders/{id}/
#[instrument(skip(state), fields(order_id = %id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<StatusCode> {
    state.checkout().delete_order(principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/orderitems/
pub async fn items(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    pager: Pager,
    ApiQuery(filter): ApiQuery<OrderItemFilter>,
) -> Result<Json<Paginated<OrderItem>>> {
    let page = state
        .checkout()
        .list_order_items(principal, &filter, pager.request())
        .await?;
    pager.respond(page)
}

/// GET /api/orderitems/{id}/
pub async fn item(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiPath(id): ApiPath<OrderItemId>,
) -> Result<Json<OrderItem>> {
    Ok(Json(state.checkout().get_order_item(principal, id).await?))
}
