//! Payment routes. Staff only.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use stitch_core::PaymentId;

use crate::error::Result;
use crate::middleware::RequireStaff;
use crate::models::{Payment, PaymentFilter, PaymentInput, PaymentUpdate};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::routes::pagination::{Pager, Paginated};
use crate::state::AppState;

/// GET /api/payments/
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(principal): RequireStaff,
    pager: Pager,
    ApiQuery(filter): ApiQuery<PaymentFilter>,
) -> Result<Json<Paginated<Payment>>> {
    let page = state
        .checkout()
        .list_payments(principal, &filter, pager.request())
        .await?;
    pager.respond(page)
}

/// Attach the payment record for an order.
///
/// POST /api/payments/
#[instrument(skip_all, fields(order_id = %input.order))]
pub async fn create(
    State(state): State<AppState>,
    RequireStaff(principal): RequireStaff,
    ApiJson(input): ApiJson<PaymentInput>,
) -> Result<(StatusCode, Json<Payment>)> {
    let payment = state.checkout().attach_payment(principal, &input).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// GET /api/payments/{id}/
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(principal): RequireStaff,
    ApiPath(id): ApiPath<PaymentId>,
) -> Result<Json<Payment>> {
    Ok(Json(state.checkout().get_payment(principal, id).await?))
}

/// PATCH or PUT /api/payments/{id}/
#[instrument(skip(state, update), fields(payment_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireStaff(principal): RequireStaff,
    ApiPath(id): ApiPath<PaymentId>,
    ApiJson(update): ApiJson<PaymentUpdate>,
) -> Result<Json<Payment>> {
    Ok(Json(
        state
            .checkout()
            .update_payment(principal, id, &update)
            .await?,
    ))
}

/// DELETE /api/payments/{id}/
#[instrument(skip(state), fields(payment_id = %id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireStaff(principal): RequireStaff,
    ApiPath(id): ApiPath<PaymentId>,
) -> Result<StatusCode> {
    state.checkout().delete_payment(principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
