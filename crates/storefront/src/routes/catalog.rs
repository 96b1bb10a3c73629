//! Category and product routes.
//!
//! Reads are public. Writes require a staff token.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use stitch_core::{CategoryId, ProductId};

use crate::error::Result;
use crate::middleware::RequireStaff;
use crate::models::{
    Category, CategoryFilter, CategoryInput, CategoryUpdate, Product, ProductFilter,
    ProductInput, ProductUpdate,
};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::routes::pagination::{Pager, Paginated};
use crate::state::AppState;

// =============================================================================
// Categories
// =============================================================================

/// GET /api/categories/
pub async fn categories(
    State(state): State<AppState>,
    pager: Pager,
    ApiQuery(filter): ApiQuery<CategoryFilter>,
) -> Result<Json<Paginated<Category>>> {
    let page = state
        .catalog()
        .list_categories(&filter, pager.request())
        .await?;
    pager.respond(page)
}

/// POST /api/categories/
#[instrument(skip_all, fields(name = %input.name))]
pub async fn create_category(
    State(state): State<AppState>,
    RequireStaff(principal): RequireStaff,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = state.catalog().create_category(principal, &input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /api/categories/{id}/
pub async fn category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<Json<Category>> {
    Ok(Json(state.catalog().get_category(id).await?))
}

/// PATCH or PUT /api/categories/{id}/
#[instrument(skip(state, update), fields(category_id = %id))]
pub async fn update_category(
    State(state): State<AppState>,
    RequireStaff(principal): RequireStaff,
    ApiPath(id): ApiPath<CategoryId>,
    ApiJson(update): ApiJson<CategoryUpdate>,
) -> Result<Json<Category>> {
    Ok(Json(
        state
            .catalog()
            .update_category(principal, id, &update)
            .await?,
    ))
}

/// DELETE /api/categories/{id}/
#[instrument(skip(state), fields(category_id = %id))]
pub async fn delete_category(
    State(state): State<AppState>,
    RequireStaff(principal): RequireStaff,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<StatusCode> {
    state.catalog().delete_category(principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Products
// =============================================================================

/// GET /api/products/
pub async fn products(
    State(state): State<AppState>,
    pager: Pager,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> Result<Json<Paginated<Product>>> {
    let page = state
        .catalog()
        .list_products(&filter, pager.request())
        .await?;
    pager.respond(page)
}

/// POST /api/products/
#[instrument(skip_all, fields(name = %input.name))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireStaff(principal): RequireStaff,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state.catalog().create_product(principal, &input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/products/{id}/
pub async fn product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().get_product(id).await?))
}

/// PATCH or PUT /api/products/{id}/
#[instrument(skip(state, update), fields(product_id = %id))]
pub async fn update_product(
    State(state): State<AppState>,
    RequireStaff(principal): RequireStaff,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(update): ApiJson<ProductUpdate>,
) -> Result<Json<Product>> {
    Ok(Json(
        state
            .catalog()
            .update_product(principal, id, &update)
            .await?,
    ))
}

/// DELETE /api/products/{id}/
#[instrument(skip(state), fields(product_id = %id))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireStaff(principal): RequireStaff,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<StatusCode> {
    state.catalog().delete_product(principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
