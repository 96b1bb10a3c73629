//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                         - Liveness check
//! GET  /health/ready                   - Readiness check (store ping)
//!
//! # Auth
//! POST /api/auth/register/             - Create account, profile and cart
//! POST /api/auth/token/                - Obtain access/refresh pair
//! POST /api/auth/token/refresh/        - New access token
//! POST /api/auth/logout/               - Revoke refresh token
//! GET  /api/auth/me/                   - Caller's account summary
//! GET  /api/protected/                 - Token check
//!
//! # Profiles (staff list, owner-or-staff detail)
//! GET  /api/appusers/
//! GET|PUT|PATCH|DELETE /api/appusers/{id}/
//!
//! # Catalog (public reads, staff writes)
//! GET|POST /api/categories/
//! GET|PUT|PATCH|DELETE /api/categories/{id}/
//! GET|POST /api/products/
//! GET|PUT|PATCH|DELETE /api/products/{id}/
//!
//! # Account data (owner-or-staff)
//! GET|POST /api/addresses/
//! GET|PUT|PATCH|DELETE /api/addresses/{id}/
//! GET|POST /api/shoppingcarts/
//! GET|PUT|PATCH|DELETE /api/shoppingcarts/{id}/
//! GET|POST /api/cartitems/
//! GET|PUT|PATCH|DELETE /api/cartitems/{id}/
//! GET|POST /api/orders/
//! POST /api/orders/checkout/           - Order from the caller's cart
//! GET|PUT|PATCH|DELETE /api/orders/{id}/
//! GET  /api/orderitems/
//! GET  /api/orderitems/{id}/
//!
//! # Payments (staff)
//! GET|POST /api/payments/
//! GET|PUT|PATCH|DELETE /api/payments/{id}/
//! ```
//!
//! List routes take `page` and `page_size` and answer with the envelope
//! described in [`pagination`].

pub mod addresses;
pub mod auth;
pub mod carts;
pub mod catalog;
pub mod extract;
pub mod health;
pub mod orders;
pub mod pagination;
pub mod payments;
pub mod profiles;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register/", post(auth::register))
        .route("/token/", post(auth::login))
        .route("/token/refresh/", post(auth::refresh))
        .route("/logout/", post(auth::logout))
        .route("/me/", get(auth::me))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/categories/",
            get(catalog::categories).post(catalog::create_category),
        )
        .route(
            "/categories/{id}/",
            get(catalog::category)
                .put(catalog::update_category)
                .patch(catalog::update_category)
                .delete(catalog::delete_category),
        )
        .route(
            "/products/",
            get(catalog::products).post(catalog::create_product),
        )
        .route(
            "/products/{id}/",
            get(catalog::product)
                .put(catalog::update_product)
                .patch(catalog::update_product)
                .delete(catalog::delete_product),
        )
}

/// Create the account data routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/appusers/", get(profiles::index))
        .route(
            "/appusers/{id}/",
            get(profiles::show)
                .put(profiles::update)
                .patch(profiles::update)
                .delete(profiles::destroy),
        )
        .route(
            "/addresses/",
            get(addresses::index).post(addresses::create),
        )
        .route(
            "/addresses/{id}/",
            get(addresses::show)
                .put(addresses::update)
                .patch(addresses::update)
                .delete(addresses::destroy),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/shoppingcarts/", get(carts::index).post(carts::create))
        .route(
            "/shoppingcarts/{id}/",
            get(carts::show)
                .put(carts::update)
                .patch(carts::update)
                .delete(carts::destroy),
        )
        .route("/cartitems/", get(carts::items).post(carts::add_item))
        .route(
            "/cartitems/{id}/",
            get(carts::item)
                .put(carts::update_item)
                .patch(carts::update_item)
                .delete(carts::remove_item),
        )
}

/// Create the order and payment routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/", get(orders::index).post(orders::create))
        .route("/orders/checkout/", post(orders::checkout))
        .route(
            "/orders/{id}/",
            get(orders::show)
                .put(orders::update)
                .patch(orders::update)
                .delete(orders::destroy),
        )
        .route("/orderitems/", get(orders::items))
        .route("/orderitems/{id}/", get(orders::item))
        .route("/payments/", get(payments::index).post(payments::create))
        .route(
            "/payments/{id}/",
            get(payments::show)
                .put(payments::update)
                .patch(payments::update)
                .delete(payments::destroy),
        )
}

/// Create all `/api` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .route("/protected/", get(auth::protected))
        .merge(catalog_routes())
        .merge(account_routes())
        .merge(cart_routes())
        .merge(order_routes())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes())
}
