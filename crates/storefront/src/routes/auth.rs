//! Registration, token and session routes.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::Me;
use crate::routes::extract::ApiJson;
use crate::services::auth::AuthError;
use crate::services::{LoginRequest, LoginResponse, RegisterRequest, ServiceError};
use crate::state::AppState;

/// Body carrying a refresh token.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// A fresh access token.
#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub access: String,
}

/// A plain confirmation message.
#[derive(Debug, Serialize)]
pub struct Detail {
    pub detail: &'static str,
}

/// Create an account with its profile and cart.
///
/// POST /api/auth/register/
#[instrument(skip(state, req), fields(username = %req.username))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Me>)> {
    let me = state.accounts().register(req).await?;
    Ok((StatusCode::CREATED, Json(me)))
}

/// Exchange credentials for an access/refresh pair.
///
/// POST /api/auth/token/
#[instrument(skip(state, req), fields(username = %req.username))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    Ok(Json(state.accounts().login(&req).await?))
}

/// POST /api/auth/token/refresh/
#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> Result<Json<AccessResponse>> {
    let access = state.accounts().refresh(&req.refresh).await?;
    Ok(Json(AccessResponse { access }))
}

/// Revoke a refresh token.
///
/// POST /api/auth/logout/
///
/// An unusable token answers 400 rather than 401 so a client can tell a
/// stale logout apart from a missing access token.
#[instrument(skip_all, fields(account_id = %principal.account_id))]
pub async fn logout(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> Result<Json<Detail>> {
    match state.accounts().logout(&req.refresh).await {
        Ok(()) => Ok(Json(Detail {
            detail: "Successfully logged out.",
        })),
        Err(ServiceError::Auth(
            AuthError::InvalidToken | AuthError::ExpiredToken | AuthError::RevokedToken,
        )) => Err(AppError::BadRequest(
            "Invalid token or already logged out.".to_string(),
        )),
        Err(err) => Err(err.into()),
    }
}

/// The caller's account, profile, addresses and cart.
///
/// GET /api/auth/me/
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<Me>> {
    Ok(Json(state.accounts().me(principal).await?))
}

/// Greeting for a signed-in caller. Handy for checking a token by hand.
#[derive(Debug, Serialize)]
pub struct Protected {
    pub message: String,
    pub user_id: i32,
}

/// GET /api/protected/
pub async fn protected(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<Protected>> {
    let me = state.accounts().me(principal).await?;
    Ok(Json(Protected {
        message: format!(
            "Welcome, {}! You have accessed a protected route.",
            me.username
        ),
        user_id: principal.account_id.as_i32(),
    }))
}
