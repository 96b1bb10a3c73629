//! Bearer token extractors.
//!
//! Handlers take [`RequireAuth`] or [`RequireStaff`] to get the caller's
//! [`Principal`]. After the token checks out the account is re-read, so a
//! deleted account is rejected and the staff flag is always the current one.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use stitch_core::Principal;

use crate::error::{AppError, set_sentry_user};
use crate::services::ServiceError;
use crate::state::AppState;

/// Extractor that requires a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(principal): RequireAuth) -> String {
///     format!("Hello, account {}!", principal.account_id)
/// }
/// ```
pub struct RequireAuth(pub Principal);

/// Extractor that requires a valid access token for a staff account.
pub struct RequireStaff(pub Principal);

/// Pull the token out of an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".to_string())
        })?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header.".to_string()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header.".to_string()))?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AppError::Unauthorized(
            "Invalid Authorization header.".to_string(),
        ));
    }
    Ok(token.trim())
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claimed = state.tokens().verify_access(bearer_token(parts)?)?;
        let account = state
            .store()
            .get_account(claimed.account_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;
        let principal = Principal {
            account_id: account.id,
            is_staff: account.is_staff,
        };

        tracing::Span::current().record("account_id", principal.account_id.as_i32());
        set_sentry_user(&principal.account_id);

        Ok(Self(principal))
    }
}

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(principal) = RequireAuth::from_request_parts(parts, state).await?;
        if !principal.is_staff {
            return Err(ServiceError::Forbidden.into());
        }
        Ok(Self(principal))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/me/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def"))).unwrap(), "abc.def");
        assert_eq!(bearer_token(&parts(Some("bearer abc"))).unwrap(), "abc");
        assert!(matches!(
            bearer_token(&parts(None)),
            Err(AppError::Unauthorized(_))
        ));
        assert!(bearer_token(&parts(Some("Basic dXNlcjpwYXNz"))).is_err());
        assert!(bearer_token(&parts(Some("Bearer "))).is_err());
    }
}
