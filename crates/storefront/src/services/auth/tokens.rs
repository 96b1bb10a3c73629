//! Bearer token issuance and validation.
//!
//! Access and refresh tokens are HS256 JWTs signed with the configured
//! secret. Both carry the account id and the staff flag at issue time; the
//! request extractors re-read the account before trusting either. Logout
//! revokes a refresh token by its `jti`; revocations are held in memory for
//! the refresh lifetime, after which the token would be rejected as expired
//! anyway.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use moka::future::Cache;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stitch_core::{AccountId, Principal};

use super::AuthError;
use crate::config::AuthConfig;

/// Which endpoint a token may be presented to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id, as a string per RFC 7519.
    pub sub: String,
    /// Staff flag at issue time.
    pub staff: bool,
    /// Token kind.
    pub typ: TokenKind,
    /// Unique token id, used for revocation.
    pub jti: Uuid,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

impl Claims {
    /// The principal this token authenticates.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if `sub` is not an account id.
    pub fn principal(&self) -> Result<Principal, AuthError> {
        let id: i32 = self.sub.parse().map_err(|_| AuthError::InvalidToken)?;
        Ok(Principal {
            account_id: AccountId::new(id),
            is_staff: self.staff,
        })
    }
}

/// An access/refresh token pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues, validates and revokes bearer tokens.
///
/// Clone-friendly via `Arc`; clones share the revocation list.
#[derive(Clone)]
pub struct TokenService {
    inner: Arc<TokenServiceInner>,
}

struct TokenServiceInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    revoked: Cache<Uuid, ()>,
}

impl TokenService {
    /// Create a token service from auth configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let revoked = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(config.refresh_token_ttl)
            .build();

        Self {
            inner: Arc::new(TokenServiceInner {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                validation,
                access_ttl: config.access_token_ttl,
                refresh_ttl: config.refresh_token_ttl,
                revoked,
            }),
        }
    }

    /// Access token lifetime.
    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.inner.access_ttl
    }

    fn issue(&self, principal: Principal, typ: TokenKind) -> Result<String, AuthError> {
        let ttl = match typ {
            TokenKind::Access => self.inner.access_ttl,
            TokenKind::Refresh => self.inner.refresh_ttl,
        };
        let iat = Utc::now().timestamp();
        let claims = Claims {
            sub: principal.account_id.to_string(),
            staff: principal.is_staff,
            typ,
            jti: Uuid::new_v4(),
            iat,
            exp: iat.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.inner.encoding,
        )?)
    }

    /// Issue a new access and refresh token for `principal`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if signing fails.
    pub fn issue_pair(&self, principal: Principal) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access: self.issue(principal, TokenKind::Access)?,
            refresh: self.issue(principal, TokenKind::Refresh)?,
        })
    }

    /// Issue an access token only.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if signing fails.
    pub fn issue_access(&self, principal: Principal) -> Result<String, AuthError> {
        self.issue(principal, TokenKind::Access)
    }

    fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        let claims = match decode::<Claims>(token, &self.inner.decoding, &self.inner.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                return Err(match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                    _ => AuthError::InvalidToken,
                });
            }
        };
        if claims.typ != expected {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    /// Validate an access token and return its principal.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ExpiredToken` or `AuthError::InvalidToken`.
    pub fn verify_access(&self, token: &str) -> Result<Principal, AuthError> {
        self.decode(token, TokenKind::Access)?.principal()
    }

    /// Validate a refresh token, including revocation.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RevokedToken` after logout, otherwise as for
    /// [`Self::verify_access`].
    pub async fn verify_refresh(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.decode(token, TokenKind::Refresh)?;
        if self.inner.revoked.contains_key(&claims.jti) {
            return Err(AuthError::RevokedToken);
        }
        Ok(claims)
    }

    /// Revoke a refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid, unrevoked refresh token.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.verify_refresh(token).await?;
        self.inner.revoked.insert(claims.jti, ()).await;
        Ok(())
    }
}
