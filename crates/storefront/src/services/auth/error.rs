//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials (wrong password or unknown username).
    #[error("No active account found with the given credentials")]
    InvalidCredentials,

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// Token is malformed, has a bad signature or is the wrong kind.
    #[error("Token is invalid")]
    InvalidToken,

    /// Token signature is valid but it has expired.
    #[error("Token is expired")]
    ExpiredToken,

    /// Refresh token was revoked by logout.
    #[error("Token is blacklisted")]
    RevokedToken,

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Token could not be signed.
    #[error("token encoding error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
