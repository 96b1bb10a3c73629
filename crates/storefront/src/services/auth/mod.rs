//! Identity provider.
//!
//! Password hashing (Argon2id), bearer token issuance and validation (HS256
//! JWT) and refresh-token revocation. Registration and login flows that touch
//! the store live in [`crate::services::AccountService`].

mod error;
mod password;
mod tokens;

pub use error::AuthError;
pub use password::{
    MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH, hash_password, validate_password, verify_password,
};
pub use tokens::{Claims, TokenKind, TokenPair, TokenService};
