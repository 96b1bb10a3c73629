//! Staff account management commands.
//!
//! # Usage
//!
//! ```bash
//! stitch-cli admin create -u admin -e admin@example.com -p 'long passphrase'
//! ```
//!
//! # Environment Variables
//!
//! Reads the same configuration as the server (`STITCH_DATABASE_URL`,
//! `STITCH_JWT_SECRET`, ...).

use stitch_storefront::config::{ConfigError, StorefrontConfig};
use stitch_storefront::db::{self, PgStore};
use stitch_storefront::services::AccountService;
use stitch_storefront::services::ServiceError;
use stitch_storefront::services::auth::TokenService;
use thiserror::Error;

/// Errors that can occur during staff account operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// The account was rejected (duplicate username, weak password, ...).
    #[error("{0}")]
    Rejected(#[from] ServiceError),
}

/// Create a staff account with its profile (role `admin`) and cart.
///
/// # Returns
///
/// The id of the created account.
///
/// # Errors
///
/// Returns an error if configuration is missing, the database is
/// unreachable, or the username, email or password is rejected.
pub async fn create_staff(username: &str, email: &str, password: &str) -> Result<i32, AdminError> {
    let config = StorefrontConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let store = PgStore::new(db::create_pool(&config.database_url).await?);
    let tokens = TokenService::new(&config.auth);

    tracing::info!("Creating staff account: {}", username);
    let registration = AccountService::new(&store, &tokens)
        .create_staff(username, email, password)
        .await?;

    let id = registration.account.id.as_i32();
    tracing::info!(
        "Staff account created successfully! ID: {}, Username: {}, Email: {}",
        id,
        username,
        registration.account.email
    );
    Ok(id)
}
