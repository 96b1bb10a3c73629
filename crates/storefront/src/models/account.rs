//! Account and profile domain types.
//!
//! An account is the login identity (username, email, password hash, staff
//! flag). Its profile holds the customer's personal details and shares the
//! account's key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stitch_core::{AccountId, Email, UserRole};

use super::{Address, Cart, check_len, contains_ci, opt_contains_ci, require_text};

/// A login identity.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: Email,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

/// An account together with its password hash.
///
/// Implements `Debug` manually to redact the hash.
#[derive(Clone, sqlx::FromRow)]
pub struct StoredCredentials {
    #[sqlx(flatten)]
    pub account: Account,
    pub password_hash: String,
}

impl std::fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("account", &self.account)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Personal details attached to an account.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Profile {
    /// The owning account (profiles share its key).
    #[serde(rename = "user_id")]
    pub id: AccountId,
    pub username: String,
    pub email: Email,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable profile columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileFields {
    #[serde(default)]
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl ProfileFields {
    /// Check column lengths.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message for the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        check_len("first_name", &self.first_name, 100)?;
        if let Some(middle) = &self.middle_name {
            check_len("middle_name", middle, 100)?;
        }
        if let Some(last) = &self.last_name {
            check_len("last_name", last, 100)?;
        }
        if let Some(phone) = &self.phone {
            check_len("phone", phone, 20)?;
        }
        Ok(())
    }
}

/// Everything needed to create an account, its profile and its cart.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: Email,
    pub password_hash: String,
    pub is_staff: bool,
    pub role: UserRole,
    pub profile: ProfileFields,
}

impl NewAccount {
    /// Maximum username length.
    pub const MAX_USERNAME_LENGTH: usize = 150;

    /// Usernames are letters, digits and `@.+-_`.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message describing the problem.
    pub fn validate_username(username: &str) -> Result<(), String> {
        require_text("username", username, Self::MAX_USERNAME_LENGTH)?;
        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
        {
            return Err(
                "username may only contain letters, digits and @/./+/-/_ characters".to_owned(),
            );
        }
        Ok(())
    }
}

/// PATCH body for a profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
}

impl ProfileUpdate {
    /// Overlay the supplied fields onto the current profile.
    #[must_use]
    pub fn apply(&self, current: &Profile) -> (ProfileFields, UserRole) {
        let fields = ProfileFields {
            first_name: self
                .first_name
                .clone()
                .unwrap_or_else(|| current.first_name.clone()),
            middle_name: self
                .middle_name
                .clone()
                .or_else(|| current.middle_name.clone()),
            last_name: self.last_name.clone().or_else(|| current.last_name.clone()),
            phone: self.phone.clone().or_else(|| current.phone.clone()),
        };
        (fields, self.role.unwrap_or(current.role))
    }
}

/// Staff-only profile list filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileFilter {
    /// Free text over username, email, names and phone.
    pub search: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub created_at_gte: Option<DateTime<Utc>>,
    pub created_at_lte: Option<DateTime<Utc>>,
}

impl ProfileFilter {
    /// Whether a profile passes every supplied predicate.
    #[must_use]
    pub fn matches(&self, p: &Profile) -> bool {
        self.search.as_deref().is_none_or(|q| {
            contains_ci(&p.username, q)
                || contains_ci(p.email.as_str(), q)
                || contains_ci(&p.first_name, q)
                || opt_contains_ci(p.last_name.as_deref(), q)
                || opt_contains_ci(p.phone.as_deref(), q)
        }) && self
            .username
            .as_deref()
            .is_none_or(|q| contains_ci(&p.username, q))
            && self
                .email
                .as_deref()
                .is_none_or(|q| contains_ci(p.email.as_str(), q))
            && self
                .first_name
                .as_deref()
                .is_none_or(|q| contains_ci(&p.first_name, q))
            && self
                .last_name
                .as_deref()
                .is_none_or(|q| opt_contains_ci(p.last_name.as_deref(), q))
            && self
                .phone
                .as_deref()
                .is_none_or(|q| opt_contains_ci(p.phone.as_deref(), q))
            && self.role.is_none_or(|r| p.role == r)
            && self.created_at_gte.is_none_or(|t| p.created_at >= t)
            && self.created_at_lte.is_none_or(|t| p.created_at <= t)
    }
}

/// The caller's own account summary.
#[derive(Debug, Clone, Serialize)]
pub struct Me {
    pub id: AccountId,
    pub username: String,
    pub email: Email,
    pub is_staff: bool,
    pub profile: Option<Profile>,
    pub address: Vec<Address>,
    pub cart: Option<Cart>,
}
