//! The authenticated caller.

use serde::{Deserialize, Serialize};

use super::AccountId;

/// Who is making a request, as established by the identity provider.
///
/// The profile of an account shares its key, so `account_id` also identifies
/// the caller's profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub account_id: AccountId,
    pub is_staff: bool,
}

impl Principal {
    /// A regular customer.
    #[must_use]
    pub const fn customer(account_id: AccountId) -> Self {
        Self {
            account_id,
            is_staff: false,
        }
    }

    /// A staff member.
    #[must_use]
    pub const fn staff(account_id: AccountId) -> Self {
        Self {
            account_id,
            is_staff: true,
        }
    }
}
