//! Domain models for the storefront.
//!
//! Each module holds the read model returned to clients, the input types
//! accepted on create and update, and the list filter for one aggregate.
//! Filters carry a pure `matches` predicate that mirrors the SQL the
//! `PostgreSQL` store runs, so the in-memory store filters identically.

pub mod account;
pub mod address;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod page;
pub mod payment;

pub use account::{
    Account, Me, NewAccount, Profile, ProfileFields, ProfileFilter, ProfileUpdate,
    StoredCredentials,
};
pub use address::{Address, AddressFilter, AddressInput, AddressUpdate};
pub use cart::{Cart, CartItem, CartItemFilter, CartUpdate};
pub use catalog::{
    Category, CategoryFilter, CategoryInput, CategoryUpdate, Product, ProductFilter,
    ProductInput, ProductUpdate,
};
pub use order::{
    Checkout, NewOrder, Order, OrderChanges, OrderDetail, OrderFilter, OrderItem,
    OrderItemFilter, OrderLine, OrderWrite, PricedLine, PricedOrder, PricingError,
    ProductSnapshot, price_lines,
};
pub use page::{Page, PageRequest};
pub use payment::{Payment, PaymentFilter, PaymentInput, PaymentUpdate, PaymentWrite};

use serde::{Deserialize, Deserializer};

/// Case-insensitive substring test used by every text filter.
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Like [`contains_ci`] for nullable columns. A null never matches.
pub(crate) fn opt_contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| contains_ci(h, needle))
}

/// Check a required text field: non-blank and at most `max` characters.
///
/// # Errors
///
/// Returns a client-facing message naming the field.
pub(crate) fn require_text(field: &str, value: &str, max: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} is required"));
    }
    check_len(field, value, max)
}

/// Check an optional text field's length.
///
/// # Errors
///
/// Returns a client-facing message naming the field.
pub(crate) fn check_len(field: &str, value: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        return Err(format!("{field} must be at most {max} characters"));
    }
    Ok(())
}

/// Distinguish an absent field from an explicit `null` in PATCH bodies.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`: a missing
/// field stays `None`, `null` becomes `Some(None)`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
