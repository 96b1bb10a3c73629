//! Shopping carts and their lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stitch_core::{AccountId, CartId, CartItemId, Money, ProductId};

use super::{contains_ci, double_option};

/// A profile's shopping cart. Each profile has at most one.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Cart {
    #[serde(rename = "cart_id")]
    pub id: CartId,
    #[serde(rename = "user")]
    pub owner: AccountId,
    pub user_username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// PATCH body for a cart.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartUpdate {
    #[serde(default, deserialize_with = "double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// One product line in a cart, with the product's current name and price.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartItem {
    #[serde(rename = "cart_item_id")]
    pub id: CartItemId,
    pub cart: CartId,
    pub product: ProductId,
    pub product_name: String,
    pub product_price: Money,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

/// Cart line list filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartItemFilter {
    /// Free text over the product name.
    pub search: Option<String>,
    pub product_name: Option<String>,
    pub quantity_gte: Option<i32>,
    pub quantity_lte: Option<i32>,
}

impl CartItemFilter {
    /// Whether a line passes every supplied predicate.
    #[must_use]
    pub fn matches(&self, item: &CartItem) -> bool {
        self.search
            .as_deref()
            .is_none_or(|q| contains_ci(&item.product_name, q))
            && self
                .product_name
                .as_deref()
                .is_none_or(|q| contains_ci(&item.product_name, q))
            && self.quantity_gte.is_none_or(|min| item.quantity >= min)
            && self.quantity_lte.is_none_or(|max| item.quantity <= max)
    }
}
