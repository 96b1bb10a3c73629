//! Orders, order items and order pricing.
//!
//! Pricing is a pure function over product snapshots read inside the
//! order-creation transaction. Both stores call [`price_lines`] so the rules
//! for merging, validation and totals live in one place.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stitch_core::{
    AccountId, AddressId, Money, MoneyError, OrderId, OrderItemId, OrderStatus, ProductId,
};

use super::{Payment, contains_ci, double_option};

/// An order placed by one profile.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    #[serde(rename = "order_id")]
    pub id: OrderId,
    #[serde(rename = "user")]
    pub owner: AccountId,
    pub user_username: String,
    pub order_date: DateTime<Utc>,
    pub total_amount: Money,
    pub order_status: OrderStatus,
    pub shipping_address: AddressId,
    pub billing_address: AddressId,
    pub delivery_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One priced line of an order. Prices are snapshots taken at creation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    #[serde(rename = "order_item_id")]
    pub id: OrderItemId,
    pub order: OrderId,
    pub product: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub price_at_time_of_order: Money,
    pub subtotal: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order with its lines and payment, as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment_details: Option<Payment>,
}

/// A requested product and quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OrderLine {
    pub product: ProductId,
    pub quantity: i32,
}

/// Body for creating an order from explicit lines.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub shipping_address: AddressId,
    pub billing_address: AddressId,
    pub items: Vec<OrderLine>,
}

/// Body for turning the caller's cart into an order.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Checkout {
    pub shipping_address: AddressId,
    pub billing_address: AddressId,
}

/// PATCH body for an order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderChanges {
    pub order_status: Option<OrderStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub delivery_date: Option<Option<DateTime<Utc>>>,
    pub shipping_address: Option<AddressId>,
    pub billing_address: Option<AddressId>,
}

/// The full set of mutable order columns written by an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderWrite {
    pub order_status: OrderStatus,
    pub delivery_date: Option<DateTime<Utc>>,
    pub shipping_address: AddressId,
    pub billing_address: AddressId,
}

/// Order list filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub order_status: Option<OrderStatus>,
    pub total_amount_gte: Option<Decimal>,
    pub total_amount_lte: Option<Decimal>,
    pub order_date_gte: Option<DateTime<Utc>>,
    pub order_date_lte: Option<DateTime<Utc>>,
}

impl OrderFilter {
    /// Whether an order passes every supplied predicate.
    #[must_use]
    pub fn matches(&self, o: &Order) -> bool {
        let total = o.total_amount.amount();
        self.order_status.is_none_or(|s| o.order_status == s)
            && self.total_amount_gte.is_none_or(|min| total >= min)
            && self.total_amount_lte.is_none_or(|max| total <= max)
            && self.order_date_gte.is_none_or(|t| o.order_date >= t)
            && self.order_date_lte.is_none_or(|t| o.order_date <= t)
    }
}

/// Order line list filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderItemFilter {
    /// Free text over the product name.
    pub search: Option<String>,
    pub order_id: Option<OrderId>,
    pub product_name: Option<String>,
    pub quantity_gte: Option<i32>,
    pub quantity_lte: Option<i32>,
}

impl OrderItemFilter {
    /// Whether a line passes every supplied predicate.
    #[must_use]
    pub fn matches(&self, item: &OrderItem) -> bool {
        self.search
            .as_deref()
            .is_none_or(|q| contains_ci(&item.product_name, q))
            && self.order_id.is_none_or(|o| item.order == o)
            && self
                .product_name
                .as_deref()
                .is_none_or(|q| contains_ci(&item.product_name, q))
            && self.quantity_gte.is_none_or(|min| item.quantity >= min)
            && self.quantity_lte.is_none_or(|max| item.quantity <= max)
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// The product columns pricing needs, read at order time.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub is_available: bool,
}

/// A line with its price snapshot and subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub product: ProductId,
    pub quantity: i32,
    pub price: Money,
    pub subtotal: Money,
}

/// Priced lines and their total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub total: Money,
}

/// Why a set of lines cannot be turned into an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("an order needs at least one item")]
    Empty,
    #[error("quantity for product {product} must be at least 1 (got {quantity})")]
    InvalidQuantity { product: ProductId, quantity: i32 },
    #[error("product {0} does not exist")]
    UnknownProduct(ProductId),
    #[error("product {0:?} is not available")]
    Unavailable(String),
    #[error("order total is too large")]
    Overflow,
}

impl From<MoneyError> for PricingError {
    fn from(_: MoneyError) -> Self {
        Self::Overflow
    }
}

/// Merge repeated products into one line, keeping first-seen order.
fn merge_lines(lines: &[OrderLine]) -> Result<Vec<OrderLine>, PricingError> {
    let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if let Some(existing) = merged.iter_mut().find(|l| l.product == line.product) {
            existing.quantity = existing
                .quantity
                .checked_add(line.quantity)
                .ok_or(PricingError::Overflow)?;
        } else {
            merged.push(*line);
        }
    }
    Ok(merged)
}

/// Price requested lines against current product snapshots.
///
/// # Errors
///
/// Returns [`PricingError`] for an empty request, a quantity below 1, a
/// product missing from `products`, an unavailable product, or a total that
/// overflows the money column.
pub fn price_lines(
    lines: &[OrderLine],
    products: &[ProductSnapshot],
) -> Result<PricedOrder, PricingError> {
    if lines.is_empty() {
        return Err(PricingError::Empty);
    }
    if let Some(bad) = lines.iter().find(|l| l.quantity < 1) {
        return Err(PricingError::InvalidQuantity {
            product: bad.product,
            quantity: bad.quantity,
        });
    }

    let mut priced = Vec::new();
    let mut total = Money::ZERO;
    for line in merge_lines(lines)? {
        let product = products
            .iter()
            .find(|p| p.id == line.product)
            .ok_or(PricingError::UnknownProduct(line.product))?;
        if !product.is_available {
            return Err(PricingError::Unavailable(product.name.clone()));
        }
        let subtotal = product.price.times(line.quantity)?;
        total = total.checked_add(subtotal)?;
        priced.push(PricedLine {
            product: line.product,
            quantity: line.quantity,
            price: product.price,
            subtotal,
        });
    }

    Ok(PricedOrder {
        lines: priced,
        total,
    })
}
