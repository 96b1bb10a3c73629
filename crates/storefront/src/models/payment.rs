//! Order payments.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stitch_core::{Money, OrderId, PaymentId, PaymentMethod, PaymentStatus};

use super::{check_len, double_option};

/// The single payment attached to an order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    #[serde(rename = "payment_id")]
    pub id: PaymentId,
    pub order: OrderId,
    pub payment_method: PaymentMethod,
    pub amount: Money,
    pub transaction_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body for attaching a payment to an order.
///
/// A missing `amount` defaults to the order total.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInput {
    pub order: OrderId,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub amount: Option<Money>,
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

/// PATCH body for a payment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentUpdate {
    pub payment_method: Option<PaymentMethod>,
    pub amount: Option<Money>,
    #[serde(default, deserialize_with = "double_option")]
    pub transaction_id: Option<Option<String>>,
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub paid_at: Option<Option<DateTime<Utc>>>,
}

/// The full set of payment columns written on insert or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentWrite {
    pub payment_method: PaymentMethod,
    pub amount: Money,
    pub transaction_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentWrite {
    /// Check the transaction id length.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message if it is too long.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(tx) = &self.transaction_id {
            check_len("transaction_id", tx, 255)?;
        }
        Ok(())
    }
}

/// Staff payment list filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentFilter {
    pub order_id: Option<OrderId>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
    pub amount_gte: Option<Decimal>,
    pub amount_lte: Option<Decimal>,
    pub paid_at_gte: Option<DateTime<Utc>>,
    pub paid_at_lte: Option<DateTime<Utc>>,
}

impl PaymentFilter {
    /// Whether a payment passes every supplied predicate.
    #[must_use]
    pub fn matches(&self, p: &Payment) -> bool {
        let amount = p.amount.amount();
        self.order_id.is_none_or(|o| p.order == o)
            && self.payment_method.is_none_or(|m| p.payment_method == m)
            && self.payment_status.is_none_or(|s| p.payment_status == s)
            && self.amount_gte.is_none_or(|min| amount >= min)
            && self.amount_lte.is_none_or(|max| amount <= max)
            && self
                .paid_at_gte
                .is_none_or(|t| p.paid_at.is_some_and(|paid| paid >= t))
            && self
                .paid_at_lte
                .is_none_or(|t| p.paid_at.is_some_and(|paid| paid <= t))
    }
}
