//! Ownership-based authorization.
//!
//! Every object-level operation asks [`authorize`] whether the principal may
//! act on the target. Rules, first match wins:
//!
//! 1. Staff may do anything.
//! 2. A profile is accessible to its own account.
//! 3. Addresses, carts and orders are accessible to the profile that owns them.
//! 4. Cart items and order items resolve through their cart or order.
//! 5. Everything else (payments) is denied.
//!
//! List and create operations are gated by principal class instead (any
//! authenticated caller, or staff) at the route layer.

use stitch_core::Principal;

use super::ServiceError;
use crate::models::{Address, Cart, CartItem, Order, OrderItem, Payment, Profile};

/// The entity an operation targets, with the parents its ownership runs
/// through.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Profile(&'a Profile),
    Address(&'a Address),
    Cart(&'a Cart),
    CartItem(&'a CartItem, &'a Cart),
    Order(&'a Order),
    OrderItem(&'a OrderItem, &'a Order),
    Payment(&'a Payment),
}

/// The requested operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Update,
    Delete,
}

/// Whether `principal` may perform `action` on `target`.
#[must_use]
pub fn authorize(principal: Principal, target: Target<'_>, _action: Action) -> bool {
    if principal.is_staff {
        return true;
    }

    let me = principal.account_id;
    match target {
        Target::Profile(profile) => profile.id == me,
        Target::Address(address) => address.owner == me,
        Target::Cart(cart) => cart.owner == me,
        Target::Order(order) => order.owner == me,
        Target::CartItem(item, cart) => item.cart == cart.id && cart.owner == me,
        Target::OrderItem(item, order) => item.order == order.id && order.owner == me,
        Target::Payment(_) => false,
    }
}

/// [`authorize`], surfacing a denial as [`ServiceError::Forbidden`].
///
/// # Errors
///
/// Returns `ServiceError::Forbidden` when access is denied.
pub fn ensure(principal: Principal, target: Target<'_>, action: Action) -> Result<(), ServiceError> {
    if authorize(principal, target, action) {
        Ok(())
    } else {
        tracing::debug!(
            account_id = %principal.account_id,
            ?action,
            target = target.kind(),
            "access denied"
        );
        Err(ServiceError::Forbidden)
    }
}

impl Target<'_> {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Profile(_) => "profile",
            Self::Address(_) => "address",
            Self::Cart(_) => "cart",
            Self::CartItem(..) => "cart_item",
            Self::Order(_) => "order",
            Self::OrderItem(..) => "order_item",
            Self::Payment(_) => "payment",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use stitch_core::{
        AccountId, AddressId, CartId, CartItemId, Money, OrderId, OrderItemId, OrderStatus,
        PaymentId, PaymentMethod, PaymentStatus, ProductId,
    };

    use super::*;

    const ALICE: AccountId = AccountId::new(1);
    const BOB: AccountId = AccountId::new(2);

    fn cart(owner: AccountId) -> Cart {
        let now = Utc::now();
        Cart {
            id: CartId::new(owner.as_i32() * 10),
            owner,
            user_username: "someone".to_owned(),
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }

    fn cart_item(cart: CartId) -> CartItem {
        CartItem {
            id: CartItemId::new(5),
            cart,
            product: ProductId::new(1),
            product_name: "Denim".to_owned(),
            product_price: Money::from_cents(1000).unwrap(),
            quantity: 1,
            added_at: Utc::now(),
        }
    }

    fn order(owner: AccountId) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(owner.as_i32() * 100),
            owner,
            user_username: "someone".to_owned(),
            order_date: now,
            total_amount: Money::from_cents(1000).unwrap(),
            order_status: OrderStatus::Pending,
            shipping_address: AddressId::new(1),
            billing_address: AddressId::new(1),
            delivery_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn order_item(order: OrderId) -> OrderItem {
        let now = Utc::now();
        OrderItem {
            id: OrderItemId::new(9),
            order,
            product: ProductId::new(1),
            product_name: "Denim".to_owned(),
            quantity: 1,
            price_at_time_of_order: Money::from_cents(1000).unwrap(),
            subtotal: Money::from_cents(1000).unwrap(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_owner_allowed_other_customer_denied() {
        let alice = Principal::customer(ALICE);
        let bob = Principal::customer(BOB);
        let bobs_cart = cart(BOB);
        let bobs_order = order(BOB);

        assert!(authorize(bob, Target::Cart(&bobs_cart), Action::Read));
        assert!(!authorize(alice, Target::Cart(&bobs_cart), Action::Read));
        assert!(authorize(bob, Target::Order(&bobs_order), Action::Update));
        assert!(!authorize(alice, Target::Order(&bobs_order), Action::Delete));
    }

    #[test]
    fn test_depth_two_chains_resolve_through_parent() {
        let alice = Principal::customer(ALICE);
        let bobs_cart = cart(BOB);
        let item = cart_item(bobs_cart.id);
        assert!(!authorize(alice, Target::CartItem(&item, &bobs_cart), Action::Read));
        assert!(authorize(
            Principal::customer(BOB),
            Target::CartItem(&item, &bobs_cart),
            Action::Read
        ));

        let bobs_order = order(BOB);
        let line = order_item(bobs_order.id);
        assert!(!authorize(alice, Target::OrderItem(&line, &bobs_order), Action::Read));
    }

    #[test]
    fn test_mismatched_parent_is_denied() {
        // An item paired with a cart it does not belong to never grants access
        let alices_cart = cart(ALICE);
        let item = cart_item(CartId::new(999));
        assert!(!authorize(
            Principal::customer(ALICE),
            Target::CartItem(&item, &alices_cart),
            Action::Read
        ));
    }

    #[test]
    fn test_staff_allowed_everywhere() {
        let staff = Principal::staff(AccountId::new(99));
        let now = Utc::now();
        let payment = Payment {
            id: PaymentId::new(1),
            order: OrderId::new(100),
            payment_method: PaymentMethod::GCash,
            amount: Money::from_cents(1000).unwrap(),
            transaction_id: None,
            payment_status: PaymentStatus::Pending,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };

        assert!(authorize(staff, Target::Payment(&payment), Action::Delete));
        assert!(authorize(staff, Target::Cart(&cart(BOB)), Action::Update));
        assert!(!authorize(
            Principal::customer(ALICE),
            Target::Payment(&payment),
            Action::Read
        ));
    }

    #[test]
    fn test_ensure_maps_denial_to_forbidden() {
        let result = ensure(
            Principal::customer(ALICE),
            Target::Order(&order(BOB)),
            Action::Read,
        );
        assert!(matches!(result, Err(ServiceError::Forbidden)));
    }
}
