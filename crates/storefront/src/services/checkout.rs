//! Orders, order items and payments.
//!
//! Order creation prices every line from a product snapshot taken inside the
//! store transaction, so later catalog price changes never touch placed
//! orders. Status writes go through the machines in `stitch_core` and are
//! compare-and-set on the status they were validated against.

use chrono::Utc;
use tracing::instrument;

use stitch_core::{
    AddressId, OrderId, OrderItemId, OrderStatus, PaymentId, PaymentStatus, Principal,
};

use super::access::{Action, Target, ensure};
use super::ServiceError;
use crate::db::{RepositoryError, Store};
use crate::models::{
    Checkout, NewOrder, Order, OrderChanges, OrderDetail, OrderFilter, OrderItem,
    OrderItemFilter, OrderWrite, Page, PageRequest, Payment, PaymentFilter, PaymentInput,
    PaymentUpdate, PaymentWrite,
};

pub struct CheckoutService<'a> {
    store: &'a dyn Store,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    async fn detail(&self, order: Order) -> Result<OrderDetail, ServiceError> {
        let items = self.store.items_for_order(order.id).await?;
        let payment_details = self.store.payment_for_order(order.id).await?;
        Ok(OrderDetail {
            order,
            items,
            payment_details,
        })
    }

    /// Orders may name any existing address. Note when they belong to
    /// someone else.
    async fn note_foreign_addresses(
        &self,
        principal: Principal,
        addresses: [AddressId; 2],
    ) -> Result<(), ServiceError> {
        for id in addresses {
            let Some(address) = self.store.get_address(id).await? else {
                continue;
            };
            if address.owner != principal.account_id {
                tracing::warn!(
                    account_id = %principal.account_id,
                    address_id = %id,
                    address_owner = %address.owner,
                    "order uses another user's address"
                );
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// Place an order for explicit lines.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty order, a quantity below one, an
    /// unknown or unavailable product, or a missing address.
    #[instrument(skip(self, new), fields(lines = new.items.len()))]
    pub async fn create_order(
        &self,
        principal: Principal,
        new: &NewOrder,
    ) -> Result<OrderDetail, ServiceError> {
        self.note_foreign_addresses(principal, [new.shipping_address, new.billing_address])
            .await?;
        let order = self.store.create_order(principal.account_id, new).await?;
        self.detail(order).await
    }

    /// Turn the caller's cart into an order and empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` without a cart, `Validation` for an empty cart or
    /// any reason [`Self::create_order`] rejects.
    #[instrument(skip(self))]
    pub async fn checkout_from_cart(
        &self,
        principal: Principal,
        checkout: Checkout,
    ) -> Result<OrderDetail, ServiceError> {
        let cart = self
            .store
            .cart_for_owner(principal.account_id)
            .await?
            .ok_or(ServiceError::NotFound("ShoppingCarts"))?;
        self.note_foreign_addresses(
            principal,
            [checkout.shipping_address, checkout.billing_address],
        )
        .await?;

        let order = self
            .store
            .checkout_cart(
                principal.account_id,
                cart.id,
                checkout.shipping_address,
                checkout.billing_address,
            )
            .await?;
        self.detail(order).await
    }

    /// The caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DependencyUnavailable` if the store fails.
    pub async fn list_orders(
        &self,
        principal: Principal,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<Page<OrderDetail>, ServiceError> {
        let orders = self
            .store
            .list_orders(principal.account_id, filter, page)
            .await?;

        let mut details = Vec::with_capacity(orders.items.len());
        for order in orders.items {
            details.push(self.detail(order).await?);
        }
        Ok(Page {
            items: details,
            total: orders.total,
        })
    }

    async fn load_order(&self, id: OrderId) -> Result<Order, ServiceError> {
        self.store
            .get_order(id)
            .await?
            .ok_or(ServiceError::NotFound("Orders"))
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    pub async fn get_order(
        &self,
        principal: Principal,
        id: OrderId,
    ) -> Result<OrderDetail, ServiceError> {
        let order = self.load_order(id).await?;
        ensure(principal, Target::Order(&order), Action::Read)?;
        self.detail(order).await
    }

    /// Change an order's status, delivery date or addresses.
    ///
    /// Addresses are frozen once the order is closed. Moving to `Delivered`
    /// stamps the delivery date when none is given.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Forbidden`, `Validation`, or `InvalidTransition`
    /// for a move the status machine forbids or a concurrent status change.
    #[instrument(skip(self, changes))]
    pub async fn update_order(
        &self,
        principal: Principal,
        id: OrderId,
        changes: &OrderChanges,
    ) -> Result<OrderDetail, ServiceError> {
        let current = self.load_order(id).await?;
        ensure(principal, Target::Order(&current), Action::Update)?;

        let status = match changes.order_status {
            Some(next) if next != current.order_status => {
                current.order_status.transition_to(next)?
            }
            _ => current.order_status,
        };

        let shipping_address = changes.shipping_address.unwrap_or(current.shipping_address);
        let billing_address = changes.billing_address.unwrap_or(current.billing_address);
        let readdressed = shipping_address != current.shipping_address
            || billing_address != current.billing_address;
        if readdressed && current.order_status.is_closed() {
            return Err(ServiceError::Validation(format!(
                "addresses of a {} order cannot change",
                current.order_status
            )));
        }
        if readdressed {
            self.note_foreign_addresses(principal, [shipping_address, billing_address])
                .await?;
        }

        let mut delivery_date = changes.delivery_date.unwrap_or(current.delivery_date);
        if status == OrderStatus::Delivered
            && current.order_status != OrderStatus::Delivered
            && delivery_date.is_none()
        {
            delivery_date = Some(Utc::now());
        }

        let write = OrderWrite {
            order_status: status,
            delivery_date,
            shipping_address,
            billing_address,
        };
        let order = self
            .store
            .update_order(id, current.order_status, &write)
            .await?;

        if status != current.order_status {
            tracing::info!(
                order_id = %id,
                from = %current.order_status,
                to = %status,
                "order status changed"
            );
        }
        self.detail(order).await
    }

    /// Delete an order with its items and payment. Stock levels are untouched.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, principal: Principal, id: OrderId) -> Result<(), ServiceError> {
        let order = self.load_order(id).await?;
        ensure(principal, Target::Order(&order), Action::Delete)?;
        Ok(self.store.delete_order(id).await?)
    }

    // -------------------------------------------------------------------------
    // Order items
    // -------------------------------------------------------------------------

    /// Lines of the caller's orders.
    ///
    /// # Errors
    ///
    /// Returns `DependencyUnavailable` if the store fails.
    pub async fn list_order_items(
        &self,
        principal: Principal,
        filter: &OrderItemFilter,
        page: PageRequest,
    ) -> Result<Page<OrderItem>, ServiceError> {
        Ok(self
            .store
            .list_order_items(principal.account_id, filter, page)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    pub async fn get_order_item(
        &self,
        principal: Principal,
        id: OrderItemId,
    ) -> Result<OrderItem, ServiceError> {
        let item = self
            .store
            .get_order_item(id)
            .await?
            .ok_or(ServiceError::NotFound("OrderItems"))?;
        let order = self.load_order(item.order).await?;
        ensure(principal, Target::OrderItem(&item, &order), Action::Read)?;
        Ok(item)
    }

    // -------------------------------------------------------------------------
    // Payments
    // -------------------------------------------------------------------------

    /// All payments (staff only).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-staff callers.
    pub async fn list_payments(
        &self,
        principal: Principal,
        filter: &PaymentFilter,
        page: PageRequest,
    ) -> Result<Page<Payment>, ServiceError> {
        if !principal.is_staff {
            return Err(ServiceError::Forbidden);
        }
        Ok(self.store.list_payments(filter, page).await?)
    }

    /// Record the payment for an order (staff only).
    ///
    /// The amount defaults to the order total. A `Completed` payment gets a
    /// paid-at time if none is given.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`, `Validation` for an unknown order, or
    /// `DuplicatePayment` if the order already has one.
    #[instrument(skip(self, input), fields(order_id = %input.order))]
    pub async fn attach_payment(
        &self,
        principal: Principal,
        input: &PaymentInput,
    ) -> Result<Payment, ServiceError> {
        if !principal.is_staff {
            return Err(ServiceError::Forbidden);
        }
        let order = self
            .store
            .get_order(input.order)
            .await?
            .ok_or_else(|| ServiceError::validation("order does not exist"))?;

        let paid_at = match (input.payment_status, input.paid_at) {
            (PaymentStatus::Completed, None) => Some(Utc::now()),
            (_, paid_at) => paid_at,
        };
        let write = PaymentWrite {
            payment_method: input.payment_method,
            amount: input.amount.unwrap_or(order.total_amount),
            transaction_id: input.transaction_id.clone(),
            payment_status: input.payment_status,
            paid_at,
        };
        write.validate().map_err(ServiceError::Validation)?;

        let payment = self
            .store
            .create_payment(order.id, &write)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => ServiceError::DuplicatePayment,
                other => other.into(),
            })?;
        tracing::info!(payment_id = %payment.id, "payment attached");
        Ok(payment)
    }

    async fn load_payment(&self, id: PaymentId) -> Result<Payment, ServiceError> {
        self.store
            .get_payment(id)
            .await?
            .ok_or(ServiceError::NotFound("Payments"))
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    pub async fn get_payment(
        &self,
        principal: Principal,
        id: PaymentId,
    ) -> Result<Payment, ServiceError> {
        let payment = self.load_payment(id).await?;
        ensure(principal, Target::Payment(&payment), Action::Read)?;
        Ok(payment)
    }

    /// Change a payment's method, amount, transaction id or status.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Forbidden`, `Validation`, or `InvalidTransition`
    /// for a move the payment machine forbids or a concurrent status change.
    #[instrument(skip(self, update))]
    pub async fn update_payment(
        &self,
        principal: Principal,
        id: PaymentId,
        update: &PaymentUpdate,
    ) -> Result<Payment, ServiceError> {
        let current = self.load_payment(id).await?;
        ensure(principal, Target::Payment(&current), Action::Update)?;

        let status = match update.payment_status {
            Some(next) if next != current.payment_status => {
                current.payment_status.transition_to(next)?
            }
            _ => current.payment_status,
        };
        let mut paid_at = update.paid_at.unwrap_or(current.paid_at);
        if status == PaymentStatus::Completed
            && current.payment_status != PaymentStatus::Completed
            && paid_at.is_none()
        {
            paid_at = Some(Utc::now());
        }

        let write = PaymentWrite {
            payment_method: update.payment_method.unwrap_or(current.payment_method),
            amount: update.amount.unwrap_or(current.amount),
            transaction_id: update
                .transaction_id
                .clone()
                .unwrap_or_else(|| current.transaction_id.clone()),
            payment_status: status,
            paid_at,
        };
        write.validate().map_err(ServiceError::Validation)?;

        Ok(self
            .store
            .update_payment(id, current.payment_status, &write)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    #[instrument(skip(self))]
    pub async fn delete_payment(
        &self,
        principal: Principal,
        id: PaymentId,
    ) -> Result<(), ServiceError> {
        let payment = self.load_payment(id).await?;
        ensure(principal, Target::Payment(&payment), Action::Delete)?;
        Ok(self.store.delete_payment(id).await?)
    }
}
