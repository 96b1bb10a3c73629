//! Orders, order lines and payments.

use async_trait::async_trait;
use sqlx::PgConnection;

use stitch_core::{
    AccountId, AddressId, CartId, OrderId, OrderItemId, OrderStatus, PaymentId, PaymentStatus,
    ProductId,
};

use super::{PgStore, expect_rows, fetch_page, write_error};
use crate::db::{OrderStore, PaymentStore, RepositoryError};
use crate::models::{
    NewOrder, Order, OrderFilter, OrderItem, OrderItemFilter, OrderLine, OrderWrite, Page,
    PageRequest, Payment, PaymentFilter, PaymentWrite, ProductSnapshot, price_lines,
};

macro_rules! order_columns {
    () => {
        "o.id, o.owner_id AS owner, a.username AS user_username, o.order_date,
         o.total_amount, o.order_status, o.shipping_address_id AS shipping_address,
         o.billing_address_id AS billing_address, o.delivery_date, o.created_at, o.updated_at"
    };
}

macro_rules! order_from {
    () => {
        " FROM stitch.customer_order o JOIN stitch.account a ON a.id = o.owner_id"
    };
}

macro_rules! order_item_columns {
    () => {
        "oi.id, oi.order_id AS \"order\", oi.product_id AS product, p.name AS product_name,
         oi.quantity, oi.price_at_time_of_order, oi.subtotal, oi.created_at, oi.updated_at"
    };
}

macro_rules! order_item_from {
    () => {
        " FROM stitch.order_item oi JOIN stitch.product p ON p.id = oi.product_id"
    };
}

macro_rules! payment_columns {
    () => {
        "pm.id, pm.order_id AS \"order\", pm.payment_method, pm.amount, pm.transaction_id,
         pm.payment_status, pm.paid_at, pm.created_at, pm.updated_at"
    };
}

const ORDER_BY_ID: &str = concat!(
    "SELECT ",
    order_columns!(),
    order_from!(),
    " WHERE o.id = $1"
);

const ORDER_ITEM_BY_ID: &str = concat!(
    "SELECT ",
    order_item_columns!(),
    order_item_from!(),
    " WHERE oi.id = $1"
);

const PAYMENT_BY_ID: &str = concat!(
    "SELECT ",
    payment_columns!(),
    " FROM stitch.payment pm WHERE pm.id = $1"
);

/// Price `lines` against locked product rows and insert the order and items.
///
/// Runs on the caller's transaction.
async fn insert_order(
    conn: &mut PgConnection,
    owner: AccountId,
    shipping_address: AddressId,
    billing_address: AddressId,
    lines: &[OrderLine],
) -> Result<OrderId, RepositoryError> {
    let ids: Vec<i32> = lines.iter().map(|l| l.product.as_i32()).collect();
    let snapshots = sqlx::query_as::<_, ProductSnapshot>(
        r"
        SELECT id, name, price, is_available
        FROM stitch.product
        WHERE id = ANY($1)
        FOR SHARE
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let priced =
        price_lines(lines, &snapshots).map_err(|e| RepositoryError::Invalid(e.to_string()))?;

    let order_id: OrderId = sqlx::query_scalar(
        r"
        INSERT INTO stitch.customer_order (
            owner_id, total_amount, order_status, shipping_address_id, billing_address_id
        )
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        ",
    )
    .bind(owner)
    .bind(priced.total)
    .bind(OrderStatus::Pending)
    .bind(shipping_address)
    .bind(billing_address)
    .fetch_one(&mut *conn)
    .await
    .map_err(write_error)?;

    for line in &priced.lines {
        sqlx::query(
            r"
            INSERT INTO stitch.order_item (
                order_id, product_id, quantity, price_at_time_of_order, subtotal
            )
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(order_id)
        .bind(line.product)
        .bind(line.quantity)
        .bind(line.price)
        .bind(line.subtotal)
        .execute(&mut *conn)
        .await
        .map_err(write_error)?;
    }

    Ok(order_id)
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(
        &self,
        owner: AccountId,
        new: &NewOrder,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let id = insert_order(
            &mut tx,
            owner,
            new.shipping_address,
            new.billing_address,
            &new.items,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(order_id = %id, owner = %owner, "Order created");
        self.get_order(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn checkout_cart(
        &self,
        owner: AccountId,
        cart: CartId,
        shipping_address: AddressId,
        billing_address: AddressId,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<CartId> =
            sqlx::query_scalar("SELECT id FROM stitch.cart WHERE id = $1 FOR UPDATE")
                .bind(cart)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let rows: Vec<(ProductId, i32)> = sqlx::query_as(
            "SELECT product_id, quantity FROM stitch.cart_item WHERE cart_id = $1 ORDER BY id",
        )
        .bind(cart)
        .fetch_all(&mut *tx)
        .await?;
        if rows.is_empty() {
            return Err(RepositoryError::Invalid("cart is empty".to_owned()));
        }
        let lines: Vec<OrderLine> = rows
            .into_iter()
            .map(|(product, quantity)| OrderLine { product, quantity })
            .collect();

        let id = insert_order(&mut tx, owner, shipping_address, billing_address, &lines).await?;

        sqlx::query("DELETE FROM stitch.cart_item WHERE cart_id = $1")
            .bind(cart)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE stitch.cart SET updated_at = NOW() WHERE id = $1")
            .bind(cart)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(order_id = %id, cart_id = %cart, "Cart checked out");
        self.get_order(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(ORDER_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    async fn list_orders(
        &self,
        owner: AccountId,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<Page<Order>, RepositoryError> {
        const SQL: &str = concat!(
            "SELECT ",
            order_columns!(),
            ", COUNT(*) OVER () AS total",
            order_from!(),
            r"
            WHERE o.owner_id = $1
              AND ($2::text IS NULL OR o.order_status = $2)
              AND ($3::numeric IS NULL OR o.total_amount >= $3)
              AND ($4::numeric IS NULL OR o.total_amount <= $4)
              AND ($5::timestamptz IS NULL OR o.order_date >= $5)
              AND ($6::timestamptz IS NULL OR o.order_date <= $6)
            ORDER BY o.order_date DESC, o.id DESC
            LIMIT $7 OFFSET $8
            "
        );

        fetch_page(&self.pool, page, |window| {
            sqlx::query(SQL)
                .bind(owner)
                .bind(filter.order_status)
                .bind(filter.total_amount_gte)
                .bind(filter.total_amount_lte)
                .bind(filter.order_date_gte)
                .bind(filter.order_date_lte)
                .bind(window.limit)
                .bind(window.offset)
        })
        .await
    }

    async fn update_order(
        &self,
        id: OrderId,
        expected: OrderStatus,
        write: &OrderWrite,
    ) -> Result<Order, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE stitch.customer_order
            SET order_status = $3, delivery_date = $4, shipping_address_id = $5,
                billing_address_id = $6, updated_at = NOW()
            WHERE id = $1 AND order_status = $2
            ",
        )
        .bind(id)
        .bind(expected)
        .bind(write.order_status)
        .bind(write.delivery_date)
        .bind(write.shipping_address)
        .bind(write.billing_address)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        if result.rows_affected() == 0 {
            let current: Option<OrderStatus> =
                sqlx::query_scalar("SELECT order_status FROM stitch.customer_order WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;
            return Err(match current {
                Some(status) => RepositoryError::Stale(format!("order {id} is now {status}")),
                None => RepositoryError::NotFound,
            });
        }

        self.get_order(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM stitch.customer_order WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_rows(result.rows_affected())
    }

    async fn get_order_item(&self, id: OrderItemId) -> Result<Option<OrderItem>, RepositoryError> {
        let item = sqlx::query_as::<_, OrderItem>(ORDER_ITEM_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    async fn items_for_order(&self, order: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        const SQL: &str = concat!(
            "SELECT ",
            order_item_columns!(),
            order_item_from!(),
            " WHERE oi.order_id = $1 ORDER BY oi.id"
        );

        let items = sqlx::query_as::<_, OrderItem>(SQL)
            .bind(order)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    async fn list_order_items(
        &self,
        owner: AccountId,
        filter: &OrderItemFilter,
        page: PageRequest,
    ) -> Result<Page<OrderItem>, RepositoryError> {
        const SQL: &str = concat!(
            "SELECT ",
            order_item_columns!(),
            ", COUNT(*) OVER () AS total",
            order_item_from!(),
            r"
            JOIN stitch.customer_order o ON o.id = oi.order_id
            WHERE o.owner_id = $1
              AND ($2::text IS NULL OR strpos(lower(p.name), lower($2)) > 0)
              AND ($3::int IS NULL OR oi.order_id = $3)
              AND ($4::text IS NULL OR strpos(lower(p.name), lower($4)) > 0)
              AND ($5::int IS NULL OR oi.quantity >= $5)
              AND ($6::int IS NULL OR oi.quantity <= $6)
            ORDER BY oi.id
            LIMIT $7 OFFSET $8
            "
        );

        fetch_page(&self.pool, page, |window| {
            sqlx::query(SQL)
                .bind(owner)
                .bind(filter.search.as_deref())
                .bind(filter.order_id)
                .bind(filter.product_name.as_deref())
                .bind(filter.quantity_gte)
                .bind(filter.quantity_lte)
                .bind(window.limit)
                .bind(window.offset)
        })
        .await
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn create_payment(
        &self,
        order: OrderId,
        write: &PaymentWrite,
    ) -> Result<Payment, RepositoryError> {
        let id: PaymentId = sqlx::query_scalar(
            r"
            INSERT INTO stitch.payment (
                order_id, payment_method, amount, transaction_id, payment_status, paid_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(order)
        .bind(write.payment_method)
        .bind(write.amount)
        .bind(&write.transaction_id)
        .bind(write.payment_status)
        .bind(write.paid_at)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;

        self.get_payment(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(PAYMENT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn payment_for_order(&self, order: OrderId) -> Result<Option<Payment>, RepositoryError> {
        const SQL: &str = concat!(
            "SELECT ",
            payment_columns!(),
            " FROM stitch.payment pm WHERE pm.order_id = $1"
        );

        let payment = sqlx::query_as::<_, Payment>(SQL)
            .bind(order)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: PageRequest,
    ) -> Result<Page<Payment>, RepositoryError> {
        const SQL: &str = concat!(
            "SELECT ",
            payment_columns!(),
            ", COUNT(*) OVER () AS total",
            r"
            FROM stitch.payment pm
            WHERE ($1::int IS NULL OR pm.order_id = $1)
              AND ($2::text IS NULL OR pm.payment_method = $2)
              AND ($3::text IS NULL OR pm.payment_status = $3)
              AND ($4::numeric IS NULL OR pm.amount >= $4)
              AND ($5::numeric IS NULL OR pm.amount <= $5)
              AND ($6::timestamptz IS NULL OR pm.paid_at >= $6)
              AND ($7::timestamptz IS NULL OR pm.paid_at <= $7)
            ORDER BY pm.id
            LIMIT $8 OFFSET $9
            "
        );

        fetch_page(&self.pool, page, |window| {
            sqlx::query(SQL)
                .bind(filter.order_id)
                .bind(filter.payment_method)
                .bind(filter.payment_status)
                .bind(filter.amount_gte)
                .bind(filter.amount_lte)
                .bind(filter.paid_at_gte)
                .bind(filter.paid_at_lte)
                .bind(window.limit)
                .bind(window.offset)
        })
        .await
    }

    async fn update_payment(
        &self,
        id: PaymentId,
        expected: PaymentStatus,
        write: &PaymentWrite,
    ) -> Result<Payment, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE stitch.payment
            SET payment_method = $3, amount = $4, transaction_id = $5,
                payment_status = $6, paid_at = $7, updated_at = NOW()
            WHERE id = $1 AND payment_status = $2
            ",
        )
        .bind(id)
        .bind(expected)
        .bind(write.payment_method)
        .bind(write.amount)
        .bind(&write.transaction_id)
        .bind(write.payment_status)
        .bind(write.paid_at)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        if result.rows_affected() == 0 {
            let current: Option<PaymentStatus> =
                sqlx::query_scalar("SELECT payment_status FROM stitch.payment WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;
            return Err(match current {
                Some(status) => RepositoryError::Stale(format!("payment {id} is now {status}")),
                None => RepositoryError::NotFound,
            });
        }

        self.get_payment(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn delete_payment(&self, id: PaymentId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM stitch.payment WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_rows(result.rows_affected())
    }
}
