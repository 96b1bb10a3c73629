//! Carts and cart lines.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stitch_core::{AccountId, CartId, CartItemId, ProductId};

use super::accounts::CART_BY_ID;
use super::{PgStore, expect_rows, fetch_page, write_error};
use crate::db::{CartStore, RepositoryError};
use crate::models::{Cart, CartItem, CartItemFilter, Page, PageRequest};

macro_rules! cart_item_columns {
    () => {
        "ci.id, ci.cart_id AS cart, ci.product_id AS product, p.name AS product_name,
         p.price AS product_price, ci.quantity, ci.added_at"
    };
}

macro_rules! cart_item_from {
    () => {
        " FROM stitch.cart_item ci JOIN stitch.product p ON p.id = ci.product_id"
    };
}

const CART_ITEM_BY_ID: &str = concat!(
    "SELECT ",
    cart_item_columns!(),
    cart_item_from!(),
    " WHERE ci.id = $1"
);

#[async_trait]
impl CartStore for PgStore {
    async fn create_cart(&self, owner: AccountId) -> Result<Cart, RepositoryError> {
        let id: CartId =
            sqlx::query_scalar("INSERT INTO stitch.cart (owner_id) VALUES ($1) RETURNING id")
                .bind(owner)
                .fetch_one(&self.pool)
                .await
                .map_err(write_error)?;

        self.get_cart(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>, RepositoryError> {
        let cart = sqlx::query_as::<_, Cart>(CART_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(cart)
    }

    async fn cart_for_owner(&self, owner: AccountId) -> Result<Option<Cart>, RepositoryError> {
        let cart = sqlx::query_as::<_, Cart>(
            r"
            SELECT c.id, c.owner_id AS owner, a.username AS user_username,
                   c.created_at, c.updated_at, c.expires_at
            FROM stitch.cart c JOIN stitch.account a ON a.id = c.owner_id
            WHERE c.owner_id = $1
            ",
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cart)
    }

    async fn update_cart(
        &self,
        id: CartId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Cart, RepositoryError> {
        let result = sqlx::query(
            "UPDATE stitch.cart SET expires_at = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        expect_rows(result.rows_affected())?;

        self.get_cart(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn delete_cart(&self, id: CartId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM stitch.cart WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_rows(result.rows_affected())
    }

    async fn add_cart_item(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        // The unique (cart_id, product_id) pair makes concurrent adds of the
        // same product increment one line.
        let id: CartItemId = sqlx::query_scalar(
            r"
            INSERT INTO stitch.cart_item (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = stitch.cart_item.quantity + EXCLUDED.quantity
            RETURNING id
            ",
        )
        .bind(cart)
        .bind(product)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;

        self.get_cart_item(id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        let item = sqlx::query_as::<_, CartItem>(CART_ITEM_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    async fn list_cart_items(
        &self,
        owner: AccountId,
        filter: &CartItemFilter,
        page: PageRequest,
    ) -> Result<Page<CartItem>, RepositoryError> {
        const SQL: &str = concat!(
            "SELECT ",
            cart_item_columns!(),
            ", COUNT(*) OVER () AS total",
            cart_item_from!(),
            r"
            JOIN stitch.cart c ON c.id = ci.cart_id
            WHERE c.owner_id = $1
              AND ($2::text IS NULL OR strpos(lower(p.name), lower($2)) > 0)
              AND ($3::text IS NULL OR strpos(lower(p.name), lower($3)) > 0)
              AND ($4::int IS NULL OR ci.quantity >= $4)
              AND ($5::int IS NULL OR ci.quantity <= $5)
            ORDER BY ci.id
            LIMIT $6 OFFSET $7
            "
        );

        fetch_page(&self.pool, page, |window| {
            sqlx::query(SQL)
                .bind(owner)
                .bind(filter.search.as_deref())
                .bind(filter.product_name.as_deref())
                .bind(filter.quantity_gte)
                .bind(filter.quantity_lte)
                .bind(window.limit)
                .bind(window.offset)
        })
        .await
    }

    async fn set_cart_item_quantity(
        &self,
        id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let result = sqlx::query("UPDATE stitch.cart_item SET quantity = $2 WHERE id = $1")
            .bind(id)
            .bind(quantity)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        expect_rows(result.rows_affected())?;

        self.get_cart_item(id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_cart_item(&self, id: CartItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM stitch.cart_item WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_rows(result.rows_affected())
    }
}
