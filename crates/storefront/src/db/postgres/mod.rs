//! `PostgreSQL` implementation of the entity store.
//!
//! Queries are runtime `sqlx` queries mapped with `FromRow`. Read models join
//! in their denormalized names (owner username, category name, product name),
//! and list queries carry `COUNT(*) OVER ()` so one round trip returns both the
//! window and the filtered total. Optional filters bind as nullable parameters
//! (`$n::text IS NULL OR ...`).

mod accounts;
mod carts;
mod catalog;
mod orders;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{FromRow, PgPool, Postgres, Row};

use super::{RepositoryError, Store, unique_violation};
use crate::models::{Page, PageRequest};

/// Entity store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool (used by the CLI for migrations and seeding).
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Run a list query and decode one page plus the filtered total.
///
/// `build` must bind `limit` and `offset` from the page it is given. When the
/// requested window is past the end, the query is re-run for its first row so
/// the total is still reported.
async fn fetch_page<'q, T, F>(
    pool: &PgPool,
    page: PageRequest,
    build: F,
) -> Result<Page<T>, RepositoryError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    F: Fn(PageRequest) -> Query<'q, Postgres, PgArguments> + Send + Sync,
{
    let rows = build(page).fetch_all(pool).await?;
    let total = match rows.first() {
        Some(row) => row.try_get::<i64, _>("total")?,
        None if page.offset > 0 => build(PageRequest {
            limit: 1,
            offset: 0,
        })
        .fetch_optional(pool)
        .await?
        .map(|row| row.try_get::<i64, _>("total"))
        .transpose()?
        .unwrap_or(0),
        None => 0,
    };
    let items = rows
        .iter()
        .map(T::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page { items, total })
}

/// Text for a foreign key that rejected an insert or update.
fn missing_reference(constraint: &str) -> &'static str {
    match constraint {
        "address_owner_id_fkey" | "cart_owner_id_fkey" | "customer_order_owner_id_fkey" => {
            "user does not exist"
        }
        "category_parent_id_fkey" => "parent category does not exist",
        "product_category_id_fkey" => "category does not exist",
        "cart_item_cart_id_fkey" => "cart does not exist",
        "cart_item_product_id_fkey" | "order_item_product_id_fkey" => "product does not exist",
        "customer_order_shipping_address_id_fkey" => "shipping address does not exist",
        "customer_order_billing_address_id_fkey" => "billing address does not exist",
        "payment_order_id_fkey" => "order does not exist",
        _ => "referenced record does not exist",
    }
}

/// Map constraint violations on insert or update to repository errors.
pub(super) fn write_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        let constraint = db_err.constraint().unwrap_or_default();
        if db_err.is_unique_violation() {
            return unique_violation(constraint);
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::Invalid(missing_reference(constraint).to_owned());
        }
        if db_err.is_check_violation() {
            return RepositoryError::Invalid(format!("value rejected by {constraint}"));
        }
        if let Some(message) = db_err.code().as_deref().and_then(out_of_range) {
            return RepositoryError::Invalid(message.to_owned());
        }
    }
    RepositoryError::Database(e)
}

/// Text for an arithmetic overflow, by SQLSTATE. `22003` covers both an
/// `INTEGER` sum such as a merged cart quantity and a `NUMERIC(10, 2)` total.
fn out_of_range(code: &str) -> Option<&'static str> {
    match code {
        "22003" => Some("value is out of range"),
        _ => None,
    }
}

/// Map a foreign key violation on delete to `Invalid` with `message`.
pub(super) fn delete_error(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::Invalid(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// `NotFound` unless a statement touched at least one row.
pub(super) const fn expect_rows(affected: u64) -> Result<(), RepositoryError> {
    if affected == 0 {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_is_client_error() {
        assert_eq!(out_of_range("22003"), Some("value is out of range"));
        assert_eq!(out_of_range("23505"), None);
        assert_eq!(out_of_range("08006"), None);
    }

    #[test]
    fn test_missing_reference_text() {
        assert_eq!(
            missing_reference("cart_item_product_id_fkey"),
            "product does not exist"
        );
        assert_eq!(missing_reference("unknown_fkey"), "referenced record does not exist");
    }
}
