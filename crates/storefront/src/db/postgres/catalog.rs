//! Categories and products.

use async_trait::async_trait;

use stitch_core::{CategoryId, ProductId};

use super::{PgStore, delete_error, expect_rows, fetch_page, write_error};
use crate::db::{CatalogStore, RepositoryError};
use crate::models::{
    Category, CategoryFilter, CategoryInput, Page, PageRequest, Product, ProductFilter,
    ProductInput,
};

macro_rules! category_columns {
    () => {
        "c.id, c.name, c.description, c.parent_id AS parent_category,
         parent.name AS parent_category_name, c.created_at, c.updated_at"
    };
}

macro_rules! category_from {
    () => {
        " FROM stitch.category c LEFT JOIN stitch.category parent ON parent.id = c.parent_id"
    };
}

macro_rules! product_columns {
    () => {
        "p.id, p.name, p.description, p.price, p.sku, p.stock_quantity,
         p.category_id AS category, c.name AS category_name, p.image_url, p.sizes,
         p.is_available, p.created_at, p.updated_at"
    };
}

macro_rules! product_from {
    () => {
        " FROM stitch.product p LEFT JOIN stitch.category c ON c.id = p.category_id"
    };
}

const CATEGORY_BY_ID: &str = concat!(
    "SELECT ",
    category_columns!(),
    category_from!(),
    " WHERE c.id = $1"
);

const PRODUCT_BY_ID: &str = concat!(
    "SELECT ",
    product_columns!(),
    product_from!(),
    " WHERE p.id = $1"
);

#[async_trait]
impl CatalogStore for PgStore {
    async fn create_category(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        let id: CategoryId = sqlx::query_scalar(
            r"
            INSERT INTO stitch.category (name, description, parent_id)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.parent_category)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;

        self.get_category(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(CATEGORY_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    async fn list_categories(
        &self,
        filter: &CategoryFilter,
        page: PageRequest,
    ) -> Result<Page<Category>, RepositoryError> {
        const SQL: &str = concat!(
            "SELECT ",
            category_columns!(),
            ", COUNT(*) OVER () AS total",
            category_from!(),
            r"
            WHERE ($1::text IS NULL
                   OR strpos(lower(c.name), lower($1)) > 0
                   OR strpos(lower(coalesce(c.description, '')), lower($1)) > 0)
              AND ($2::text IS NULL OR strpos(lower(c.name), lower($2)) > 0)
              AND ($3::text IS NULL OR strpos(lower(c.description), lower($3)) > 0)
              AND ($4::int IS NULL OR c.parent_id = $4)
            ORDER BY c.name, c.id
            LIMIT $5 OFFSET $6
            "
        );

        fetch_page(&self.pool, page, |window| {
            sqlx::query(SQL)
                .bind(filter.search.as_deref())
                .bind(filter.name.as_deref())
                .bind(filter.description.as_deref())
                .bind(filter.parent_category_id)
                .bind(window.limit)
                .bind(window.offset)
        })
        .await
    }

    async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE stitch.category
            SET name = $2, description = $3, parent_id = $4, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.parent_category)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        expect_rows(result.rows_affected())?;

        self.get_category(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        // Children and products are detached by ON DELETE SET NULL
        let result = sqlx::query("DELETE FROM stitch.category WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_rows(result.rows_affected())
    }

    async fn create_product(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO stitch.product (
                name, description, price, sku, stock_quantity, category_id,
                image_url, sizes, is_available
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.sku)
        .bind(input.stock_quantity)
        .bind(input.category)
        .bind(&input.image_url)
        .bind(&input.sizes)
        .bind(input.is_available)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;

        self.get_product(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(PRODUCT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, RepositoryError> {
        const SQL: &str = concat!(
            "SELECT ",
            product_columns!(),
            ", COUNT(*) OVER () AS total",
            product_from!(),
            r"
            WHERE ($1::text IS NULL
                   OR strpos(lower(p.name), lower($1)) > 0
                   OR strpos(lower(coalesce(p.description, '')), lower($1)) > 0
                   OR strpos(lower(coalesce(p.sku, '')), lower($1)) > 0
                   OR strpos(lower(coalesce(c.name, '')), lower($1)) > 0)
              AND ($2::text IS NULL OR strpos(lower(p.name), lower($2)) > 0)
              AND ($3::text IS NULL OR strpos(lower(p.description), lower($3)) > 0)
              AND ($4::numeric IS NULL OR p.price >= $4)
              AND ($5::numeric IS NULL OR p.price <= $5)
              AND ($6::int IS NULL OR p.category_id = $6)
              AND ($7::text IS NULL OR strpos(lower(c.name), lower($7)) > 0)
              AND ($8::boolean IS NULL OR p.is_available = $8)
              AND ($9::int IS NULL OR p.stock_quantity >= $9)
            ORDER BY p.name, p.id
            LIMIT $10 OFFSET $11
            "
        );

        fetch_page(&self.pool, page, |window| {
            sqlx::query(SQL)
                .bind(filter.search.as_deref())
                .bind(filter.name.as_deref())
                .bind(filter.description.as_deref())
                .bind(filter.min_price)
                .bind(filter.max_price)
                .bind(filter.category_id)
                .bind(filter.category_name.as_deref())
                .bind(filter.is_available)
                .bind(filter.stock_quantity_gte)
                .bind(window.limit)
                .bind(window.offset)
        })
        .await
    }

    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE stitch.product
            SET name = $2, description = $3, price = $4, sku = $5, stock_quantity = $6,
                category_id = $7, image_url = $8, sizes = $9, is_available = $10,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.sku)
        .bind(input.stock_quantity)
        .bind(input.category)
        .bind(&input.image_url)
        .bind(&input.sizes)
        .bind(input.is_available)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        expect_rows(result.rows_affected())?;

        self.get_product(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM stitch.product WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| delete_error(e, "product is referenced by an order"))?;
        expect_rows(result.rows_affected())
    }
}
