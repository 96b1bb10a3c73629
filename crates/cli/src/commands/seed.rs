//! Seed the catalog from a YAML file.
//!
//! Categories (with at most one level of subcategories) and products are
//! upserted by name inside one transaction, so a failed run leaves the
//! catalog untouched. With `--clear` every product and category is deleted
//! first; that fails if any product is referenced by an order.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use sqlx::PgConnection;
use thiserror::Error;
use tracing::{error, info};

use stitch_core::Money;
use stitch_storefront::db;
use stitch_storefront::models::{CategoryInput, ProductInput};

use super::{CommandError, database_url};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Could not read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Top level of the seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

/// A top-level category and its children.
#[derive(Debug, Deserialize)]
pub struct CategorySeed {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub subcategories: Vec<SubcategorySeed>,
}

/// A child category. Children cannot nest further.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubcategorySeed {
    pub name: String,
    pub description: Option<String>,
}

/// A product, linked to its category by name.
#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub sku: Option<String>,
    #[serde(default)]
    pub stock_quantity: i32,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub sizes: Option<String>,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

const fn default_available() -> bool {
    true
}

impl ProductSeed {
    fn input(&self) -> ProductInput {
        ProductInput {
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            sku: self.sku.clone(),
            stock_quantity: self.stock_quantity,
            category: None,
            image_url: self.image_url.clone(),
            sizes: self.sizes.clone(),
            is_available: self.is_available,
        }
    }
}

/// Rows written by one run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories_inserted: usize,
    pub categories_updated: usize,
    pub products_inserted: usize,
    pub products_updated: usize,
}

/// Check a parsed seed file before touching the database.
///
/// Returns one message per problem; an empty list means the file is good.
#[must_use]
pub fn validate(seed: &CatalogSeed) -> Vec<String> {
    let mut errors = Vec::new();
    let mut categories = HashSet::new();

    let all_categories = seed.categories.iter().flat_map(|c| {
        std::iter::once((c.name.as_str(), c.description.as_ref()))
            .chain(c.subcategories.iter().map(|s| (s.name.as_str(), s.description.as_ref())))
    });
    for (name, description) in all_categories {
        let input = CategoryInput {
            name: name.to_owned(),
            description: description.cloned(),
            parent_category: None,
        };
        if let Err(e) = input.validate() {
            errors.push(format!("category '{name}': {e}"));
        }
        if !categories.insert(name) {
            errors.push(format!("category '{name}' is listed twice"));
        }
    }

    let mut products = HashSet::new();
    let mut skus = HashSet::new();
    for product in &seed.products {
        if let Err(e) = product.input().validate() {
            errors.push(format!("product '{}': {e}", product.name));
        }
        if !products.insert(product.name.as_str()) {
            errors.push(format!("product '{}' is listed twice", product.name));
        }
        if let Some(sku) = &product.sku {
            if !skus.insert(sku.as_str()) {
                errors.push(format!("product '{}': SKU '{sku}' is already used", product.name));
            }
        }
        if let Some(category) = &product.category {
            if !categories.contains(category.as_str()) {
                errors.push(format!(
                    "product '{}': unknown category '{category}'",
                    product.name
                ));
            }
        }
    }

    errors
}

/// Load a seed file, validate it and write it in one transaction.
///
/// # Errors
///
/// Returns an error if the file is missing or invalid, or a database
/// operation fails (in which case nothing is written).
pub async fn catalog(file_path: &str, clear_existing: bool) -> Result<SeedSummary, SeedError> {
    let database_url = database_url()?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_owned()));
    }

    info!(path = %file_path, "Loading catalog from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;
    info!(
        categories = seed.categories.len(),
        products = seed.products.len(),
        "Parsed catalog"
    );

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors.len()));
    }

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let mut tx = pool.begin().await?;
    if clear_existing {
        info!("Clearing existing catalog");
        sqlx::query("DELETE FROM stitch.product").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM stitch.category").execute(&mut *tx).await?;
    }
    let summary = write_catalog(&mut tx, &seed).await?;
    tx.commit().await?;

    info!("Seeding complete!");
    info!(
        "  Categories: {} inserted, {} updated",
        summary.categories_inserted, summary.categories_updated
    );
    info!(
        "  Products: {} inserted, {} updated",
        summary.products_inserted, summary.products_updated
    );
    Ok(summary)
}

async fn write_catalog(
    conn: &mut PgConnection,
    seed: &CatalogSeed,
) -> Result<SeedSummary, sqlx::Error> {
    let mut summary = SeedSummary::default();
    let mut ids: HashMap<&str, i32> = HashMap::new();

    for category in &seed.categories {
        let (id, inserted) =
            upsert_category(conn, &category.name, category.description.as_deref(), None).await?;
        summary.count_category(inserted);
        ids.insert(&category.name, id);

        for sub in &category.subcategories {
            let (sub_id, inserted) =
                upsert_category(conn, &sub.name, sub.description.as_deref(), Some(id)).await?;
            summary.count_category(inserted);
            ids.insert(&sub.name, sub_id);
        }
    }

    for product in &seed.products {
        let category_id = product
            .category
            .as_deref()
            .and_then(|name| ids.get(name).copied());
        let inserted = upsert_product(conn, product, category_id).await?;
        if inserted {
            summary.products_inserted += 1;
        } else {
            summary.products_updated += 1;
        }
    }

    Ok(summary)
}

impl SeedSummary {
    fn count_category(&mut self, inserted: bool) {
        if inserted {
            self.categories_inserted += 1;
        } else {
            self.categories_updated += 1;
        }
    }
}

/// Insert or update a category by name. Returns its id and whether it is new.
async fn upsert_category(
    conn: &mut PgConnection,
    name: &str,
    description: Option<&str>,
    parent_id: Option<i32>,
) -> Result<(i32, bool), sqlx::Error> {
    sqlx::query_as(
        r"
        INSERT INTO stitch.category (name, description, parent_id)
        VALUES ($1, $2, $3)
        ON CONFLICT ON CONSTRAINT category_name_key DO UPDATE
        SET description = EXCLUDED.description,
            parent_id = EXCLUDED.parent_id,
            updated_at = NOW()
        RETURNING id, (xmax = 0) AS inserted
        ",
    )
    .bind(name)
    .bind(description)
    .bind(parent_id)
    .fetch_one(&mut *conn)
    .await
}

/// Insert or update a product by name. Returns whether it is new.
async fn upsert_product(
    conn: &mut PgConnection,
    product: &ProductSeed,
    category_id: Option<i32>,
) -> Result<bool, sqlx::Error> {
    let (inserted,): (bool,) = sqlx::query_as(
        r"
        INSERT INTO stitch.product
            (name, description, price, sku, stock_quantity, category_id,
             image_url, sizes, is_available)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT ON CONSTRAINT product_name_key DO UPDATE
        SET description = EXCLUDED.description,
            price = EXCLUDED.price,
            sku = EXCLUDED.sku,
            stock_quantity = EXCLUDED.stock_quantity,
            category_id = EXCLUDED.category_id,
            image_url = EXCLUDED.image_url,
            sizes = EXCLUDED.sizes,
            is_available = EXCLUDED.is_available,
            updated_at = NOW()
        RETURNING (xmax = 0) AS inserted
        ",
    )
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price.amount())
    .bind(&product.sku)
    .bind(product.stock_quantity)
    .bind(category_id)
    .bind(&product.image_url)
    .bind(&product.sizes)
    .bind(product.is_available)
    .fetch_one(&mut *conn)
    .await?;
    Ok(inserted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_catalog_is_valid() {
        let seed: CatalogSeed =
            serde_yaml::from_str(include_str!("../../seed/catalog.yaml")).unwrap();
        assert!(validate(&seed).is_empty(), "{:?}", validate(&seed));

        let fabrics = seed
            .categories
            .iter()
            .find(|c| c.name == "Fabrics")
            .unwrap();
        assert_eq!(fabrics.subcategories.first().unwrap().name, "Cotton Blends");

        let denim = seed.products.iter().find(|p| p.name == "Denim").unwrap();
        assert_eq!(denim.price, Money::from_cents(1400).unwrap());
        assert!(denim.is_available);
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let seed: CatalogSeed = serde_yaml::from_str(
            r#"
categories:
  - name: "Fabrics"
  - name: "Fabrics"
products:
  - name: "Denim"
    price: "14.00"
    category: "Denim Things"
  - name: "Lace"
    price: "3.00"
    stock_quantity: -1
"#,
        )
        .unwrap();

        let errors = validate(&seed);
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("listed twice")));
        assert!(errors.iter().any(|e| e.contains("unknown category")));
        assert!(errors.iter().any(|e| e.contains("stock_quantity")));
    }

    #[test]
    fn test_shared_sku_is_reported() {
        let seed: CatalogSeed = serde_yaml::from_str(
            r#"
products:
  - name: "Denim"
    price: "14.00"
    sku: "FBD001"
  - name: "Linen"
    price: "9.50"
    sku: "FBD001"
  - name: "Lace"
    price: "3.00"
"#,
        )
        .unwrap();

        let errors = validate(&seed);
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("Linen") && e.contains("FBD001")));
    }

    #[test]
    fn test_subcategories_cannot_nest() {
        let nested = serde_yaml::from_str::<CatalogSeed>(
            r#"
categories:
  - name: "Fabrics"
    subcategories:
      - name: "Cotton Blends"
        subcategories:
          - name: "Too Deep"
"#,
        );
        assert!(nested.is_err());
    }

    #[test]
    fn test_bad_price_is_rejected_on_parse() {
        let seed = serde_yaml::from_str::<CatalogSeed>(
            r#"
products:
  - name: "Lace"
    price: "3.005"
"#,
        );
        assert!(seed.is_err());
    }
}
