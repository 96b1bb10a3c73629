//! Categories and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stitch_core::{CategoryId, Money, ProductId};

use super::{check_len, contains_ci, double_option, opt_contains_ci, require_text};

// =============================================================================
// Categories
// =============================================================================

/// A node in the category tree.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    #[serde(rename = "category_id")]
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub parent_category: Option<CategoryId>,
    pub parent_category_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Every editable category column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
    pub parent_category: Option<CategoryId>,
}

impl CategoryInput {
    /// Check the name.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message if the name is blank or too long.
    pub fn validate(&self) -> Result<(), String> {
        require_text("name", &self.name, 255)
    }
}

/// PATCH body for a category. `parent_category: null` detaches it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_category: Option<Option<CategoryId>>,
}

impl CategoryUpdate {
    /// Overlay the supplied fields onto the current category.
    #[must_use]
    pub fn apply(&self, current: &Category) -> CategoryInput {
        CategoryInput {
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| current.description.clone()),
            parent_category: self.parent_category.unwrap_or(current.parent_category),
        }
    }
}

/// Category list filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryFilter {
    /// Free text over name and description.
    pub search: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent_category_id: Option<CategoryId>,
}

impl CategoryFilter {
    /// Whether a category passes every supplied predicate.
    #[must_use]
    pub fn matches(&self, c: &Category) -> bool {
        self.search.as_deref().is_none_or(|q| {
            contains_ci(&c.name, q) || opt_contains_ci(c.description.as_deref(), q)
        }) && self.name.as_deref().is_none_or(|q| contains_ci(&c.name, q))
            && self
                .description
                .as_deref()
                .is_none_or(|q| opt_contains_ci(c.description.as_deref(), q))
            && self
                .parent_category_id
                .is_none_or(|p| c.parent_category == Some(p))
    }
}

// =============================================================================
// Products
// =============================================================================

/// A sellable product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    #[serde(rename = "product_id")]
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub sku: Option<String>,
    pub stock_quantity: i32,
    pub category: Option<CategoryId>,
    pub category_name: Option<String>,
    pub image_url: Option<String>,
    pub sizes: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const fn default_available() -> bool {
    true
}

/// Every editable product column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub sku: Option<String>,
    #[serde(default)]
    pub stock_quantity: i32,
    pub category: Option<CategoryId>,
    pub image_url: Option<String>,
    pub sizes: Option<String>,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

impl ProductInput {
    /// Check required fields, lengths and the stock count.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message for the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        require_text("name", &self.name, 255)?;
        if let Some(sku) = &self.sku {
            check_len("sku", sku, 50)?;
        }
        if let Some(url) = &self.image_url {
            check_len("image_url", url, 255)?;
        }
        if let Some(sizes) = &self.sizes {
            check_len("sizes", sizes, 255)?;
        }
        if self.stock_quantity < 0 {
            return Err("stock_quantity cannot be negative".to_owned());
        }
        Ok(())
    }
}

/// PATCH body for a product. `category: null` uncategorizes it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub price: Option<Money>,
    #[serde(default, deserialize_with = "double_option")]
    pub sku: Option<Option<String>>,
    pub stock_quantity: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<CategoryId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub sizes: Option<Option<String>>,
    pub is_available: Option<bool>,
}

impl ProductUpdate {
    /// Overlay the supplied fields onto the current product.
    #[must_use]
    pub fn apply(&self, current: &Product) -> ProductInput {
        ProductInput {
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| current.description.clone()),
            price: self.price.unwrap_or(current.price),
            sku: self.sku.clone().unwrap_or_else(|| current.sku.clone()),
            stock_quantity: self.stock_quantity.unwrap_or(current.stock_quantity),
            category: self.category.unwrap_or(current.category),
            image_url: self
                .image_url
                .clone()
                .unwrap_or_else(|| current.image_url.clone()),
            sizes: self.sizes.clone().unwrap_or_else(|| current.sizes.clone()),
            is_available: self.is_available.unwrap_or(current.is_available),
        }
    }
}

/// Product list filter. All supplied predicates must hold.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Free text over name, description, SKU and category name.
    pub search: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub is_available: Option<bool>,
    pub stock_quantity_gte: Option<i32>,
}

impl ProductFilter {
    /// Whether a product passes every supplied predicate.
    #[must_use]
    pub fn matches(&self, p: &Product) -> bool {
        let price = p.price.amount();
        self.search.as_deref().is_none_or(|q| {
            contains_ci(&p.name, q)
                || opt_contains_ci(p.description.as_deref(), q)
                || opt_contains_ci(p.sku.as_deref(), q)
                || opt_contains_ci(p.category_name.as_deref(), q)
        }) && self.name.as_deref().is_none_or(|q| contains_ci(&p.name, q))
            && self
                .description
                .as_deref()
                .is_none_or(|q| opt_contains_ci(p.description.as_deref(), q))
            && self.min_price.is_none_or(|min| price >= min)
            && self.max_price.is_none_or(|max| price <= max)
            && self.category_id.is_none_or(|c| p.category == Some(c))
            && self
                .category_name
                .as_deref()
                .is_none_or(|q| opt_contains_ci(p.category_name.as_deref(), q))
            && self.is_available.is_none_or(|a| p.is_available == a)
            && self
                .stock_quantity_gte
                .is_none_or(|min| p.stock_quantity >= min)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn denim() -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(1),
            name: "Denim".to_owned(),
            description: Some("Sturdy cotton twill".to_owned()),
            price: Money::from_cents(1400).unwrap(),
            sku: Some("FBD001".to_owned()),
            stock_quantity: 50,
            category: Some(CategoryId::new(1)),
            category_name: Some("Fabrics".to_owned()),
            image_url: None,
            sizes: None,
            is_available: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_product_filter_predicates_are_anded() {
        let p = denim();
        assert!(ProductFilter::default().matches(&p));

        let in_range = ProductFilter {
            min_price: Some(Decimal::new(1400, 2)),
            max_price: Some(Decimal::new(1400, 2)),
            category_name: Some("fab".to_owned()),
            ..ProductFilter::default()
        };
        assert!(in_range.matches(&p));

        let out_of_range = ProductFilter {
            min_price: Some(Decimal::new(1401, 2)),
            category_name: Some("fab".to_owned()),
            ..ProductFilter::default()
        };
        assert!(!out_of_range.matches(&p));
    }

    #[test]
    fn test_product_search_covers_sku_and_category() {
        let p = denim();
        for q in ["fbd0", "FABRICS", "twill", "deni"] {
            let filter = ProductFilter {
                search: Some(q.to_owned()),
                ..ProductFilter::default()
            };
            assert!(filter.matches(&p), "{q}");
        }
    }

    #[test]
    fn test_uncategorized_product_never_matches_category_filters() {
        let mut p = denim();
        p.category = None;
        p.category_name = None;
        let filter = ProductFilter {
            category_id: Some(CategoryId::new(1)),
            ..ProductFilter::default()
        };
        assert!(!filter.matches(&p));
    }

    #[test]
    fn test_product_input_defaults_and_validation() {
        let input: ProductInput =
            serde_json::from_str(r#"{"name": "Linen", "price": "9.50"}"#).unwrap();
        assert!(input.is_available);
        assert_eq!(input.stock_quantity, 0);
        assert!(input.validate().is_ok());

        let negative = ProductInput {
            stock_quantity: -1,
            ..input
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_category_update_can_detach_parent() {
        let now = Utc::now();
        let current = Category {
            id: CategoryId::new(7),
            name: "Cotton Blends".to_owned(),
            description: None,
            parent_category: Some(CategoryId::new(1)),
            parent_category_name: Some("Fabrics".to_owned()),
            created_at: now,
            updated_at: now,
        };
        let detach: CategoryUpdate = serde_json::from_str(r#"{"parent_category": null}"#).unwrap();
        assert_eq!(detach.apply(&current).parent_category, None);

        let rename: CategoryUpdate = serde_json::from_str(r#"{"name": "Blends"}"#).unwrap();
        let applied = rename.apply(&current);
        assert_eq!(applied.name, "Blends");
        assert_eq!(applied.parent_category, Some(CategoryId::new(1)));
    }
}
