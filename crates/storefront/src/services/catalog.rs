//! Category and product catalog.
//!
//! Reads are public. Writes require staff.

use tracing::instrument;

use stitch_core::{CategoryId, Principal, ProductId};

use super::ServiceError;
use crate::db::{RepositoryError, Store};
use crate::models::{
    Category, CategoryFilter, CategoryInput, CategoryUpdate, Page, PageRequest, Product,
    ProductFilter, ProductInput, ProductUpdate,
};

/// Deepest category chain walked when checking for cycles.
const MAX_CATEGORY_DEPTH: usize = 64;

pub struct CatalogService<'a> {
    store: &'a dyn Store,
}

fn require_staff(principal: Principal) -> Result<(), ServiceError> {
    if principal.is_staff {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    // -------------------------------------------------------------------------
    // Categories
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `DependencyUnavailable` if the store fails.
    pub async fn list_categories(
        &self,
        filter: &CategoryFilter,
        page: PageRequest,
    ) -> Result<Page<Category>, ServiceError> {
        Ok(self.store.list_categories(filter, page).await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn get_category(&self, id: CategoryId) -> Result<Category, ServiceError> {
        self.store
            .get_category(id)
            .await?
            .ok_or(ServiceError::NotFound("Categories"))
    }

    /// Reject a parent that would put `id` inside its own subtree.
    async fn check_parent(
        &self,
        id: CategoryId,
        parent: Option<CategoryId>,
    ) -> Result<(), ServiceError> {
        let mut cursor = parent;
        for _ in 0..MAX_CATEGORY_DEPTH {
            let Some(current) = cursor else {
                return Ok(());
            };
            if current == id {
                return Err(ServiceError::validation(
                    "a category cannot be its own ancestor",
                ));
            }
            cursor = match self.store.get_category(current).await? {
                Some(category) => category.parent_category,
                // Missing parents are reported by the store on write
                None => return Ok(()),
            };
        }
        Err(ServiceError::validation("category tree is too deep"))
    }

    /// # Errors
    ///
    /// Returns `Forbidden` for non-staff, `Validation` for bad input, a
    /// duplicate name or a missing parent.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(
        &self,
        principal: Principal,
        input: &CategoryInput,
    ) -> Result<Category, ServiceError> {
        require_staff(principal)?;
        input.validate().map_err(ServiceError::Validation)?;
        Ok(self.store.create_category(input).await?)
    }

    /// # Errors
    ///
    /// As for [`Self::create_category`], plus `NotFound` and a cycle check on
    /// the parent.
    #[instrument(skip(self, update))]
    pub async fn update_category(
        &self,
        principal: Principal,
        id: CategoryId,
        update: &CategoryUpdate,
    ) -> Result<Category, ServiceError> {
        require_staff(principal)?;
        let current = self.get_category(id).await?;
        let input = update.apply(&current);
        input.validate().map_err(ServiceError::Validation)?;
        self.check_parent(id, input.parent_category).await?;
        Ok(self.store.update_category(id, &input).await?)
    }

    /// Delete a category. Subcategories and products become top-level or
    /// uncategorized.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` or `NotFound`.
    #[instrument(skip(self))]
    pub async fn delete_category(
        &self,
        principal: Principal,
        id: CategoryId,
    ) -> Result<(), ServiceError> {
        require_staff(principal)?;
        self.store.delete_category(id).await.map_err(|e| match e {
            RepositoryError::NotFound => ServiceError::NotFound("Categories"),
            other => other.into(),
        })
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `DependencyUnavailable` if the store fails.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, ServiceError> {
        Ok(self.store.list_products(filter, page).await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.store
            .get_product(id)
            .await?
            .ok_or(ServiceError::NotFound("Products"))
    }

    /// # Errors
    ///
    /// Returns `Forbidden` for non-staff, `Validation` for bad input, a
    /// duplicate name or a missing category.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        principal: Principal,
        input: &ProductInput,
    ) -> Result<Product, ServiceError> {
        require_staff(principal)?;
        input.validate().map_err(ServiceError::Validation)?;
        Ok(self.store.create_product(input).await?)
    }

    /// # Errors
    ///
    /// As for [`Self::create_product`], plus `NotFound`.
    #[instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        principal: Principal,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, ServiceError> {
        require_staff(principal)?;
        let current = self.get_product(id).await?;
        let input = update.apply(&current);
        input.validate().map_err(ServiceError::Validation)?;
        Ok(self.store.update_product(id, &input).await?)
    }

    /// # Errors
    ///
    /// Returns `Forbidden`, `NotFound`, or `Validation` when an order
    /// references the product.
    #[instrument(skip(self))]
    pub async fn delete_product(
        &self,
        principal: Principal,
        id: ProductId,
    ) -> Result<(), ServiceError> {
        require_staff(principal)?;
        self.store.delete_product(id).await.map_err(|e| match e {
            RepositoryError::NotFound => ServiceError::NotFound("Products"),
            other => other.into(),
        })
    }
}
