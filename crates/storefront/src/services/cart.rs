//! Shopping carts.
//!
//! Every profile gets a cart at registration. [`CartService::get_or_create_cart`]
//! recreates one if it was deleted, relying on the store's one-cart-per-owner
//! constraint when two requests race.

use serde::Deserialize;
use tracing::instrument;

use stitch_core::{CartId, CartItemId, Principal, ProductId};

use super::access::{Action, Target, ensure};
use super::ServiceError;
use crate::db::{RepositoryError, Store};
use crate::models::{Cart, CartItem, CartItemFilter, CartUpdate, Page, PageRequest};

/// Attempts at resolving a concurrent first cart creation.
const CART_CREATE_ATTEMPTS: usize = 3;

const fn default_quantity() -> i32 {
    1
}

/// Body for adding a product to the caller's cart.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AddCartItem {
    pub product: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

/// Body for changing a cart line.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CartItemQuantity {
    pub quantity: i32,
}

pub struct CartService<'a> {
    store: &'a dyn Store,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// The caller's cart, created if missing.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the caller has no profile.
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, principal: Principal) -> Result<Cart, ServiceError> {
        let owner = principal.account_id;
        for _ in 0..CART_CREATE_ATTEMPTS {
            if let Some(cart) = self.store.cart_for_owner(owner).await? {
                return Ok(cart);
            }
            match self.store.create_cart(owner).await {
                Ok(cart) => {
                    tracing::info!(cart_id = %cart.id, "cart created");
                    return Ok(cart);
                }
                // Another request created it first; read it back
                Err(RepositoryError::Conflict(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Err(ServiceError::DependencyUnavailable(
            "cart creation kept conflicting".to_owned(),
        ))
    }

    /// The caller's cart as a list (zero or one entries).
    ///
    /// # Errors
    ///
    /// Returns `DependencyUnavailable` if the store fails.
    pub async fn list_carts(
        &self,
        principal: Principal,
        page: PageRequest,
    ) -> Result<Page<Cart>, ServiceError> {
        let carts: Vec<Cart> = self
            .store
            .cart_for_owner(principal.account_id)
            .await?
            .into_iter()
            .collect();
        Ok(page.slice(carts))
    }

    /// Create the caller's cart explicitly.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the caller already has a cart or no profile.
    pub async fn create_cart(&self, principal: Principal) -> Result<Cart, ServiceError> {
        Ok(self.store.create_cart(principal.account_id).await?)
    }

    async fn load_cart(&self, id: CartId) -> Result<Cart, ServiceError> {
        self.store
            .get_cart(id)
            .await?
            .ok_or(ServiceError::NotFound("ShoppingCarts"))
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    pub async fn get_cart(&self, principal: Principal, id: CartId) -> Result<Cart, ServiceError> {
        let cart = self.load_cart(id).await?;
        ensure(principal, Target::Cart(&cart), Action::Read)?;
        Ok(cart)
    }

    /// Change a cart's expiry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    pub async fn update_cart(
        &self,
        principal: Principal,
        id: CartId,
        update: &CartUpdate,
    ) -> Result<Cart, ServiceError> {
        let cart = self.load_cart(id).await?;
        ensure(principal, Target::Cart(&cart), Action::Update)?;
        let expires_at = update.expires_at.unwrap_or(cart.expires_at);
        Ok(self.store.update_cart(id, expires_at).await?)
    }

    /// Delete a cart and its lines.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    pub async fn delete_cart(&self, principal: Principal, id: CartId) -> Result<(), ServiceError> {
        let cart = self.load_cart(id).await?;
        ensure(principal, Target::Cart(&cart), Action::Delete)?;
        Ok(self.store.delete_cart(id).await?)
    }

    // -------------------------------------------------------------------------
    // Lines
    // -------------------------------------------------------------------------

    /// Lines in the caller's cart.
    ///
    /// # Errors
    ///
    /// Returns `DependencyUnavailable` if the store fails.
    pub async fn list_items(
        &self,
        principal: Principal,
        filter: &CartItemFilter,
        page: PageRequest,
    ) -> Result<Page<CartItem>, ServiceError> {
        Ok(self
            .store
            .list_cart_items(principal.account_id, filter, page)
            .await?)
    }

    /// Add `quantity` of a product to the caller's cart, merging with an
    /// existing line for the same product.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a quantity below one or an unknown or
    /// unavailable product.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        principal: Principal,
        add: AddCartItem,
    ) -> Result<CartItem, ServiceError> {
        if add.quantity < 1 {
            return Err(ServiceError::validation("quantity must be at least 1"));
        }
        let product = self
            .store
            .get_product(add.product)
            .await?
            .ok_or_else(|| ServiceError::validation("product does not exist"))?;
        if !product.is_available {
            return Err(ServiceError::Validation(format!(
                "product {:?} is not available",
                product.name
            )));
        }

        let cart = self.get_or_create_cart(principal).await?;
        Ok(self
            .store
            .add_cart_item(cart.id, product.id, add.quantity)
            .await?)
    }

    /// Load a line with the cart its ownership runs through.
    async fn load_item(&self, id: CartItemId) -> Result<(CartItem, Cart), ServiceError> {
        let item = self
            .store
            .get_cart_item(id)
            .await?
            .ok_or(ServiceError::NotFound("CartItems"))?;
        let cart = self.load_cart(item.cart).await?;
        Ok((item, cart))
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    pub async fn get_item(
        &self,
        principal: Principal,
        id: CartItemId,
    ) -> Result<CartItem, ServiceError> {
        let (item, cart) = self.load_item(id).await?;
        ensure(principal, Target::CartItem(&item, &cart), Action::Read)?;
        Ok(item)
    }

    /// Set a line's quantity. Zero or less removes the line and returns
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        principal: Principal,
        id: CartItemId,
        quantity: i32,
    ) -> Result<Option<CartItem>, ServiceError> {
        let (item, cart) = self.load_item(id).await?;
        ensure(principal, Target::CartItem(&item, &cart), Action::Update)?;

        if quantity <= 0 {
            self.store.delete_cart_item(id).await?;
            return Ok(None);
        }
        Ok(Some(self.store.set_cart_item_quantity(id, quantity).await?))
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    pub async fn remove_item(
        &self,
        principal: Principal,
        id: CartItemId,
    ) -> Result<(), ServiceError> {
        let (item, cart) = self.load_item(id).await?;
        ensure(principal, Target::CartItem(&item, &cart), Action::Delete)?;
        Ok(self.store.delete_cart_item(id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::CatalogStore;
    use crate::models::ProductUpdate;
    use crate::services::fixtures::Fixture;

    #[tokio::test]
    async fn test_add_twice_increments_one_line() {
        let fx = Fixture::new();
        let alice = fx.customer("alice").await;
        let denim = fx.product("Denim", 1000).await;
        let carts = fx.carts();

        carts
            .add_item(alice, AddCartItem { product: denim.id, quantity: 2 })
            .await
            .unwrap();
        let line = carts
            .add_item(alice, AddCartItem { product: denim.id, quantity: 3 })
            .await
            .unwrap();
        assert_eq!(line.quantity, 5);

        let items = carts
            .list_items(alice, &CartItemFilter::default(), PageRequest::ALL)
            .await
            .unwrap();
        assert_eq!(items.total, 1);
        assert_eq!(items.items[0].product_name, "Denim");
    }

    #[tokio::test]
    async fn test_add_rejects_bad_quantity_and_unavailable_product() {
        let fx = Fixture::new();
        let alice = fx.customer("alice").await;
        let denim = fx.product("Denim", 1000).await;
        let carts = fx.carts();

        assert!(matches!(
            carts
                .add_item(alice, AddCartItem { product: denim.id, quantity: 0 })
                .await,
            Err(ServiceError::Validation(_))
        ));

        let hide = ProductUpdate {
            is_available: Some(false),
            ..ProductUpdate::default()
        };
        fx.store
            .update_product(denim.id, &hide.apply(&denim))
            .await
            .unwrap();
        assert!(matches!(
            carts
                .add_item(alice, AddCartItem { product: denim.id, quantity: 1 })
                .await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            carts
                .add_item(alice, AddCartItem { product: ProductId::new(404), quantity: 1 })
                .await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_get_or_create_recovers_deleted_cart() {
        let fx = Fixture::new();
        let alice = fx.customer("alice").await;
        let carts = fx.carts();

        let original = carts.get_or_create_cart(alice).await.unwrap();
        assert_eq!(carts.get_or_create_cart(alice).await.unwrap().id, original.id);

        carts.delete_cart(alice, original.id).await.unwrap();
        let recreated = carts.get_or_create_cart(alice).await.unwrap();
        assert_ne!(recreated.id, original.id);
        assert_eq!(recreated.owner, alice.account_id);
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_yields_one_cart() {
        let fx = Fixture::new();
        let alice = fx.customer("alice").await;
        let carts = fx.carts();
        let existing = carts.get_or_create_cart(alice).await.unwrap();
        carts.delete_cart(alice, existing.id).await.unwrap();

        let (a, b) = tokio::join!(
            carts.get_or_create_cart(alice),
            carts.get_or_create_cart(alice)
        );
        assert_eq!(a.unwrap().id, b.unwrap().id);
    }

    #[tokio::test]
    async fn test_second_explicit_cart_is_rejected() {
        let fx = Fixture::new();
        let alice = fx.customer("alice").await;
        assert!(matches!(
            fx.carts().create_cart(alice).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_other_customers_lines_are_forbidden() {
        let fx = Fixture::new();
        let alice = fx.customer("alice").await;
        let bob = fx.customer("bob").await;
        let staff = fx.staff("admin").await;
        let denim = fx.product("Denim", 1000).await;
        let carts = fx.carts();

        let line = carts
            .add_item(bob, AddCartItem { product: denim.id, quantity: 1 })
            .await
            .unwrap();
        let bobs_cart = carts.get_or_create_cart(bob).await.unwrap();

        assert!(matches!(
            carts.get_item(alice, line.id).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            carts.get_cart(alice, bobs_cart.id).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            carts.remove_item(alice, line.id).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(carts.get_item(staff, line.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_merged_quantity_overflow_is_validation_error() {
        let fx = Fixture::new();
        let alice = fx.customer("alice").await;
        let denim = fx.product("Denim", 1000).await;
        let carts = fx.carts();

        carts
            .add_item(alice, AddCartItem { product: denim.id, quantity: i32::MAX })
            .await
            .unwrap();
        assert!(matches!(
            carts
                .add_item(alice, AddCartItem { product: denim.id, quantity: 1 })
                .await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_quantity_removes_line() {
        let fx = Fixture::new();
        let alice = fx.customer("alice").await;
        let denim = fx.product("Denim", 1000).await;
        let carts = fx.carts();

        let line = carts
            .add_item(alice, AddCartItem { product: denim.id, quantity: 2 })
            .await
            .unwrap();
        let updated = carts.update_quantity(alice, line.id, 7).await.unwrap();
        assert_eq!(updated.unwrap().quantity, 7);

        assert!(carts.update_quantity(alice, line.id, 0).await.unwrap().is_none());
        assert!(matches!(
            carts.get_item(alice, line.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
