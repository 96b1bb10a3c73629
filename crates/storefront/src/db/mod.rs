//! Entity store for the storefront.
//!
//! # Schema: `stitch`
//!
//! - `account` - Login identities (username, email, password hash, staff flag)
//! - `profile` - Personal details, keyed by the account id
//! - `address` - Saved addresses, cascade-deleted with their profile
//! - `category` - Self-referential category tree
//! - `product` - Catalog, with an optional category
//! - `cart` / `cart_item` - One cart per profile, one line per product
//! - `customer_order` / `order_item` - Orders with price snapshots
//! - `payment` - One payment per order
//!
//! # Implementations
//!
//! - [`PgStore`] - `PostgreSQL` via runtime `sqlx` queries
//! - [`MemoryStore`] - In-process tables with the same constraints, for tests
//!   and local development
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p stitch-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use stitch_core::{
    AccountId, AddressId, CartId, CartItemId, CategoryId, OrderId, OrderItemId, OrderStatus,
    PaymentId, PaymentStatus, ProductId, UserRole,
};

use crate::models::{
    Account, Address, AddressFilter, AddressInput, Cart, CartItem, CartItemFilter, Category,
    CategoryFilter, CategoryInput, NewAccount, NewOrder, Order, OrderFilter, OrderItem,
    OrderItemFilter, OrderWrite, Page, PageRequest, Payment, PaymentFilter, PaymentWrite, Product,
    ProductFilter, ProductInput, Profile, ProfileFields, ProfileFilter, StoredCredentials,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The in-process store could not be accessed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique username).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A row changed between read and compare-and-set write.
    #[error("stale write: {0}")]
    Stale(String),

    /// A write was rejected by a referential or domain rule.
    #[error("invalid: {0}")]
    Invalid(String),
}

/// Map a unique constraint in the schema to a client-facing conflict.
///
/// Both stores report duplicates through this so the messages match.
pub(crate) fn unique_violation(constraint: &str) -> RepositoryError {
    let message = match constraint {
        "account_username_key" => "a user with that username already exists",
        "account_email_key" => "a user with that email already exists",
        "category_name_key" => "a category with that name already exists",
        "product_name_key" => "a product with that name already exists",
        "product_sku_key" => "a product with that SKU already exists",
        "cart_owner_key" => "this user already has a shopping cart",
        "payment_order_key" => "this order already has a payment",
        _ => "a record with these values already exists",
    };
    RepositoryError::Conflict(message.to_owned())
}

/// The account, profile and cart created by registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub account: Account,
    pub profile: Profile,
    pub cart: Cart,
}

// =============================================================================
// Store traits
// =============================================================================

/// Accounts and profiles.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create an account with its profile and empty cart in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username or email is taken.
    async fn create_account(&self, new: &NewAccount) -> Result<Registration, RepositoryError>;

    /// Look up an account and its password hash by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<StoredCredentials>, RepositoryError>;

    /// Get an account by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepositoryError>;

    /// Get a profile by its account id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn get_profile(&self, id: AccountId) -> Result<Option<Profile>, RepositoryError>;

    /// List profiles.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn list_profiles(
        &self,
        filter: &ProfileFilter,
        page: PageRequest,
    ) -> Result<Page<Profile>, RepositoryError>;

    /// Overwrite a profile's editable columns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    async fn update_profile(
        &self,
        id: AccountId,
        fields: &ProfileFields,
        role: UserRole,
    ) -> Result<Profile, RepositoryError>;

    /// Delete an account and everything it owns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the account does not exist and
    /// `RepositoryError::Invalid` if another profile's order uses one of its
    /// addresses.
    async fn delete_account(&self, id: AccountId) -> Result<(), RepositoryError>;
}

/// Saved addresses.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Save a new address for `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the owner has no profile.
    async fn create_address(
        &self,
        owner: AccountId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError>;

    /// Get an address by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn get_address(&self, id: AddressId) -> Result<Option<Address>, RepositoryError>;

    /// List one owner's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn list_addresses(
        &self,
        owner: AccountId,
        filter: &AddressFilter,
        page: PageRequest,
    ) -> Result<Page<Address>, RepositoryError>;

    /// Overwrite an address's editable columns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not exist.
    async fn update_address(
        &self,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError>;

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not exist and
    /// `RepositoryError::Invalid` if an order references it.
    async fn delete_address(&self, id: AddressId) -> Result<(), RepositoryError>;
}

/// Categories and products.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken and
    /// `RepositoryError::Invalid` if the parent does not exist.
    async fn create_category(&self, input: &CategoryInput) -> Result<Category, RepositoryError>;

    /// Get a category by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError>;

    /// List categories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn list_categories(
        &self,
        filter: &CategoryFilter,
        page: PageRequest,
    ) -> Result<Page<Category>, RepositoryError>;

    /// Overwrite a category's editable columns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound`, `Conflict` or `Invalid` as for create.
    async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError>;

    /// Delete a category. Children and products lose their reference to it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError>;

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken and
    /// `RepositoryError::Invalid` if the category does not exist.
    async fn create_product(&self, input: &ProductInput) -> Result<Product, RepositoryError>;

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// List products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, RepositoryError>;

    /// Overwrite a product's editable columns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound`, `Conflict` or `Invalid` as for create.
    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError>;

    /// Delete a product and any cart lines holding it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist and
    /// `RepositoryError::Invalid` if an order item references it.
    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError>;
}

/// Carts and cart lines.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Create an empty cart for `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the owner already has a cart and
    /// `RepositoryError::Invalid` if the owner has no profile.
    async fn create_cart(&self, owner: AccountId) -> Result<Cart, RepositoryError>;

    /// Get a cart by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>, RepositoryError>;

    /// Get the cart owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn cart_for_owner(&self, owner: AccountId) -> Result<Option<Cart>, RepositoryError>;

    /// Set or clear a cart's expiry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cart does not exist.
    async fn update_cart(
        &self,
        id: CartId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Cart, RepositoryError>;

    /// Delete a cart and its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cart does not exist.
    async fn delete_cart(&self, id: CartId) -> Result<(), RepositoryError>;

    /// Add `quantity` of a product, incrementing an existing line atomically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the cart or product does not exist.
    async fn add_cart_item(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError>;

    /// Get a cart line by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError>;

    /// List the lines in `owner`'s cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn list_cart_items(
        &self,
        owner: AccountId,
        filter: &CartItemFilter,
        page: PageRequest,
    ) -> Result<Page<CartItem>, RepositoryError>;

    /// Set a line's quantity (must be at least 1).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist.
    async fn set_cart_item_quantity(
        &self,
        id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError>;

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist.
    async fn delete_cart_item(&self, id: CartItemId) -> Result<(), RepositoryError>;
}

/// Orders and order lines.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Price the requested lines and insert the order and its items in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if pricing fails or an address does
    /// not exist.
    async fn create_order(&self, owner: AccountId, new: &NewOrder)
    -> Result<Order, RepositoryError>;

    /// Create an order from every line in `cart` and empty the cart, in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the cart is empty, pricing fails
    /// or an address does not exist.
    async fn checkout_cart(
        &self,
        owner: AccountId,
        cart: CartId,
        shipping_address: AddressId,
        billing_address: AddressId,
    ) -> Result<Order, RepositoryError>;

    /// Get an order by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// List `owner`'s orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn list_orders(
        &self,
        owner: AccountId,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<Page<Order>, RepositoryError>;

    /// Write an order's mutable columns if its status is still `expected`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist,
    /// `RepositoryError::Stale` if its status is no longer `expected`, and
    /// `RepositoryError::Invalid` if an address does not exist.
    async fn update_order(
        &self,
        id: OrderId,
        expected: OrderStatus,
        write: &OrderWrite,
    ) -> Result<Order, RepositoryError>;

    /// Delete an order with its items and payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    async fn delete_order(&self, id: OrderId) -> Result<(), RepositoryError>;

    /// Get an order line by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn get_order_item(&self, id: OrderItemId) -> Result<Option<OrderItem>, RepositoryError>;

    /// All lines of one order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn items_for_order(&self, order: OrderId) -> Result<Vec<OrderItem>, RepositoryError>;

    /// List lines across all of `owner`'s orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn list_order_items(
        &self,
        owner: AccountId,
        filter: &OrderItemFilter,
        page: PageRequest,
    ) -> Result<Page<OrderItem>, RepositoryError>;
}

/// Payments.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Attach a payment to an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order already has a payment
    /// and `RepositoryError::Invalid` if the order does not exist.
    async fn create_payment(
        &self,
        order: OrderId,
        write: &PaymentWrite,
    ) -> Result<Payment, RepositoryError>;

    /// Get a payment by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError>;

    /// The payment attached to an order, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn payment_for_order(&self, order: OrderId) -> Result<Option<Payment>, RepositoryError>;

    /// List all payments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: PageRequest,
    ) -> Result<Page<Payment>, RepositoryError>;

    /// Write a payment's columns if its status is still `expected`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the payment does not exist and
    /// `RepositoryError::Stale` if its status is no longer `expected`.
    async fn update_payment(
        &self,
        id: PaymentId,
        expected: PaymentStatus,
        write: &PaymentWrite,
    ) -> Result<Payment, RepositoryError>;

    /// Delete a payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the payment does not exist.
    async fn delete_payment(&self, id: PaymentId) -> Result<(), RepositoryError>;
}

/// The complete entity store used by the services.
#[async_trait]
pub trait Store:
    AccountStore + AddressStore + CatalogStore + CartStore + OrderStore + PaymentStore
{
    /// Check that the store can serve queries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backing database is unreachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
