//! In-process store with the same constraints as the `PostgreSQL` schema.
//!
//! Every table lives behind one mutex. Multi-row operations validate all of
//! their references before the first write, so a rejected call leaves the
//! tables untouched just like a rolled-back transaction.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stitch_core::{
    AccountId, AddressId, CartId, CartItemId, CategoryId, Email, Money, OrderId, OrderItemId,
    OrderStatus, PaymentId, PaymentStatus, ProductId, UserRole,
};

use super::{
    AccountStore, AddressStore, CartStore, CatalogStore, OrderStore, PaymentStore, Registration,
    RepositoryError, Store, unique_violation,
};
use crate::models::{
    Account, Address, AddressFilter, AddressInput, Cart, CartItem, CartItemFilter, Category,
    CategoryFilter, CategoryInput, NewAccount, NewOrder, Order, OrderFilter, OrderItem,
    OrderItemFilter, OrderLine, OrderWrite, Page, PageRequest, Payment, PaymentFilter,
    PaymentWrite, Product, ProductFilter, ProductInput, ProductSnapshot, Profile, ProfileFields,
    ProfileFilter, StoredCredentials, price_lines,
};

// =============================================================================
// Rows
// =============================================================================

struct AccountRow {
    username: String,
    email: Email,
    password_hash: String,
    is_staff: bool,
    date_joined: DateTime<Utc>,
}

struct ProfileRow {
    fields: ProfileFields,
    role: UserRole,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct AddressRow {
    owner: AccountId,
    input: AddressInput,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct CategoryRow {
    input: CategoryInput,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct ProductRow {
    input: ProductInput,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct CartRow {
    owner: AccountId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

struct CartItemRow {
    cart: CartId,
    product: ProductId,
    quantity: i32,
    added_at: DateTime<Utc>,
}

struct OrderRow {
    owner: AccountId,
    order_date: DateTime<Utc>,
    total_amount: Money,
    write: OrderWrite,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct OrderItemRow {
    order: OrderId,
    product: ProductId,
    quantity: i32,
    price: Money,
    subtotal: Money,
    created_at: DateTime<Utc>,
}

struct PaymentRow {
    order: OrderId,
    write: PaymentWrite,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Per-table serial counters.
#[derive(Default)]
struct Sequences {
    account: i32,
    address: i32,
    category: i32,
    product: i32,
    cart: i32,
    cart_item: i32,
    order: i32,
    order_item: i32,
    payment: i32,
}

fn next(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

#[derive(Default)]
struct Tables {
    seq: Sequences,
    accounts: BTreeMap<AccountId, AccountRow>,
    profiles: BTreeMap<AccountId, ProfileRow>,
    addresses: BTreeMap<AddressId, AddressRow>,
    categories: BTreeMap<CategoryId, CategoryRow>,
    products: BTreeMap<ProductId, ProductRow>,
    carts: BTreeMap<CartId, CartRow>,
    cart_items: BTreeMap<CartItemId, CartItemRow>,
    orders: BTreeMap<OrderId, OrderRow>,
    order_items: BTreeMap<OrderItemId, OrderItemRow>,
    payments: BTreeMap<PaymentId, PaymentRow>,
}

// =============================================================================
// Joins
// =============================================================================

impl Tables {
    fn username(&self, id: AccountId) -> String {
        self.accounts
            .get(&id)
            .map(|a| a.username.clone())
            .unwrap_or_default()
    }

    fn account(&self, id: AccountId) -> Option<Account> {
        self.accounts.get(&id).map(|row| Account {
            id,
            username: row.username.clone(),
            email: row.email.clone(),
            is_staff: row.is_staff,
            date_joined: row.date_joined,
        })
    }

    fn profile(&self, id: AccountId) -> Option<Profile> {
        let account = self.accounts.get(&id)?;
        let row = self.profiles.get(&id)?;
        Some(Profile {
            id,
            username: account.username.clone(),
            email: account.email.clone(),
            first_name: row.fields.first_name.clone(),
            middle_name: row.fields.middle_name.clone(),
            last_name: row.fields.last_name.clone(),
            phone: row.fields.phone.clone(),
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn address(&self, id: AddressId) -> Option<Address> {
        let row = self.addresses.get(&id)?;
        let input = row.input.clone();
        Some(Address {
            id,
            owner: row.owner,
            user_username: self.username(row.owner),
            street_name: input.street_name,
            building_house_no: input.building_house_no,
            barangay: input.barangay,
            city_municipality: input.city_municipality,
            province: input.province,
            postal_code: input.postal_code,
            country: input.country,
            address_type: input.address_type,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn category(&self, id: CategoryId) -> Option<Category> {
        let row = self.categories.get(&id)?;
        Some(Category {
            id,
            name: row.input.name.clone(),
            description: row.input.description.clone(),
            parent_category: row.input.parent_category,
            parent_category_name: row
                .input
                .parent_category
                .and_then(|p| self.categories.get(&p))
                .map(|p| p.input.name.clone()),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn product(&self, id: ProductId) -> Option<Product> {
        let row = self.products.get(&id)?;
        let input = row.input.clone();
        Some(Product {
            id,
            category_name: input
                .category
                .and_then(|c| self.categories.get(&c))
                .map(|c| c.input.name.clone()),
            name: input.name,
            description: input.description,
            price: input.price,
            sku: input.sku,
            stock_quantity: input.stock_quantity,
            category: input.category,
            image_url: input.image_url,
            sizes: input.sizes,
            is_available: input.is_available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn cart(&self, id: CartId) -> Option<Cart> {
        let row = self.carts.get(&id)?;
        Some(Cart {
            id,
            owner: row.owner,
            user_username: self.username(row.owner),
            created_at: row.created_at,
            updated_at: row.updated_at,
            expires_at: row.expires_at,
        })
    }

    fn cart_id_for(&self, owner: AccountId) -> Option<CartId> {
        self.carts
            .iter()
            .find(|(_, row)| row.owner == owner)
            .map(|(id, _)| *id)
    }

    fn cart_item(&self, id: CartItemId) -> Option<CartItem> {
        let row = self.cart_items.get(&id)?;
        let product = self.products.get(&row.product)?;
        Some(CartItem {
            id,
            cart: row.cart,
            product: row.product,
            product_name: product.input.name.clone(),
            product_price: product.input.price,
            quantity: row.quantity,
            added_at: row.added_at,
        })
    }

    fn order(&self, id: OrderId) -> Option<Order> {
        let row = self.orders.get(&id)?;
        Some(Order {
            id,
            owner: row.owner,
            user_username: self.username(row.owner),
            order_date: row.order_date,
            total_amount: row.total_amount,
            order_status: row.write.order_status,
            shipping_address: row.write.shipping_address,
            billing_address: row.write.billing_address,
            delivery_date: row.write.delivery_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn order_item(&self, id: OrderItemId) -> Option<OrderItem> {
        let row = self.order_items.get(&id)?;
        Some(OrderItem {
            id,
            order: row.order,
            product: row.product,
            product_name: self
                .products
                .get(&row.product)
                .map(|p| p.input.name.clone())
                .unwrap_or_default(),
            quantity: row.quantity,
            price_at_time_of_order: row.price,
            subtotal: row.subtotal,
            created_at: row.created_at,
            updated_at: row.created_at,
        })
    }

    fn payment(&self, id: PaymentId) -> Option<Payment> {
        let row = self.payments.get(&id)?;
        let write = row.write.clone();
        Some(Payment {
            id,
            order: row.order,
            payment_method: write.payment_method,
            amount: write.amount,
            transaction_id: write.transaction_id,
            payment_status: write.payment_status,
            paid_at: write.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    // -------------------------------------------------------------------------
    // Constraint checks
    // -------------------------------------------------------------------------

    fn require_profile(&self, owner: AccountId) -> Result<(), RepositoryError> {
        if self.profiles.contains_key(&owner) {
            Ok(())
        } else {
            Err(RepositoryError::Invalid("user does not exist".to_owned()))
        }
    }

    fn require_addresses(
        &self,
        shipping: AddressId,
        billing: AddressId,
    ) -> Result<(), RepositoryError> {
        if !self.addresses.contains_key(&shipping) {
            return Err(RepositoryError::Invalid(
                "shipping address does not exist".to_owned(),
            ));
        }
        if !self.addresses.contains_key(&billing) {
            return Err(RepositoryError::Invalid(
                "billing address does not exist".to_owned(),
            ));
        }
        Ok(())
    }

    fn check_category(
        &self,
        id: Option<CategoryId>,
        input: &CategoryInput,
    ) -> Result<(), RepositoryError> {
        if self
            .categories
            .iter()
            .any(|(other, row)| Some(*other) != id && row.input.name == input.name)
        {
            return Err(unique_violation("category_name_key"));
        }
        if let Some(parent) = input.parent_category
            && !self.categories.contains_key(&parent)
        {
            return Err(RepositoryError::Invalid(
                "parent category does not exist".to_owned(),
            ));
        }
        Ok(())
    }

    fn check_product(
        &self,
        id: Option<ProductId>,
        input: &ProductInput,
    ) -> Result<(), RepositoryError> {
        if self
            .products
            .iter()
            .any(|(other, row)| Some(*other) != id && row.input.name == input.name)
        {
            return Err(unique_violation("product_name_key"));
        }
        if let Some(sku) = input.sku.as_deref()
            && self.products.iter().any(|(other, row)| {
                Some(*other) != id && row.input.sku.as_deref() == Some(sku)
            })
        {
            return Err(unique_violation("product_sku_key"));
        }
        if let Some(category) = input.category
            && !self.categories.contains_key(&category)
        {
            return Err(RepositoryError::Invalid(
                "category does not exist".to_owned(),
            ));
        }
        Ok(())
    }

    /// Price `lines`, then insert the order and its items.
    fn insert_order(
        &mut self,
        owner: AccountId,
        shipping_address: AddressId,
        billing_address: AddressId,
        lines: &[OrderLine],
    ) -> Result<OrderId, RepositoryError> {
        self.require_profile(owner)?;
        self.require_addresses(shipping_address, billing_address)?;

        let snapshots: Vec<ProductSnapshot> = lines
            .iter()
            .filter_map(|line| {
                self.products.get(&line.product).map(|row| ProductSnapshot {
                    id: line.product,
                    name: row.input.name.clone(),
                    price: row.input.price,
                    is_available: row.input.is_available,
                })
            })
            .collect();
        let priced =
            price_lines(lines, &snapshots).map_err(|e| RepositoryError::Invalid(e.to_string()))?;

        let now = Utc::now();
        let id = OrderId::new(next(&mut self.seq.order));
        self.orders.insert(
            id,
            OrderRow {
                owner,
                order_date: now,
                total_amount: priced.total,
                write: OrderWrite {
                    order_status: OrderStatus::Pending,
                    delivery_date: None,
                    shipping_address,
                    billing_address,
                },
                created_at: now,
                updated_at: now,
            },
        );
        for line in priced.lines {
            let item_id = OrderItemId::new(next(&mut self.seq.order_item));
            self.order_items.insert(
                item_id,
                OrderItemRow {
                    order: id,
                    product: line.product,
                    quantity: line.quantity,
                    price: line.price,
                    subtotal: line.subtotal,
                    created_at: now,
                },
            );
        }
        Ok(id)
    }

    fn remove_order(&mut self, id: OrderId) {
        self.orders.remove(&id);
        self.order_items.retain(|_, item| item.order != id);
        self.payments.retain(|_, payment| payment.order != id);
    }

    fn remove_cart(&mut self, id: CartId) {
        self.carts.remove(&id);
        self.cart_items.retain(|_, item| item.cart != id);
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory store backed by ordered maps.
///
/// Clone-friendly via `Arc`; clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Storage("lock poisoned".into()))
    }
}

fn page_of<T>(rows: impl Iterator<Item = T>, page: PageRequest) -> Page<T> {
    page.slice(rows.collect())
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_account(&self, new: &NewAccount) -> Result<Registration, RepositoryError> {
        let mut t = self.lock()?;
        if t.accounts.values().any(|a| a.username == new.username) {
            return Err(unique_violation("account_username_key"));
        }
        if t.accounts.values().any(|a| a.email == new.email) {
            return Err(unique_violation("account_email_key"));
        }

        let now = Utc::now();
        let id = AccountId::new(next(&mut t.seq.account));
        t.accounts.insert(
            id,
            AccountRow {
                username: new.username.clone(),
                email: new.email.clone(),
                password_hash: new.password_hash.clone(),
                is_staff: new.is_staff,
                date_joined: now,
            },
        );
        t.profiles.insert(
            id,
            ProfileRow {
                fields: new.profile.clone(),
                role: new.role,
                created_at: now,
                updated_at: now,
            },
        );
        let cart_id = CartId::new(next(&mut t.seq.cart));
        t.carts.insert(
            cart_id,
            CartRow {
                owner: id,
                created_at: now,
                updated_at: now,
                expires_at: None,
            },
        );

        match (t.account(id), t.profile(id), t.cart(cart_id)) {
            (Some(account), Some(profile), Some(cart)) => Ok(Registration {
                account,
                profile,
                cart,
            }),
            _ => Err(RepositoryError::DataCorruption(
                "registration rows missing after insert".to_owned(),
            )),
        }
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<StoredCredentials>, RepositoryError> {
        let t = self.lock()?;
        Ok(t.accounts
            .iter()
            .find(|(_, row)| row.username == username)
            .and_then(|(id, row)| {
                t.account(*id).map(|account| StoredCredentials {
                    account,
                    password_hash: row.password_hash.clone(),
                })
            }))
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self.lock()?.account(id))
    }

    async fn get_profile(&self, id: AccountId) -> Result<Option<Profile>, RepositoryError> {
        Ok(self.lock()?.profile(id))
    }

    async fn list_profiles(
        &self,
        filter: &ProfileFilter,
        page: PageRequest,
    ) -> Result<Page<Profile>, RepositoryError> {
        let t = self.lock()?;
        let rows = t
            .profiles
            .keys()
            .filter_map(|id| t.profile(*id))
            .filter(|p| filter.matches(p));
        Ok(page_of(rows, page))
    }

    async fn update_profile(
        &self,
        id: AccountId,
        fields: &ProfileFields,
        role: UserRole,
    ) -> Result<Profile, RepositoryError> {
        let mut t = self.lock()?;
        let row = t.profiles.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        row.fields = fields.clone();
        row.role = role;
        row.updated_at = Utc::now();
        t.profile(id).ok_or(RepositoryError::NotFound)
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), RepositoryError> {
        let mut t = self.lock()?;
        if !t.accounts.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        let owned: Vec<AddressId> = t
            .addresses
            .iter()
            .filter(|(_, a)| a.owner == id)
            .map(|(address_id, _)| *address_id)
            .collect();
        let used_elsewhere = t.orders.values().any(|o| {
            o.owner != id
                && (owned.contains(&o.write.shipping_address)
                    || owned.contains(&o.write.billing_address))
        });
        if used_elsewhere {
            return Err(RepositoryError::Invalid(
                "an address of this user is used by another user's order".to_owned(),
            ));
        }

        let orders: Vec<OrderId> = t
            .orders
            .iter()
            .filter(|(_, o)| o.owner == id)
            .map(|(order_id, _)| *order_id)
            .collect();
        for order in orders {
            t.remove_order(order);
        }
        if let Some(cart) = t.cart_id_for(id) {
            t.remove_cart(cart);
        }
        t.addresses.retain(|_, a| a.owner != id);
        t.profiles.remove(&id);
        t.accounts.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl AddressStore for MemoryStore {
    async fn create_address(
        &self,
        owner: AccountId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut t = self.lock()?;
        t.require_profile(owner)?;
        let now = Utc::now();
        let id = AddressId::new(next(&mut t.seq.address));
        t.addresses.insert(
            id,
            AddressRow {
                owner,
                input: input.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        t.address(id).ok_or(RepositoryError::NotFound)
    }

    async fn get_address(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        Ok(self.lock()?.address(id))
    }

    async fn list_addresses(
        &self,
        owner: AccountId,
        filter: &AddressFilter,
        page: PageRequest,
    ) -> Result<Page<Address>, RepositoryError> {
        let t = self.lock()?;
        let rows = t
            .addresses
            .iter()
            .filter(|(_, row)| row.owner == owner)
            .filter_map(|(id, _)| t.address(*id))
            .filter(|a| filter.matches(a));
        Ok(page_of(rows, page))
    }

    async fn update_address(
        &self,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut t = self.lock()?;
        let row = t.addresses.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        row.input = input.clone();
        row.updated_at = Utc::now();
        t.address(id).ok_or(RepositoryError::NotFound)
    }

    async fn delete_address(&self, id: AddressId) -> Result<(), RepositoryError> {
        let mut t = self.lock()?;
        if !t.addresses.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        if t
            .orders
            .values()
            .any(|o| o.write.shipping_address == id || o.write.billing_address == id)
        {
            return Err(RepositoryError::Invalid(
                "address is used by an order".to_owned(),
            ));
        }
        t.addresses.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn create_category(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        let mut t = self.lock()?;
        t.check_category(None, input)?;
        let now = Utc::now();
        let id = CategoryId::new(next(&mut t.seq.category));
        t.categories.insert(
            id,
            CategoryRow {
                input: input.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        t.category(id).ok_or(RepositoryError::NotFound)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        Ok(self.lock()?.category(id))
    }

    async fn list_categories(
        &self,
        filter: &CategoryFilter,
        page: PageRequest,
    ) -> Result<Page<Category>, RepositoryError> {
        let t = self.lock()?;
        let mut rows: Vec<Category> = t
            .categories
            .keys()
            .filter_map(|id| t.category(*id))
            .filter(|c| filter.matches(c))
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(page.slice(rows))
    }

    async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        let mut t = self.lock()?;
        if !t.categories.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        t.check_category(Some(id), input)?;
        if let Some(row) = t.categories.get_mut(&id) {
            row.input = input.clone();
            row.updated_at = Utc::now();
        }
        t.category(id).ok_or(RepositoryError::NotFound)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let mut t = self.lock()?;
        if t.categories.remove(&id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        for child in t.categories.values_mut() {
            if child.input.parent_category == Some(id) {
                child.input.parent_category = None;
            }
        }
        for product in t.products.values_mut() {
            if product.input.category == Some(id) {
                product.input.category = None;
            }
        }
        Ok(())
    }

    async fn create_product(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let mut t = self.lock()?;
        t.check_product(None, input)?;
        let now = Utc::now();
        let id = ProductId::new(next(&mut t.seq.product));
        t.products.insert(
            id,
            ProductRow {
                input: input.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        t.product(id).ok_or(RepositoryError::NotFound)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.lock()?.product(id))
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, RepositoryError> {
        let t = self.lock()?;
        let mut rows: Vec<Product> = t
            .products
            .keys()
            .filter_map(|id| t.product(*id))
            .filter(|p| filter.matches(p))
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(page.slice(rows))
    }

    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let mut t = self.lock()?;
        if !t.products.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        t.check_product(Some(id), input)?;
        if let Some(row) = t.products.get_mut(&id) {
            row.input = input.clone();
            row.updated_at = Utc::now();
        }
        t.product(id).ok_or(RepositoryError::NotFound)
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let mut t = self.lock()?;
        if !t.products.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        if t.order_items.values().any(|item| item.product == id) {
            return Err(RepositoryError::Invalid(
                "product is referenced by an order".to_owned(),
            ));
        }
        t.cart_items.retain(|_, item| item.product != id);
        t.products.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn create_cart(&self, owner: AccountId) -> Result<Cart, RepositoryError> {
        let mut t = self.lock()?;
        t.require_profile(owner)?;
        if t.cart_id_for(owner).is_some() {
            return Err(unique_violation("cart_owner_key"));
        }
        let now = Utc::now();
        let id = CartId::new(next(&mut t.seq.cart));
        t.carts.insert(
            id,
            CartRow {
                owner,
                created_at: now,
                updated_at: now,
                expires_at: None,
            },
        );
        t.cart(id).ok_or(RepositoryError::NotFound)
    }

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>, RepositoryError> {
        Ok(self.lock()?.cart(id))
    }

    async fn cart_for_owner(&self, owner: AccountId) -> Result<Option<Cart>, RepositoryError> {
        let t = self.lock()?;
        Ok(t.cart_id_for(owner).and_then(|id| t.cart(id)))
    }

    async fn update_cart(
        &self,
        id: CartId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Cart, RepositoryError> {
        let mut t = self.lock()?;
        let row = t.carts.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        row.expires_at = expires_at;
        row.updated_at = Utc::now();
        t.cart(id).ok_or(RepositoryError::NotFound)
    }

    async fn delete_cart(&self, id: CartId) -> Result<(), RepositoryError> {
        let mut t = self.lock()?;
        if !t.carts.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        t.remove_cart(id);
        Ok(())
    }

    async fn add_cart_item(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let mut t = self.lock()?;
        if !t.carts.contains_key(&cart) {
            return Err(RepositoryError::Invalid("cart does not exist".to_owned()));
        }
        if !t.products.contains_key(&product) {
            return Err(RepositoryError::Invalid(
                "product does not exist".to_owned(),
            ));
        }

        let existing = t
            .cart_items
            .iter_mut()
            .find(|(_, item)| item.cart == cart && item.product == product);
        let id = if let Some((id, item)) = existing {
            item.quantity = item
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| RepositoryError::Invalid("quantity is too large".to_owned()))?;
            *id
        } else {
            let id = CartItemId::new(next(&mut t.seq.cart_item));
            t.cart_items.insert(
                id,
                CartItemRow {
                    cart,
                    product,
                    quantity,
                    added_at: Utc::now(),
                },
            );
            id
        };
        t.cart_item(id).ok_or(RepositoryError::NotFound)
    }

    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        Ok(self.lock()?.cart_item(id))
    }

    async fn list_cart_items(
        &self,
        owner: AccountId,
        filter: &CartItemFilter,
        page: PageRequest,
    ) -> Result<Page<CartItem>, RepositoryError> {
        let t = self.lock()?;
        let Some(cart) = t.cart_id_for(owner) else {
            return Ok(Page::empty());
        };
        let rows = t
            .cart_items
            .iter()
            .filter(|(_, row)| row.cart == cart)
            .filter_map(|(id, _)| t.cart_item(*id))
            .filter(|item| filter.matches(item));
        Ok(page_of(rows, page))
    }

    async fn set_cart_item_quantity(
        &self,
        id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let mut t = self.lock()?;
        let row = t.cart_items.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        row.quantity = quantity;
        t.cart_item(id).ok_or(RepositoryError::NotFound)
    }

    async fn delete_cart_item(&self, id: CartItemId) -> Result<(), RepositoryError> {
        let mut t = self.lock()?;
        t.cart_items
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(
        &self,
        owner: AccountId,
        new: &NewOrder,
    ) -> Result<Order, RepositoryError> {
        let mut t = self.lock()?;
        let id = t.insert_order(owner, new.shipping_address, new.billing_address, &new.items)?;
        t.order(id).ok_or(RepositoryError::NotFound)
    }

    async fn checkout_cart(
        &self,
        owner: AccountId,
        cart: CartId,
        shipping_address: AddressId,
        billing_address: AddressId,
    ) -> Result<Order, RepositoryError> {
        let mut t = self.lock()?;
        if !t.carts.contains_key(&cart) {
            return Err(RepositoryError::NotFound);
        }
        let lines: Vec<OrderLine> = t
            .cart_items
            .values()
            .filter(|item| item.cart == cart)
            .map(|item| OrderLine {
                product: item.product,
                quantity: item.quantity,
            })
            .collect();
        if lines.is_empty() {
            return Err(RepositoryError::Invalid("cart is empty".to_owned()));
        }

        let id = t.insert_order(owner, shipping_address, billing_address, &lines)?;
        t.cart_items.retain(|_, item| item.cart != cart);
        if let Some(row) = t.carts.get_mut(&cart) {
            row.updated_at = Utc::now();
        }
        t.order(id).ok_or(RepositoryError::NotFound)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.lock()?.order(id))
    }

    async fn list_orders(
        &self,
        owner: AccountId,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<Page<Order>, RepositoryError> {
        let t = self.lock()?;
        let mut rows: Vec<Order> = t
            .orders
            .iter()
            .filter(|(_, row)| row.owner == owner)
            .filter_map(|(id, _)| t.order(*id))
            .filter(|o| filter.matches(o))
            .collect();
        rows.sort_by(|a, b| b.order_date.cmp(&a.order_date).then(b.id.cmp(&a.id)));
        Ok(page.slice(rows))
    }

    async fn update_order(
        &self,
        id: OrderId,
        expected: OrderStatus,
        write: &OrderWrite,
    ) -> Result<Order, RepositoryError> {
        let mut t = self.lock()?;
        let current = t
            .orders
            .get(&id)
            .map(|row| row.write.order_status)
            .ok_or(RepositoryError::NotFound)?;
        if current != expected {
            return Err(RepositoryError::Stale(format!(
                "order {id} is now {current}"
            )));
        }
        t.require_addresses(write.shipping_address, write.billing_address)?;
        if let Some(row) = t.orders.get_mut(&id) {
            row.write = *write;
            row.updated_at = Utc::now();
        }
        t.order(id).ok_or(RepositoryError::NotFound)
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), RepositoryError> {
        let mut t = self.lock()?;
        if !t.orders.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        t.remove_order(id);
        Ok(())
    }

    async fn get_order_item(&self, id: OrderItemId) -> Result<Option<OrderItem>, RepositoryError> {
        Ok(self.lock()?.order_item(id))
    }

    async fn items_for_order(&self, order: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let t = self.lock()?;
        Ok(t.order_items
            .iter()
            .filter(|(_, row)| row.order == order)
            .filter_map(|(id, _)| t.order_item(*id))
            .collect())
    }

    async fn list_order_items(
        &self,
        owner: AccountId,
        filter: &OrderItemFilter,
        page: PageRequest,
    ) -> Result<Page<OrderItem>, RepositoryError> {
        let t = self.lock()?;
        let rows = t
            .order_items
            .iter()
            .filter(|(_, row)| t.orders.get(&row.order).is_some_and(|o| o.owner == owner))
            .filter_map(|(id, _)| t.order_item(*id))
            .filter(|item| filter.matches(item));
        Ok(page_of(rows, page))
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn create_payment(
        &self,
        order: OrderId,
        write: &PaymentWrite,
    ) -> Result<Payment, RepositoryError> {
        let mut t = self.lock()?;
        if !t.orders.contains_key(&order) {
            return Err(RepositoryError::Invalid("order does not exist".to_owned()));
        }
        if t.payments.values().any(|p| p.order == order) {
            return Err(unique_violation("payment_order_key"));
        }
        let now = Utc::now();
        let id = PaymentId::new(next(&mut t.seq.payment));
        t.payments.insert(
            id,
            PaymentRow {
                order,
                write: write.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        t.payment(id).ok_or(RepositoryError::NotFound)
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        Ok(self.lock()?.payment(id))
    }

    async fn payment_for_order(&self, order: OrderId) -> Result<Option<Payment>, RepositoryError> {
        let t = self.lock()?;
        Ok(t.payments
            .iter()
            .find(|(_, row)| row.order == order)
            .and_then(|(id, _)| t.payment(*id)))
    }

    async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: PageRequest,
    ) -> Result<Page<Payment>, RepositoryError> {
        let t = self.lock()?;
        let rows = t
            .payments
            .keys()
            .filter_map(|id| t.payment(*id))
            .filter(|p| filter.matches(p));
        Ok(page_of(rows, page))
    }

    async fn update_payment(
        &self,
        id: PaymentId,
        expected: PaymentStatus,
        write: &PaymentWrite,
    ) -> Result<Payment, RepositoryError> {
        let mut t = self.lock()?;
        let row = t.payments.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if row.write.payment_status != expected {
            return Err(RepositoryError::Stale(format!(
                "payment {id} is now {}",
                row.write.payment_status
            )));
        }
        row.write = write.clone();
        row.updated_at = Utc::now();
        t.payment(id).ok_or(RepositoryError::NotFound)
    }

    async fn delete_payment(&self, id: PaymentId) -> Result<(), RepositoryError> {
        let mut t = self.lock()?;
        t.payments
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stitch_core::{AddressType, PaymentMethod};

    use super::*;

    fn new_account(username: &str) -> NewAccount {
        NewAccount {
            username: username.to_owned(),
            email: Email::parse(&format!("{username}@example.com")).unwrap(),
            password_hash: "hash".to_owned(),
            is_staff: false,
            role: UserRole::User,
            profile: ProfileFields::default(),
        }
    }

    fn address_input() -> AddressInput {
        AddressInput {
            street_name: "Rizal Street".to_owned(),
            building_house_no: None,
            barangay: "San Antonio".to_owned(),
            city_municipality: "Quezon City".to_owned(),
            province: "Metro Manila".to_owned(),
            postal_code: "1105".to_owned(),
            country: "Philippines".to_owned(),
            address_type: AddressType::Shipping,
        }
    }

    fn product_input(name: &str, cents: i64) -> ProductInput {
        ProductInput {
            name: name.to_owned(),
            description: None,
            price: Money::from_cents(cents).unwrap(),
            sku: None,
            stock_quantity: 10,
            category: None,
            image_url: None,
            sizes: None,
            is_available: true,
        }
    }

    /// A registered user with one address and one product in the catalog.
    async fn fixture(store: &MemoryStore) -> (Registration, Address, Product) {
        let reg = store.create_account(&new_account("alice")).await.unwrap();
        let address = store
            .create_address(reg.account.id, &address_input())
            .await
            .unwrap();
        let product = store
            .create_product(&product_input("Denim", 1000))
            .await
            .unwrap();
        (reg, address, product)
    }

    fn order_for(address: &Address, product: ProductId, quantity: i32) -> NewOrder {
        NewOrder {
            shipping_address: address.id,
            billing_address: address.id,
            items: vec![OrderLine { product, quantity }],
        }
    }

    #[tokio::test]
    async fn test_registration_creates_profile_and_cart() {
        let store = MemoryStore::new();
        let reg = store.create_account(&new_account("alice")).await.unwrap();

        assert_eq!(reg.profile.id, reg.account.id);
        assert_eq!(reg.cart.owner, reg.account.id);
        assert_eq!(reg.cart.user_username, "alice");
        let cart = store.cart_for_owner(reg.account.id).await.unwrap();
        assert_eq!(cart.unwrap().id, reg.cart.id);
    }

    #[tokio::test]
    async fn test_duplicate_username_and_email_conflict() {
        let store = MemoryStore::new();
        store.create_account(&new_account("alice")).await.unwrap();

        let same_name = store.create_account(&new_account("alice")).await;
        assert!(matches!(same_name, Err(RepositoryError::Conflict(_))));

        let mut same_email = new_account("bob");
        same_email.email = Email::parse("alice@example.com").unwrap();
        let result = store.create_account(&same_email).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_second_cart_conflicts() {
        let store = MemoryStore::new();
        let reg = store.create_account(&new_account("alice")).await.unwrap();
        let result = store.create_cart(reg.account.id).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_add_cart_item_increments_existing_line() {
        let store = MemoryStore::new();
        let (reg, _, product) = fixture(&store).await;

        store.add_cart_item(reg.cart.id, product.id, 2).await.unwrap();
        let item = store.add_cart_item(reg.cart.id, product.id, 3).await.unwrap();
        assert_eq!(item.quantity, 5);

        let page = store
            .list_cart_items(reg.account.id, &CartItemFilter::default(), PageRequest::ALL)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].product_name, "Denim");
    }

    #[tokio::test]
    async fn test_order_snapshots_price() {
        let store = MemoryStore::new();
        let (reg, address, product) = fixture(&store).await;

        let order = store
            .create_order(reg.account.id, &order_for(&address, product.id, 2))
            .await
            .unwrap();
        assert_eq!(order.total_amount, Money::from_cents(2000).unwrap());
        assert_eq!(order.order_status, OrderStatus::Pending);

        let mut repriced = product_input("Denim", 2000);
        repriced.stock_quantity = product.stock_quantity;
        store.update_product(product.id, &repriced).await.unwrap();

        let items = store.items_for_order(order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].price_at_time_of_order,
            Money::from_cents(1000).unwrap()
        );
        assert_eq!(items[0].subtotal, Money::from_cents(2000).unwrap());
    }

    #[tokio::test]
    async fn test_rejected_order_writes_nothing() {
        let store = MemoryStore::new();
        let (reg, address, product) = fixture(&store).await;

        let mut new = order_for(&address, product.id, 1);
        new.items.push(OrderLine {
            product: ProductId::new(99),
            quantity: 1,
        });
        let result = store.create_order(reg.account.id, &new).await;
        assert!(matches!(result, Err(RepositoryError::Invalid(_))));

        let page = store
            .list_orders(reg.account.id, &OrderFilter::default(), PageRequest::ALL)
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_checkout_empties_cart() {
        let store = MemoryStore::new();
        let (reg, address, product) = fixture(&store).await;
        store.add_cart_item(reg.cart.id, product.id, 3).await.unwrap();

        let order = store
            .checkout_cart(reg.account.id, reg.cart.id, address.id, address.id)
            .await
            .unwrap();
        assert_eq!(order.total_amount, Money::from_cents(3000).unwrap());

        let items = store
            .list_cart_items(reg.account.id, &CartItemFilter::default(), PageRequest::ALL)
            .await
            .unwrap();
        assert_eq!(items.total, 0);

        let again = store
            .checkout_cart(reg.account.id, reg.cart.id, address.id, address.id)
            .await;
        assert!(matches!(again, Err(RepositoryError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_order_update_is_compare_and_set() {
        let store = MemoryStore::new();
        let (reg, address, product) = fixture(&store).await;
        let order = store
            .create_order(reg.account.id, &order_for(&address, product.id, 1))
            .await
            .unwrap();

        let write = OrderWrite {
            order_status: OrderStatus::Processing,
            delivery_date: None,
            shipping_address: address.id,
            billing_address: address.id,
        };
        store
            .update_order(order.id, OrderStatus::Pending, &write)
            .await
            .unwrap();
        let stale = store
            .update_order(order.id, OrderStatus::Pending, &write)
            .await;
        assert!(matches!(stale, Err(RepositoryError::Stale(_))));
    }

    #[tokio::test]
    async fn test_one_payment_per_order() {
        let store = MemoryStore::new();
        let (reg, address, product) = fixture(&store).await;
        let order = store
            .create_order(reg.account.id, &order_for(&address, product.id, 1))
            .await
            .unwrap();
        let write = PaymentWrite {
            payment_method: PaymentMethod::GCash,
            amount: order.total_amount,
            transaction_id: None,
            payment_status: PaymentStatus::Pending,
            paid_at: None,
        };

        store.create_payment(order.id, &write).await.unwrap();
        let second = store.create_payment(order.id, &write).await;
        assert!(matches!(second, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_category_delete_keeps_products() {
        let store = MemoryStore::new();
        let fabrics = store
            .create_category(&CategoryInput {
                name: "Fabrics".to_owned(),
                description: None,
                parent_category: None,
            })
            .await
            .unwrap();
        let blends = store
            .create_category(&CategoryInput {
                name: "Cotton Blends".to_owned(),
                description: None,
                parent_category: Some(fabrics.id),
            })
            .await
            .unwrap();
        assert_eq!(blends.parent_category_name.as_deref(), Some("Fabrics"));

        let mut denim = product_input("Denim", 1400);
        denim.category = Some(fabrics.id);
        let denim = store.create_product(&denim).await.unwrap();
        assert_eq!(denim.category_name.as_deref(), Some("Fabrics"));

        store.delete_category(fabrics.id).await.unwrap();

        let denim = store.get_product(denim.id).await.unwrap().unwrap();
        assert_eq!(denim.category, None);
        assert_eq!(denim.category_name, None);
        let blends = store.get_category(blends.id).await.unwrap().unwrap();
        assert_eq!(blends.parent_category, None);
    }

    #[tokio::test]
    async fn test_ordered_product_cannot_be_deleted() {
        let store = MemoryStore::new();
        let (reg, address, product) = fixture(&store).await;
        store.add_cart_item(reg.cart.id, product.id, 1).await.unwrap();

        let spare = store
            .create_product(&product_input("Linen", 950))
            .await
            .unwrap();
        store.add_cart_item(reg.cart.id, spare.id, 1).await.unwrap();
        store.delete_product(spare.id).await.unwrap();
        let items = store
            .list_cart_items(reg.account.id, &CartItemFilter::default(), PageRequest::ALL)
            .await
            .unwrap();
        assert_eq!(items.total, 1);

        store
            .create_order(reg.account.id, &order_for(&address, product.id, 1))
            .await
            .unwrap();
        let result = store.delete_product(product.id).await;
        assert!(matches!(result, Err(RepositoryError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_address_in_use_cannot_be_deleted() {
        let store = MemoryStore::new();
        let (reg, address, product) = fixture(&store).await;
        store
            .create_order(reg.account.id, &order_for(&address, product.id, 1))
            .await
            .unwrap();

        let result = store.delete_address(address.id).await;
        assert!(matches!(result, Err(RepositoryError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_delete_account_cascades() {
        let store = MemoryStore::new();
        let (reg, address, product) = fixture(&store).await;
        let order = store
            .create_order(reg.account.id, &order_for(&address, product.id, 1))
            .await
            .unwrap();

        store.delete_account(reg.account.id).await.unwrap();

        assert!(store.get_profile(reg.account.id).await.unwrap().is_none());
        assert!(store.get_cart(reg.cart.id).await.unwrap().is_none());
        assert!(store.get_address(address.id).await.unwrap().is_none());
        assert!(store.get_order(order.id).await.unwrap().is_none());
        assert!(store.items_for_order(order.id).await.unwrap().is_empty());
        // The product survives once its order item is gone
        store.delete_product(product.id).await.unwrap();
    }
}
