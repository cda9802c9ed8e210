//! Persistence seams.
//!
//! Services only see these traits. Every stock mutation is expressed as a single conditional
//! store operation so that several service instances can share one database safely.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::aggregates::{Account, Cart, Category, Order, OrderStatus, Product, ProfileUpdate};
use crate::domain::value_objects::{AccountId, Money, OrderId, ProductId, Quantity};
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Query over the catalog. All conditions are combined with AND.
#[derive(Clone, Debug, Default)]
pub struct ProductFilter {
    pub approved_only: bool,
    pub available_only: bool,
    pub category: Option<Category>,
    /// Case-insensitive substring of name or description.
    pub search: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    /// Case-insensitive substring of location city or state.
    pub location: Option<String>,
    pub farmer: Option<AccountId>,
}

impl ProductFilter {
    /// What consumers browse: approved listings that still have stock.
    pub fn storefront() -> Self { Self { approved_only: true, available_only: true, ..Default::default() } }

    pub fn for_farmer(farmer: AccountId) -> Self { Self { farmer: Some(farmer), ..Default::default() } }

    pub fn matches(&self, p: &Product) -> bool {
        let contains = |haystack: &str, needle: &str| haystack.to_lowercase().contains(&needle.to_lowercase());
        (!self.approved_only || p.is_approved())
            && (!self.available_only || p.is_available())
            && self.category.map_or(true, |c| p.category() == c)
            && self.farmer.map_or(true, |f| p.farmer() == f)
            && self.min_price.map_or(true, |m| p.price() >= m)
            && self.max_price.map_or(true, |m| p.price() <= m)
            && self.search.as_deref().map_or(true, |s| contains(p.name(), s) || contains(p.description(), s))
            && self.location.as_deref().map_or(true, |l| contains(&p.location().city, l) || contains(&p.location().state, l))
    }
}

/// Outcome of a conditional stock decrement.
#[derive(Clone, Debug)]
pub enum StockReservation {
    /// Stock was taken; carries the product as it is after the decrement.
    Reserved(Product),
    Missing,
    Insufficient { available: u32 },
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_product(&self, product: &Product) -> Result<()>;
    async fn product(&self, id: ProductId) -> Result<Option<Product>>;
    async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;
    /// Writes every field except `quantity` and `is_available`. Returns false when the product is gone.
    async fn save_details(&self, product: &Product) -> Result<bool>;
    /// Sets stock to an explicit value supplied by the farmer.
    async fn set_stock(&self, id: ProductId, quantity: Quantity) -> Result<Option<Product>>;
    /// Decrements stock by `qty` only if the product is available and holds at least `qty`.
    async fn reserve_stock(&self, id: ProductId, qty: u32) -> Result<StockReservation>;
    /// Gives back stock taken by `reserve_stock`.
    async fn release_stock(&self, id: ProductId, qty: u32) -> Result<Option<Product>>;
    async fn delete_product(&self, id: ProductId) -> Result<bool>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert_account(&self, account: &Account) -> Result<()>;
    async fn account(&self, id: AccountId) -> Result<Option<Account>>;
    /// Oldest first.
    async fn accounts(&self) -> Result<Vec<Account>>;
    /// Applies `update` in one write and returns the account as stored afterwards.
    async fn update_profile(&self, id: AccountId, update: &ProfileUpdate) -> Result<Option<Account>>;
    /// The account's cart; an account that never saved one gets an empty cart at version 0.
    async fn cart(&self, account_id: AccountId) -> Result<Cart>;
    /// Compare-and-set on `cart.version`. Fails with `Conflict` when another write got there first.
    async fn save_cart(&self, cart: &Cart) -> Result<Cart>;
}

#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<()>;
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;
    /// Newest first.
    async fn orders_for_consumer(&self, consumer: AccountId) -> Result<Vec<Order>>;
    /// Newest first.
    async fn orders_for_farmer(&self, farmer: AccountId) -> Result<Vec<Order>>;
    /// Newest first.
    async fn all_orders(&self) -> Result<Vec<Order>>;
    /// Persists the status fields of `order` only if the stored status is still `from`.
    async fn commit_transition(&self, order: &Order, from: OrderStatus) -> Result<bool>;
}

#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn CatalogStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub orders: Arc<dyn OrderLedger>,
}

impl Stores {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self { catalog: store.clone(), accounts: store.clone(), orders: store }
    }

    pub fn postgres(store: PgStore) -> Self {
        let store = Arc::new(store);
        Self { catalog: store.clone(), accounts: store.clone(), orders: store }
    }
}
