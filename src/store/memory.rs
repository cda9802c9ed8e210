//! In-process store backed by `tokio::sync` locks.
//!
//! Each trait method holds the relevant lock for its whole read-check-write, which gives the
//! same per-record atomicity the SQL backend gets from conditional updates.

use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

use super::{AccountStore, CatalogStore, OrderLedger, ProductFilter, StockReservation};
use crate::domain::aggregates::{Account, Cart, Order, OrderStatus, Product, ProfileUpdate};
use crate::domain::value_objects::{AccountId, OrderId, ProductId, Quantity};
use crate::{MarketError, Result};

#[derive(Default)]
pub struct MemoryStore {
    products: RwLock<HashMap<ProductId, Product>>,
    accounts: RwLock<HashMap<AccountId, Account>>,
    carts: Mutex<HashMap<AccountId, Cart>>,
    orders: RwLock<HashMap<OrderId, Order>>,
}

fn stored(order: &Order) -> Order {
    let mut copy = order.clone();
    copy.events.clear();
    copy
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by_key(|o| Reverse((o.order_date, o.id)));
    orders
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_product(&self, product: &Product) -> Result<()> {
        self.products.write().await.insert(product.id(), product.clone());
        Ok(())
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut found: Vec<Product> = self.products.read().await.values().filter(|p| filter.matches(p)).cloned().collect();
        found.sort_by_key(|p| Reverse((p.created_at, p.id)));
        Ok(found)
    }

    async fn save_details(&self, product: &Product) -> Result<bool> {
        let mut products = self.products.write().await;
        let Some(current) = products.get_mut(&product.id()) else { return Ok(false) };
        let (quantity, is_available, farmer) = (current.quantity, current.is_available, current.farmer);
        *current = product.clone();
        current.quantity = quantity;
        current.is_available = is_available;
        current.farmer = farmer;
        Ok(true)
    }

    async fn set_stock(&self, id: ProductId, quantity: Quantity) -> Result<Option<Product>> {
        let mut products = self.products.write().await;
        Ok(products.get_mut(&id).map(|p| { p.restock(quantity.value()); p.clone() }))
    }

    async fn reserve_stock(&self, id: ProductId, qty: u32) -> Result<StockReservation> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(&id) else { return Ok(StockReservation::Missing) };
        match product.withdraw(qty) {
            Ok(()) => Ok(StockReservation::Reserved(product.clone())),
            Err(_) => Ok(StockReservation::Insufficient { available: product.quantity().value() }),
        }
    }

    async fn release_stock(&self, id: ProductId, qty: u32) -> Result<Option<Product>> {
        let mut products = self.products.write().await;
        Ok(products.get_mut(&id).map(|p| { p.replenish(qty); p.clone() }))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        Ok(self.products.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_account(&self, account: &Account) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| a.email() == account.email()) {
            return Err(MarketError::Conflict(format!("email {} is already registered", account.email())));
        }
        accounts.insert(account.id(), account.clone());
        Ok(())
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        let mut all: Vec<Account> = self.accounts.read().await.values().cloned().collect();
        all.sort_by_key(|a| (a.created_at, a.id));
        Ok(all)
    }

    async fn update_profile(&self, id: AccountId, update: &ProfileUpdate) -> Result<Option<Account>> {
        let mut accounts = self.accounts.write().await;
        Ok(accounts.get_mut(&id).map(|a| { a.apply_profile(update); a.clone() }))
    }

    async fn cart(&self, account_id: AccountId) -> Result<Cart> {
        Ok(self.carts.lock().await.get(&account_id).cloned().unwrap_or_else(|| Cart::new(account_id)))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<Cart> {
        let mut carts = self.carts.lock().await;
        let current = carts.get(&cart.account_id()).map_or(0, Cart::version);
        if current != cart.version() {
            return Err(MarketError::Conflict("cart was modified concurrently, reload and retry".into()));
        }
        let mut saved = cart.clone();
        saved.version += 1;
        carts.insert(saved.account_id(), saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl OrderLedger for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id()) {
            return Err(MarketError::Conflict(format!("order {} already exists", order.id())));
        }
        orders.insert(order.id(), stored(order));
        Ok(())
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn orders_for_consumer(&self, consumer: AccountId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(newest_first(orders.values().filter(|o| o.consumer() == consumer).cloned().collect()))
    }

    async fn orders_for_farmer(&self, farmer: AccountId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(newest_first(orders.values().filter(|o| o.farmer() == farmer).cloned().collect()))
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        Ok(newest_first(self.orders.read().await.values().cloned().collect()))
    }

    async fn commit_transition(&self, order: &Order, from: OrderStatus) -> Result<bool> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order.id()) {
            Some(current) if current.status() == from => {
                current.status = order.status();
                current.payment_status = order.payment_status();
                current.delivery_date = order.delivery_date();
                current.updated_at = order.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
