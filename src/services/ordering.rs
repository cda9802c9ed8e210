//! Order Placement
//!
//! Placement runs in two passes. The validation pass reads every product and builds the line
//! snapshots without touching stock. The commit pass then takes stock line by line through the
//! store's conditional decrement; if any decrement loses a race, the ones already taken by this
//! call are given back before the error is returned. A rejected order therefore never leaves
//! stock behind.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::aggregates::{Address, Cart, LineItem, Order, PaymentMethod, Product};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{AccountId, ProductId};
use crate::publisher::{publish_all, EventPublisher};
use crate::services::presenter::{OrderDetails, OrderPresenter};
use crate::store::{StockReservation, Stores};
use crate::{MarketError, Result};

const CART_CLEAR_ATTEMPTS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Clone, Debug, Default)]
pub struct PlaceOrder {
    pub lines: Vec<OrderLine>,
    /// Defaults to the consumer's stored address.
    pub shipping_address: Option<Address>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Clone)]
pub struct OrderPlacement {
    stores: Stores,
    publisher: Arc<dyn EventPublisher>,
    presenter: OrderPresenter,
}

impl OrderPlacement {
    pub fn new(stores: Stores, publisher: Arc<dyn EventPublisher>, presenter: OrderPresenter) -> Self {
        Self { stores, publisher, presenter }
    }

    #[instrument(skip_all, fields(consumer = %consumer, lines = request.lines.len()))]
    pub async fn place_order(&self, consumer: AccountId, request: PlaceOrder) -> Result<OrderDetails> {
        let account = self.stores.accounts.account(consumer).await?
            .ok_or_else(|| MarketError::NotFound(format!("account {consumer} not found")))?;
        let (farmer, items) = self.validate(&request.lines).await?;
        let shipping = request.shipping_address.or_else(|| account.address().cloned());
        let mut order = Order::place(consumer, farmer, items, shipping, request.payment_method.unwrap_or_default())?;

        let reserved = self.reserve_all(order.items()).await?;
        if let Err(err) = self.stores.orders.insert_order(&order).await {
            warn!(order_id = %order.id(), error = %err, "order insert failed, returning stock");
            self.release_all(order.items()).await;
            return Err(err);
        }
        info!(order_id = %order.id(), farmer = %farmer, total = %order.total_amount(), "order placed");

        let mut events = order.take_events();
        events.extend(reserved.iter().filter(|p| !p.is_available()).map(|p| {
            DomainEvent::Product(ProductEvent::StockDepleted { product_id: p.id(), farmer: p.farmer() })
        }));
        publish_all(self.publisher.as_ref(), events).await;
        self.presenter.present(order).await
    }

    /// Places an order for everything in the consumer's cart, then empties the cart. If the cart
    /// changed after it was read, only the lines that were ordered are removed.
    #[instrument(skip_all, fields(consumer = %consumer))]
    pub async fn checkout_cart(
        &self,
        consumer: AccountId,
        shipping_address: Option<Address>,
        payment_method: Option<PaymentMethod>,
    ) -> Result<OrderDetails> {
        let cart = self.stores.accounts.cart(consumer).await?;
        if cart.is_empty() { return Err(MarketError::InvalidArgument("cart is empty".into())); }
        let lines: Vec<OrderLine> = cart.lines().iter().map(|l| OrderLine { product_id: l.product_id, quantity: l.quantity }).collect();
        let ordered: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let details = self.place_order(consumer, PlaceOrder { lines, shipping_address, payment_method }).await?;
        if let Err(err) = self.remove_ordered(cart, &ordered).await {
            warn!(order_id = %details.order.id(), error = %err, "order placed but cart could not be cleared");
        }
        Ok(details)
    }

    /// Empties `cart` with a version check. When another write got there first, the cart is
    /// reloaded and just the ordered products are taken out, up to `CART_CLEAR_ATTEMPTS` times.
    async fn remove_ordered(&self, mut cart: Cart, ordered: &[ProductId]) -> Result<()> {
        cart.clear();
        for _ in 0..CART_CLEAR_ATTEMPTS {
            match self.stores.accounts.save_cart(&cart).await {
                Ok(_) => return Ok(()),
                Err(MarketError::Conflict(_)) => {
                    cart = self.stores.accounts.cart(cart.account_id()).await?;
                    let mut removed = false;
                    for id in ordered { removed |= cart.remove_item(*id); }
                    if !removed { return Ok(()); }
                    debug!(account = %cart.account_id(), "cart changed during checkout, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        Err(MarketError::Conflict("cart kept changing during checkout".into()))
    }

    async fn validate(&self, lines: &[OrderLine]) -> Result<(AccountId, Vec<LineItem>)> {
        if lines.is_empty() { return Err(MarketError::InvalidArgument("at least one item is required".into())); }
        let mut seen = HashSet::with_capacity(lines.len());
        let mut farmer = None;
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity < 1 {
                return Err(MarketError::InvalidArgument(format!("quantity for product {} must be at least 1", line.product_id)));
            }
            if !seen.insert(line.product_id) {
                return Err(MarketError::InvalidArgument(format!("product {} appears more than once", line.product_id)));
            }
            let product = self.stores.catalog.product(line.product_id).await?
                .ok_or_else(|| MarketError::NotFound(format!("product {} not found", line.product_id)))?;
            if !product.has_stock_for(line.quantity) {
                return Err(out_of_stock(&product, line.quantity));
            }
            match farmer {
                None => farmer = Some(product.farmer()),
                Some(f) if f != product.farmer() => {
                    return Err(MarketError::InvalidArgument("all items in an order must come from the same farmer (mixed farmers)".into()));
                }
                Some(_) => {}
            }
            items.push(LineItem { product_id: product.id(), quantity: line.quantity, price: product.price() });
        }
        let farmer = farmer.ok_or_else(|| MarketError::InvalidArgument("at least one item is required".into()))?;
        Ok((farmer, items))
    }

    /// Takes stock for each item in order. On the first failure, everything taken so far is returned.
    async fn reserve_all(&self, items: &[LineItem]) -> Result<Vec<Product>> {
        let mut reserved = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let failure = match self.stores.catalog.reserve_stock(item.product_id, item.quantity).await {
                Ok(StockReservation::Reserved(product)) => { reserved.push(product); continue; }
                Ok(StockReservation::Missing) => MarketError::NotFound(format!("product {} not found", item.product_id)),
                Ok(StockReservation::Insufficient { available }) => MarketError::OutOfStock(format!(
                    "product {} has {available} left, {} requested", item.product_id, item.quantity
                )),
                Err(err) => err,
            };
            warn!(product = %item.product_id, error = %failure, "stock reservation lost a race, compensating");
            self.release_all(&items[..i]).await;
            return Err(failure);
        }
        Ok(reserved)
    }

    async fn release_all(&self, items: &[LineItem]) {
        for item in items {
            if let Err(err) = self.stores.catalog.release_stock(item.product_id, item.quantity).await {
                error!(product = %item.product_id, quantity = item.quantity, error = %err, "failed to return reserved stock");
            }
        }
    }
}

fn out_of_stock(product: &Product, requested: u32) -> MarketError {
    if product.is_available() {
        MarketError::OutOfStock(format!("{} has {} left, {requested} requested", product.name(), product.quantity().value()))
    } else {
        MarketError::OutOfStock(format!("{} is out of stock", product.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Account, OrderStatus, PaymentStatus, ProductEdit, ProfileUpdate};
    use crate::domain::events::OrderEvent;
    use crate::domain::value_objects::{Money, OrderId, Quantity};
    use crate::services::fixtures::{address, market, market_with};
    use crate::store::{AccountStore, CatalogStore, MemoryStore, OrderLedger, ProductFilter};
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    fn order_of(lines: &[(&Product, u32)]) -> PlaceOrder {
        PlaceOrder {
            lines: lines.iter().map(|(p, q)| OrderLine { product_id: p.id(), quantity: *q }).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_order_takes_stock_until_exhausted() {
        let m = market().await;
        let p = m.list(m.farmer, "Tomatoes", 40, 5).await;
        let details = m.services.ordering.place_order(m.consumer.id, order_of(&[(&p, 3)])).await.unwrap();
        assert_eq!(details.order.total_amount().amount(), Decimal::new(120, 0));
        assert_eq!(details.order.status(), OrderStatus::Pending);
        assert_eq!(details.order.payment_status(), PaymentStatus::Pending);
        assert_eq!(details.order.farmer(), m.farmer.id);
        assert_eq!(details.lines[0].name.as_deref(), Some("Tomatoes"));
        assert_eq!(m.stock_of(&p).await, 2);

        let err = m.services.ordering.place_order(m.consumer.id, order_of(&[(&p, 3)])).await.unwrap_err();
        assert_eq!(err.kind(), "out_of_stock");
        assert_eq!(m.stock_of(&p).await, 2);
    }

    #[tokio::test]
    async fn test_mixed_farmers_leave_no_trace() {
        let m = market().await;
        let a = m.list(m.farmer, "Spinach", 20, 5).await;
        let b = m.list(m.other_farmer, "Apples", 150, 5).await;
        let err = m.services.ordering.place_order(m.consumer.id, order_of(&[(&a, 2), (&b, 1)])).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
        assert!(err.to_string().contains("mixed farmers"));
        assert_eq!(m.stock_of(&a).await, 5);
        assert_eq!(m.stock_of(&b).await, 5);
        assert!(m.services.stores.orders.all_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_lines() {
        let m = market().await;
        let p = m.list(m.farmer, "Onions", 30, 5).await;
        let place = |req| m.services.ordering.place_order(m.consumer.id, req);
        assert_eq!(place(PlaceOrder::default()).await.unwrap_err().kind(), "invalid_argument");
        assert_eq!(place(order_of(&[(&p, 0)])).await.unwrap_err().kind(), "invalid_argument");
        assert_eq!(place(order_of(&[(&p, 1), (&p, 1)])).await.unwrap_err().kind(), "invalid_argument");
        let missing = PlaceOrder { lines: vec![OrderLine { product_id: ProductId::new(), quantity: 1 }], ..Default::default() };
        assert_eq!(place(missing).await.unwrap_err().kind(), "not_found");
        let err = m.services.ordering.place_order(AccountId::new(), order_of(&[(&p, 1)])).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(m.stock_of(&p).await, 5);
    }

    #[tokio::test]
    async fn test_late_line_out_of_stock_takes_nothing() {
        let m = market().await;
        let a = m.list(m.farmer, "Cabbage", 25, 5).await;
        let b = m.list(m.farmer, "Cauliflower", 35, 1).await;
        let err = m.services.ordering.place_order(m.consumer.id, order_of(&[(&a, 2), (&b, 2)])).await.unwrap_err();
        assert_eq!(err.kind(), "out_of_stock");
        assert_eq!(m.stock_of(&a).await, 5);
    }

    #[tokio::test]
    async fn test_prices_frozen_at_placement() {
        let m = market().await;
        let p = m.list(m.farmer, "Potatoes", 20, 10).await;
        let placed = m.services.ordering.place_order(m.consumer.id, order_of(&[(&p, 2)])).await.unwrap();
        let edit = ProductEdit { price: Some(Money::new(Decimal::new(99, 0)).unwrap()), ..Default::default() };
        m.services.catalog.update(m.farmer, p.id(), edit).await.unwrap();
        let reread = m.services.lifecycle.order(m.consumer, placed.order.id()).await.unwrap();
        assert_eq!(reread.order.items()[0].price.amount(), Decimal::new(20, 0));
        assert_eq!(reread.order.total_amount().amount(), Decimal::new(40, 0));
    }

    #[tokio::test]
    async fn test_order_at_price_limit() {
        let m = market().await;
        let p = m.list_at(m.farmer, "Kesar Saffron", Money::max(), 10).await;
        let placed = m.services.ordering.place_order(m.consumer.id, order_of(&[(&p, 1)])).await.unwrap();
        assert_eq!(placed.order.total_amount(), Money::max());
        assert_eq!(placed.lines[0].total, Money::max());

        let err = m.services.ordering.place_order(m.consumer.id, order_of(&[(&p, 3)])).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
        assert_eq!(m.stock_of(&p).await, 9);
    }

    #[tokio::test]
    async fn test_shipping_defaults_to_account_address() {
        let m = market().await;
        let p = m.list(m.farmer, "Lemons", 5, 10).await;
        let placed = m.services.ordering.place_order(m.consumer.id, order_of(&[(&p, 1)])).await.unwrap();
        assert_eq!(placed.order.shipping_address(), Some(&address("Bengaluru")));
        assert_eq!(placed.order.payment_method(), PaymentMethod::Cash);

        let explicit = PlaceOrder { shipping_address: Some(address("Hubli")), payment_method: Some(PaymentMethod::Upi), ..order_of(&[(&p, 1)]) };
        let placed = m.services.ordering.place_order(m.consumer.id, explicit).await.unwrap();
        assert_eq!(placed.order.shipping_address().map(|a| a.city.as_str()), Some("Hubli"));
        assert_eq!(placed.order.payment_method(), PaymentMethod::Upi);
        assert_eq!(placed.order.payment_status(), PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_events_published_after_commit() {
        let m = market().await;
        let p = m.list(m.farmer, "Mint", 10, 2).await;
        let placed = m.services.ordering.place_order(m.consumer.id, order_of(&[(&p, 2)])).await.unwrap();
        let events = m.events.events();
        assert!(events.iter().any(|e| matches!(e, DomainEvent::Order(OrderEvent::Placed { order_id, .. }) if *order_id == placed.order.id())));
        assert!(events.contains(&DomainEvent::Product(ProductEvent::StockDepleted { product_id: p.id(), farmer: m.farmer.id })));
        let listed = m.services.catalog.list(ProductFilter::default()).await.unwrap();
        assert!(listed.iter().all(|l| l.id() != p.id()));
    }

    #[tokio::test]
    async fn test_checkout_empties_cart() {
        let m = market().await;
        let a = m.list(m.farmer, "Brinjal", 30, 4).await;
        let b = m.list(m.farmer, "Chillies", 60, 4).await;
        assert_eq!(m.services.ordering.checkout_cart(m.consumer.id, None, None).await.unwrap_err().kind(), "invalid_argument");
        m.services.cart.add_item(m.consumer.id, a.id(), 2).await.unwrap();
        m.services.cart.add_item(m.consumer.id, b.id(), 1).await.unwrap();
        let placed = m.services.ordering.checkout_cart(m.consumer.id, None, Some(PaymentMethod::Online)).await.unwrap();
        assert_eq!(placed.order.items().len(), 2);
        assert_eq!(placed.order.total_amount().amount(), Decimal::new(120, 0));
        assert!(m.services.cart.view(m.consumer.id).await.unwrap().lines.is_empty());
        assert_eq!(m.stock_of(&a).await, 2);
        assert_eq!(m.stock_of(&b).await, 3);
    }

    #[tokio::test]
    async fn test_concurrent_orders_never_oversell() {
        let m = market().await;
        let p = m.list(m.farmer, "Pumpkin", 45, 10).await;
        let mut handles = vec![];
        for _ in 0..6 {
            let ordering = m.services.ordering.clone();
            let (consumer, id) = (m.consumer.id, p.id());
            handles.push(tokio::spawn(async move {
                ordering.place_order(consumer, PlaceOrder { lines: vec![OrderLine { product_id: id, quantity: 3 }], ..Default::default() }).await
            }));
        }
        let mut placed = 0;
        for h in handles {
            if h.await.unwrap().is_ok() { placed += 1; }
        }
        assert_eq!(placed, 3);
        assert_eq!(m.stock_of(&p).await, 1);
    }

    /// Catalog whose conditional decrement always loses for one chosen product.
    struct RacingCatalog {
        inner: Arc<MemoryStore>,
        loses: std::sync::Mutex<Option<ProductId>>,
    }

    #[async_trait]
    impl CatalogStore for RacingCatalog {
        async fn insert_product(&self, product: &Product) -> Result<()> { self.inner.insert_product(product).await }
        async fn product(&self, id: ProductId) -> Result<Option<Product>> { self.inner.product(id).await }
        async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>> { self.inner.products(filter).await }
        async fn save_details(&self, product: &Product) -> Result<bool> { self.inner.save_details(product).await }
        async fn set_stock(&self, id: ProductId, quantity: Quantity) -> Result<Option<Product>> { self.inner.set_stock(id, quantity).await }
        async fn reserve_stock(&self, id: ProductId, qty: u32) -> Result<StockReservation> {
            if *self.loses.lock().unwrap() == Some(id) { return Ok(StockReservation::Insufficient { available: 0 }); }
            self.inner.reserve_stock(id, qty).await
        }
        async fn release_stock(&self, id: ProductId, qty: u32) -> Result<Option<Product>> { self.inner.release_stock(id, qty).await }
        async fn delete_product(&self, id: ProductId) -> Result<bool> { self.inner.delete_product(id).await }
    }

    #[tokio::test]
    async fn test_commit_failure_restores_earlier_lines() {
        let memory = Arc::new(MemoryStore::default());
        let catalog = Arc::new(RacingCatalog { inner: memory.clone(), loses: Default::default() });
        let m = market_with(Stores { catalog: catalog.clone(), accounts: memory.clone(), orders: memory.clone() }).await;
        let a = m.list(m.farmer, "Corn", 15, 5).await;
        let b = m.list(m.farmer, "Millet", 70, 5).await;
        let c = m.list(m.farmer, "Ragi", 80, 5).await;
        *catalog.loses.lock().unwrap() = Some(c.id());
        let err = m.services.ordering.place_order(m.consumer.id, order_of(&[(&a, 2), (&b, 3), (&c, 1)])).await.unwrap_err();
        assert_eq!(err.kind(), "out_of_stock");
        assert_eq!(m.stock_of(&a).await, 5);
        assert_eq!(m.stock_of(&b).await, 5);
        assert!(memory.all_orders().await.unwrap().is_empty());
    }

    /// Account store that slips one extra line into the stored cart just before the next cart
    /// write, so that write loses its version check.
    struct InterleavedCarts {
        inner: Arc<MemoryStore>,
        interloper: std::sync::Mutex<Option<Product>>,
    }

    #[async_trait]
    impl AccountStore for InterleavedCarts {
        async fn insert_account(&self, account: &Account) -> Result<()> { self.inner.insert_account(account).await }
        async fn account(&self, id: AccountId) -> Result<Option<Account>> { self.inner.account(id).await }
        async fn accounts(&self) -> Result<Vec<Account>> { self.inner.accounts().await }
        async fn update_profile(&self, id: AccountId, update: &ProfileUpdate) -> Result<Option<Account>> { self.inner.update_profile(id, update).await }
        async fn cart(&self, account_id: AccountId) -> Result<Cart> { self.inner.cart(account_id).await }
        async fn save_cart(&self, cart: &Cart) -> Result<Cart> {
            let interloper = self.interloper.lock().unwrap().take();
            if let Some(product) = interloper {
                let mut current = self.inner.cart(cart.account_id()).await?;
                current.add_item(&product, 1)?;
                self.inner.save_cart(&current).await?;
            }
            self.inner.save_cart(cart).await
        }
    }

    #[tokio::test]
    async fn test_checkout_keeps_lines_added_meanwhile() {
        let memory = Arc::new(MemoryStore::default());
        let carts = Arc::new(InterleavedCarts { inner: memory.clone(), interloper: Default::default() });
        let m = market_with(Stores { catalog: memory.clone(), accounts: carts.clone(), orders: memory.clone() }).await;
        let ordered = m.list(m.farmer, "Coconuts", 25, 10).await;
        let later = m.list(m.farmer, "Jaggery", 90, 10).await;
        m.services.cart.add_item(m.consumer.id, ordered.id(), 2).await.unwrap();
        *carts.interloper.lock().unwrap() = Some(later.clone());

        let placed = m.services.ordering.checkout_cart(m.consumer.id, None, None).await.unwrap();
        assert_eq!(placed.order.items().len(), 1);
        let cart = m.services.cart.view(m.consumer.id).await.unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].product_id, later.id());
        assert_eq!(m.stock_of(&ordered).await, 8);
    }

    /// Ledger that refuses every insert.
    struct BrokenLedger(Arc<MemoryStore>);

    #[async_trait]
    impl OrderLedger for BrokenLedger {
        async fn insert_order(&self, _order: &Order) -> Result<()> { Err(MarketError::Storage("connection reset".into())) }
        async fn order(&self, id: OrderId) -> Result<Option<Order>> { self.0.order(id).await }
        async fn orders_for_consumer(&self, consumer: AccountId) -> Result<Vec<Order>> { self.0.orders_for_consumer(consumer).await }
        async fn orders_for_farmer(&self, farmer: AccountId) -> Result<Vec<Order>> { self.0.orders_for_farmer(farmer).await }
        async fn all_orders(&self) -> Result<Vec<Order>> { self.0.all_orders().await }
        async fn commit_transition(&self, order: &Order, from: OrderStatus) -> Result<bool> { self.0.commit_transition(order, from).await }
    }

    #[tokio::test]
    async fn test_insert_failure_restores_stock() {
        let memory = Arc::new(MemoryStore::default());
        let m = market_with(Stores { catalog: memory.clone(), accounts: memory.clone(), orders: Arc::new(BrokenLedger(memory.clone())) }).await;
        let p = m.list(m.farmer, "Turmeric", 200, 4).await;
        let err = m.services.ordering.place_order(m.consumer.id, order_of(&[(&p, 4)])).await.unwrap_err();
        assert_eq!(err.kind(), "storage");
        assert_eq!(m.stock_of(&p).await, 4);
        assert!(memory.product(p.id()).await.unwrap().unwrap().is_available());
        assert!(m.events.events().iter().all(|e| !matches!(e, DomainEvent::Order(_))));
    }
}
