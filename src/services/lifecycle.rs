//! Order Lifecycle
//!
//! Reads scoped to the caller, and status transitions driven by the order's farmer or an admin.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::aggregates::{OrderStatus, PaymentStatus, Role};
use crate::domain::value_objects::{Money, OrderId};
use crate::publisher::{publish_all, EventPublisher};
use crate::services::presenter::{OrderDetails, OrderPresenter};
use crate::services::Caller;
use crate::store::OrderLedger;
use crate::{MarketError, Result};

const RECENT_ORDERS: usize = 5;

/// A farmer's sales summary. Only paid orders count towards earnings.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Earnings {
    pub total_earnings: Money,
    pub paid_orders: usize,
    pub open_orders: usize,
    pub recent_orders: Vec<OrderDetails>,
}

#[derive(Clone)]
pub struct OrderLifecycle {
    orders: Arc<dyn OrderLedger>,
    publisher: Arc<dyn EventPublisher>,
    presenter: OrderPresenter,
}

impl OrderLifecycle {
    pub fn new(orders: Arc<dyn OrderLedger>, publisher: Arc<dyn EventPublisher>, presenter: OrderPresenter) -> Self {
        Self { orders, publisher, presenter }
    }

    pub async fn orders_for_consumer(&self, caller: Caller) -> Result<Vec<OrderDetails>> {
        let orders = self.orders.orders_for_consumer(caller.id).await?;
        self.presenter.present_all(orders).await
    }

    pub async fn orders_for_farmer(&self, caller: Caller) -> Result<Vec<OrderDetails>> {
        caller.require(Role::Farmer)?;
        let orders = self.orders.orders_for_farmer(caller.id).await?;
        self.presenter.present_all(orders).await
    }

    pub async fn all_orders(&self, caller: Caller) -> Result<Vec<OrderDetails>> {
        caller.require(Role::Admin)?;
        let orders = self.orders.all_orders().await?;
        self.presenter.present_all(orders).await
    }

    pub async fn order(&self, caller: Caller, id: OrderId) -> Result<OrderDetails> {
        let order = self.orders.order(id).await?.ok_or_else(|| not_found(id))?;
        if !caller.is_admin() && caller.id != order.consumer() && caller.id != order.farmer() {
            return Err(MarketError::Forbidden("not a party to this order".into()));
        }
        self.presenter.present(order).await
    }

    #[instrument(skip_all, fields(caller = %caller.id, order = %id, next = %next))]
    pub async fn update_status(&self, caller: Caller, id: OrderId, next: OrderStatus) -> Result<OrderDetails> {
        let mut order = self.orders.order(id).await?.ok_or_else(|| not_found(id))?;
        if !caller.is_admin() && caller.id != order.farmer() {
            return Err(MarketError::Forbidden("only the order's farmer or an admin may change its status".into()));
        }
        let from = order.status();
        order.transition(next, Utc::now())?;
        if !self.orders.commit_transition(&order, from).await? {
            warn!(%from, "order status changed underneath this transition");
            return Err(MarketError::Conflict(format!("order {id} is no longer {from}, reload and retry")));
        }
        info!(%from, "order status updated");
        publish_all(self.publisher.as_ref(), order.take_events()).await;
        self.presenter.present(order).await
    }

    pub async fn earnings(&self, caller: Caller) -> Result<Earnings> {
        caller.require(Role::Farmer)?;
        let orders = self.orders.orders_for_farmer(caller.id).await?;
        let open_orders = orders.iter().filter(|o| o.status().is_open()).count();
        let paid: Vec<_> = orders.into_iter().filter(|o| o.payment_status() == PaymentStatus::Paid).collect();
        let total_earnings = Money::total(paid.iter().map(|o| o.total_amount()))?;
        let paid_orders = paid.len();
        let recent_orders = self.presenter.present_all(paid.into_iter().take(RECENT_ORDERS).collect()).await?;
        Ok(Earnings { total_earnings, paid_orders, open_orders, recent_orders })
    }
}

fn not_found(id: OrderId) -> MarketError { MarketError::NotFound(format!("order {id} not found")) }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Product;
    use crate::domain::events::{DomainEvent, OrderEvent};
    use crate::services::fixtures::{market, Market};
    use crate::services::{OrderLine, PlaceOrder};
    use rust_decimal::Decimal;

    async fn place(m: &Market, product: &Product, quantity: u32) -> OrderId {
        let request = PlaceOrder { lines: vec![OrderLine { product_id: product.id(), quantity }], ..Default::default() };
        m.services.ordering.place_order(m.consumer.id, request).await.unwrap().order.id()
    }

    #[tokio::test]
    async fn test_farmer_walks_order_to_delivery() {
        let m = market().await;
        let p = m.list(m.farmer, "Bananas", 60, 10).await;
        let id = place(&m, &p, 2).await;
        for next in [OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Shipped] {
            let updated = m.services.lifecycle.update_status(m.farmer, id, next).await.unwrap();
            assert_eq!(updated.order.status(), next);
            assert_eq!(updated.order.payment_status(), PaymentStatus::Pending);
        }
        let delivered = m.services.lifecycle.update_status(m.farmer, id, OrderStatus::Delivered).await.unwrap();
        assert_eq!(delivered.order.payment_status(), PaymentStatus::Paid);
        assert!(delivered.order.delivery_date().is_some());
        let status_events = m.events.events().into_iter()
            .filter(|e| matches!(e, DomainEvent::Order(OrderEvent::StatusChanged { .. })))
            .count();
        assert_eq!(status_events, 4);
    }

    #[tokio::test]
    async fn test_undefined_edge_leaves_status() {
        let m = market().await;
        let p = m.list(m.farmer, "Guava", 40, 10).await;
        let id = place(&m, &p, 1).await;
        m.services.lifecycle.update_status(m.farmer, id, OrderStatus::Confirmed).await.unwrap();
        m.services.lifecycle.update_status(m.farmer, id, OrderStatus::Processing).await.unwrap();
        m.services.lifecycle.update_status(m.farmer, id, OrderStatus::Shipped).await.unwrap();
        let err = m.services.lifecycle.update_status(m.farmer, id, OrderStatus::Pending).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
        let err = m.services.lifecycle.update_status(m.admin, id, OrderStatus::Cancelled).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
        let current = m.services.lifecycle.order(m.consumer, id).await.unwrap();
        assert_eq!(current.order.status(), OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_only_farmer_or_admin_transitions() {
        let m = market().await;
        let p = m.list(m.farmer, "Papaya", 50, 10).await;
        let id = place(&m, &p, 1).await;
        assert_eq!(m.services.lifecycle.update_status(m.consumer, id, OrderStatus::Cancelled).await.unwrap_err().kind(), "forbidden");
        assert_eq!(m.services.lifecycle.update_status(m.other_farmer, id, OrderStatus::Confirmed).await.unwrap_err().kind(), "forbidden");
        let cancelled = m.services.lifecycle.update_status(m.admin, id, OrderStatus::Cancelled).await.unwrap();
        assert_eq!(cancelled.order.status(), OrderStatus::Cancelled);
        let missing = m.services.lifecycle.update_status(m.admin, OrderId::new(), OrderStatus::Confirmed).await.unwrap_err();
        assert_eq!(missing.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_stale_transition_conflicts() {
        let m = market().await;
        let p = m.list(m.farmer, "Figs", 90, 10).await;
        let id = place(&m, &p, 1).await;
        let mut stale = m.services.stores.orders.order(id).await.unwrap().unwrap();
        m.services.lifecycle.update_status(m.farmer, id, OrderStatus::Cancelled).await.unwrap();
        stale.transition(OrderStatus::Confirmed, Utc::now()).unwrap();
        assert!(!m.services.stores.orders.commit_transition(&stale, OrderStatus::Pending).await.unwrap());
        let current = m.services.lifecycle.order(m.farmer, id).await.unwrap();
        assert_eq!(current.order.status(), OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_order_visibility() {
        let m = market().await;
        let p = m.list(m.farmer, "Plums", 110, 10).await;
        let id = place(&m, &p, 1).await;
        assert!(m.services.lifecycle.order(m.consumer, id).await.is_ok());
        assert!(m.services.lifecycle.order(m.farmer, id).await.is_ok());
        assert!(m.services.lifecycle.order(m.admin, id).await.is_ok());
        assert_eq!(m.services.lifecycle.order(m.other_farmer, id).await.unwrap_err().kind(), "forbidden");
        assert_eq!(m.services.lifecycle.order(m.consumer, OrderId::new()).await.unwrap_err().kind(), "not_found");
    }

    #[tokio::test]
    async fn test_listings_by_role() {
        let m = market().await;
        let p = m.list(m.farmer, "Pears", 80, 10).await;
        let first = place(&m, &p, 1).await;
        let second = place(&m, &p, 2).await;
        let mine = m.services.lifecycle.orders_for_consumer(m.consumer).await.unwrap();
        assert_eq!(mine.iter().map(|d| d.order.id()).collect::<Vec<_>>(), vec![second, first]);
        assert_eq!(m.services.lifecycle.orders_for_farmer(m.farmer).await.unwrap().len(), 2);
        assert!(m.services.lifecycle.orders_for_farmer(m.other_farmer).await.unwrap().is_empty());
        assert_eq!(m.services.lifecycle.orders_for_farmer(m.consumer).await.unwrap_err().kind(), "forbidden");
        assert_eq!(m.services.lifecycle.all_orders(m.admin).await.unwrap().len(), 2);
        assert_eq!(m.services.lifecycle.all_orders(m.farmer).await.unwrap_err().kind(), "forbidden");
        let detail = &mine[0];
        assert_eq!(detail.farmer.as_ref().map(|f| f.name.as_str()), Some("Ravi"));
        assert_eq!(detail.consumer.as_ref().map(|c| c.name.as_str()), Some("Kiran"));
    }

    #[tokio::test]
    async fn test_earnings_count_paid_orders_only() {
        let m = market().await;
        let p = m.list(m.farmer, "Honey", 250, 20).await;
        let delivered = place(&m, &p, 2).await;
        let confirmed = place(&m, &p, 1).await;
        let cancelled = place(&m, &p, 1).await;
        let _pending = place(&m, &p, 3).await;
        m.services.lifecycle.update_status(m.farmer, delivered, OrderStatus::Delivered).await.unwrap();
        m.services.lifecycle.update_status(m.farmer, confirmed, OrderStatus::Confirmed).await.unwrap();
        m.services.lifecycle.update_status(m.farmer, cancelled, OrderStatus::Cancelled).await.unwrap();

        let earnings = m.services.lifecycle.earnings(m.farmer).await.unwrap();
        assert_eq!(earnings.total_earnings.amount(), Decimal::new(500, 0));
        assert_eq!(earnings.paid_orders, 1);
        assert_eq!(earnings.open_orders, 2);
        assert_eq!(earnings.recent_orders.len(), 1);
        assert_eq!(earnings.recent_orders[0].order.id(), delivered);
        assert_eq!(m.services.lifecycle.earnings(m.admin).await.unwrap_err().kind(), "forbidden");
    }
}
