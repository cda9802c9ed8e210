//! Admin Analytics
//!
//! Marketplace-wide counts for the admin dashboard, computed from a full read of each store.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::aggregates::{OrderStatus, PaymentStatus, Role};
use crate::services::Caller;
use crate::store::{ProductFilter, Stores};
use crate::Result;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCounts {
    pub total: usize,
    pub farmers: usize,
    pub consumers: usize,
    pub admins: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCounts {
    pub total: usize,
    pub approved: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCounts {
    pub total: usize,
    /// Every status is present, with zero when no order is in it.
    pub by_status: BTreeMap<&'static str, usize>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAnalytics {
    pub users: UserCounts,
    pub products: ProductCounts,
    pub orders: OrderCounts,
    /// Sum of paid order totals.
    pub revenue: Decimal,
    pub products_by_category: BTreeMap<&'static str, usize>,
}

#[derive(Clone)]
pub struct AdminAnalytics {
    stores: Stores,
}

impl AdminAnalytics {
    pub fn new(stores: Stores) -> Self { Self { stores } }

    pub async fn summary(&self, caller: Caller) -> Result<MarketAnalytics> {
        caller.require(Role::Admin)?;
        let accounts = self.stores.accounts.accounts().await?;
        let products = self.stores.catalog.products(&ProductFilter::default()).await?;
        let orders = self.stores.orders.all_orders().await?;

        let count_role = |role: Role| accounts.iter().filter(|a| a.role() == role).count();
        let users = UserCounts {
            total: accounts.len(),
            farmers: count_role(Role::Farmer),
            consumers: count_role(Role::Consumer),
            admins: count_role(Role::Admin),
        };

        let mut products_by_category = BTreeMap::new();
        for p in &products {
            *products_by_category.entry(p.category().as_str()).or_insert(0) += 1;
        }

        let mut by_status: BTreeMap<&'static str, usize> = OrderStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        for o in &orders {
            *by_status.entry(o.status().as_str()).or_insert(0) += 1;
        }
        let revenue = orders.iter()
            .filter(|o| o.payment_status() == PaymentStatus::Paid)
            .fold(Decimal::ZERO, |acc, o| acc.saturating_add(o.total_amount().amount()));

        Ok(MarketAnalytics {
            users,
            products: ProductCounts { total: products.len(), approved: products.iter().filter(|p| p.is_approved()).count() },
            orders: OrderCounts { total: orders.len(), by_status },
            revenue,
            products_by_category,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::{market_with, Market};
    use crate::services::{OrderLine, PlaceOrder, Services};

    async fn order(m: &Market, product: &crate::domain::aggregates::Product, quantity: u32) -> crate::domain::value_objects::OrderId {
        let request = PlaceOrder { lines: vec![OrderLine { product_id: product.id(), quantity }], ..Default::default() };
        m.services.ordering.place_order(m.consumer.id, request).await.unwrap().order.id()
    }

    #[tokio::test]
    async fn test_summary_counts_the_market() {
        let stores = Stores::memory();
        let mut m = market_with(stores.clone()).await;
        m.services = Services::new(stores, m.events.clone(), false);
        let tomatoes = m.list(m.farmer, "Tomatoes", 40, 10).await;
        m.list(m.other_farmer, "Apples", 150, 10).await;
        m.services.catalog.approve(m.admin, tomatoes.id()).await.unwrap();

        let delivered = order(&m, &tomatoes, 2).await;
        m.services.lifecycle.update_status(m.farmer, delivered, OrderStatus::Delivered).await.unwrap();
        order(&m, &tomatoes, 1).await;

        let summary = m.services.analytics.summary(m.admin).await.unwrap();
        assert_eq!(summary.users, UserCounts { total: 4, farmers: 2, consumers: 1, admins: 1 });
        assert_eq!(summary.products, ProductCounts { total: 2, approved: 1 });
        assert_eq!(summary.orders.total, 2);
        assert_eq!(summary.orders.by_status["delivered"], 1);
        assert_eq!(summary.orders.by_status["pending"], 1);
        assert_eq!(summary.orders.by_status["cancelled"], 0);
        assert_eq!(summary.revenue, Decimal::new(80, 0));
        assert_eq!(summary.products_by_category["vegetables"], 2);
    }

    #[tokio::test]
    async fn test_summary_is_admin_only() {
        let m = market_with(Stores::memory()).await;
        assert_eq!(m.services.analytics.summary(m.farmer).await.unwrap_err().kind(), "forbidden");
    }
}
