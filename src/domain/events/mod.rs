//! Domain events
use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::{AccountId, Money, OrderId, ProductId};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    StockDepleted { product_id: ProductId, farmer: AccountId },
    Rated { product_id: ProductId, average_rating: Decimal },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: OrderId, consumer: AccountId, farmer: AccountId, total: Money },
    StatusChanged { order_id: OrderId, from: OrderStatus, to: OrderStatus },
}

impl DomainEvent {
    /// Subject suffix used when the event leaves the process, e.g. `order.placed`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::StockDepleted { .. }) => "product.stock_depleted",
            Self::Product(ProductEvent::Rated { .. }) => "product.rated",
            Self::Order(OrderEvent::Placed { .. }) => "order.placed",
            Self::Order(OrderEvent::StatusChanged { .. }) => "order.status_changed",
        }
    }
}
