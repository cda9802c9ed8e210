//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{AccountId, Money, MoneyError, OrderId, ProductId};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub(crate) id: OrderId,
    pub(crate) consumer: AccountId,
    pub(crate) farmer: AccountId,
    pub(crate) items: Vec<LineItem>,
    pub(crate) total_amount: Money,
    pub(crate) status: OrderStatus,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) shipping_address: Option<Address>,
    pub(crate) payment_method: PaymentMethod,
    pub(crate) order_date: DateTime<Utc>,
    pub(crate) delivery_date: Option<DateTime<Utc>>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

/// Snapshot of one purchased product. `price` is the unit price at the time the order was placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem { pub product_id: ProductId, pub quantity: u32, pub price: Money }

impl LineItem {
    pub fn total(&self) -> Result<Money, MoneyError> { self.price.multiply(self.quantity) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address { pub street: String, pub city: String, pub state: String, pub pincode: String }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus { #[default] Pending, Paid }

/// How the consumer intends to pay. Recorded only; no gateway is involved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod { #[default] Cash, Online, Upi }

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Confirmed => "confirmed", Self::Processing => "processing",
            Self::Shipped => "shipped", Self::Delivered => "delivered", Self::Cancelled => "cancelled",
        }
    }

    /// Edges of the order state machine. Delivery may be recorded from any state that is not final.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Processing)
                | (Confirmed, Cancelled)
                | (Processing, Shipped)
                | (Pending | Confirmed | Processing | Shipped, Delivered)
        )
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    /// Still awaiting the farmer: counted as open work on the earnings summary.
    pub fn is_open(&self) -> bool { matches!(self, Self::Pending | Self::Confirmed | Self::Processing) }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str { match self { Self::Pending => "pending", Self::Paid => "paid" } }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s { "pending" => Ok(Self::Pending), "paid" => Ok(Self::Paid), other => Err(OrderError::UnknownPaymentStatus(other.to_string())) }
    }
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str { match self { Self::Cash => "cash", Self::Online => "online", Self::Upi => "upi" } }
}

impl FromStr for PaymentMethod {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash), "online" => Ok(Self::Online), "upi" => Ok(Self::Upi),
            other => Err(OrderError::UnknownPaymentMethod(other.to_string())),
        }
    }
}

impl Order {
    /// Creates a pending, unpaid order. The total is computed here from the line snapshots.
    pub fn place(
        consumer: AccountId,
        farmer: AccountId,
        items: Vec<LineItem>,
        shipping_address: Option<Address>,
        payment_method: PaymentMethod,
    ) -> Result<Self, OrderError> {
        if items.is_empty() { return Err(OrderError::NoItems); }
        let now = Utc::now();
        let totals = items.iter().map(LineItem::total).collect::<Result<Vec<_>, _>>()?;
        let total_amount = Money::total(totals)?;
        let mut order = Self {
            id: OrderId::new(), consumer, farmer, items, total_amount, status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending, shipping_address, payment_method,
            order_date: now, delivery_date: None, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, consumer, farmer, total: order.total_amount,
        }));
        Ok(order)
    }

    pub fn id(&self) -> OrderId { self.id }
    pub fn consumer(&self) -> AccountId { self.consumer }
    pub fn farmer(&self) -> AccountId { self.farmer }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn total_amount(&self) -> Money { self.total_amount }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn shipping_address(&self) -> Option<&Address> { self.shipping_address.as_ref() }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn order_date(&self) -> DateTime<Utc> { self.order_date }
    pub fn delivery_date(&self) -> Option<DateTime<Utc>> { self.delivery_date }

    /// Moves the order along the state machine. On rejection the order is left as it was.
    /// Delivery stamps the delivery date and marks the order paid, whatever the payment method.
    pub fn transition(&mut self, next: OrderStatus, at: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        let from = self.status;
        self.status = next;
        if next == OrderStatus::Delivered {
            self.delivery_date = Some(at);
            self.payment_status = PaymentStatus::Paid;
        }
        self.updated_at = at;
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: next }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("at least one item is required")]
    NoItems,
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("unknown order status '{0}'")]
    UnknownStatus(String),
    #[error("unknown payment status '{0}'")]
    UnknownPaymentStatus(String),
    #[error("unknown payment method '{0}'")]
    UnknownPaymentMethod(String),
    #[error("order total: {0}")]
    Total(#[from] MoneyError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn line(quantity: u32, price: i64) -> LineItem {
        LineItem { product_id: ProductId::new(), quantity, price: Money::new(Decimal::new(price, 2)).unwrap() }
    }

    fn order() -> Order {
        Order::place(AccountId::new(), AccountId::new(), vec![line(2, 1050), line(3, 199)], None, PaymentMethod::Cash).unwrap()
    }

    #[test]
    fn test_total_matches_lines() {
        let o = order();
        assert_eq!(o.total_amount().amount(), Decimal::new(2697, 2));
        let sum = Money::total(o.items().iter().map(|i| i.total().unwrap())).unwrap();
        assert_eq!(o.total_amount(), sum);
        assert_eq!(o.status(), OrderStatus::Pending);
        assert_eq!(o.payment_status(), PaymentStatus::Pending);
    }

    #[test]
    fn test_total_beyond_money_range_rejected() {
        let top = LineItem { product_id: ProductId::new(), quantity: 1, price: Money::max() };
        let at_limit = Order::place(AccountId::new(), AccountId::new(), vec![top.clone()], None, PaymentMethod::Cash).unwrap();
        assert_eq!(at_limit.total_amount(), Money::max());
        let err = Order::place(AccountId::new(), AccountId::new(), vec![top, line(1, 1)], None, PaymentMethod::Cash).unwrap_err();
        assert_eq!(err, OrderError::Total(MoneyError::Overflow));
    }

    #[test]
    fn test_empty_order_rejected() {
        let err = Order::place(AccountId::new(), AccountId::new(), vec![], None, PaymentMethod::Upi).unwrap_err();
        assert_eq!(err, OrderError::NoItems);
    }

    #[test]
    fn test_order_workflow() {
        let mut o = order();
        let _ = o.take_events();
        for next in [OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Shipped] {
            o.transition(next, Utc::now()).unwrap();
        }
        assert_eq!(o.status(), OrderStatus::Shipped);
        assert_eq!(o.take_events().len(), 3);
        let err = o.transition(OrderStatus::Pending, Utc::now()).unwrap_err();
        assert_eq!(err, OrderError::InvalidTransition { from: OrderStatus::Shipped, to: OrderStatus::Pending });
        assert_eq!(o.status(), OrderStatus::Shipped);
        assert!(o.take_events().is_empty());
    }

    #[test]
    fn test_cancellation_window() {
        let mut o = order();
        o.transition(OrderStatus::Confirmed, Utc::now()).unwrap();
        o.transition(OrderStatus::Cancelled, Utc::now()).unwrap();
        assert!(o.status().is_terminal());
        assert!(o.transition(OrderStatus::Delivered, Utc::now()).is_err());

        let mut o = order();
        o.transition(OrderStatus::Confirmed, Utc::now()).unwrap();
        o.transition(OrderStatus::Processing, Utc::now()).unwrap();
        assert!(o.transition(OrderStatus::Cancelled, Utc::now()).is_err());
    }

    #[test]
    fn test_delivery_marks_paid() {
        let mut o = order();
        let at = Utc::now();
        o.transition(OrderStatus::Delivered, at).unwrap();
        assert_eq!(o.payment_status(), PaymentStatus::Paid);
        assert_eq!(o.delivery_date(), Some(at));
        assert!(o.transition(OrderStatus::Delivered, Utc::now()).is_err());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("processing".parse::<OrderStatus>().unwrap(), OrderStatus::Processing);
        assert_eq!("refunded".parse::<OrderStatus>(), Err(OrderError::UnknownStatus("refunded".into())));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }
}
