//! Joins orders with the product and account data shown alongside them.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::aggregates::{Account, Address, Order, Product, Unit};
use crate::domain::value_objects::{AccountId, Money, ProductId};
use crate::store::{AccountStore, CatalogStore};
use crate::Result;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub order: Order,
    pub lines: Vec<LineDetails>,
    pub farmer: Option<PartySummary>,
    pub consumer: Option<PartySummary>,
}

/// A line item with the product's current display data. `name` is `None` once the product is deleted;
/// `price` and `total` always come from the frozen line item.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDetails {
    pub product_id: ProductId,
    pub name: Option<String>,
    pub images: Vec<String>,
    pub unit: Option<Unit>,
    pub quantity: u32,
    pub price: Money,
    pub total: Money,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartySummary {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub farm_name: Option<String>,
    pub farm_location: Option<String>,
    pub address: Option<Address>,
}

impl From<&Account> for PartySummary {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id(), name: a.name().to_string(), email: a.email().to_string(),
            phone: a.phone().map(str::to_string), farm_name: a.farm_name().map(str::to_string),
            farm_location: a.farm_location().map(str::to_string), address: a.address().cloned(),
        }
    }
}

#[derive(Default)]
struct Lookups {
    products: HashMap<ProductId, Option<Product>>,
    parties: HashMap<AccountId, Option<PartySummary>>,
}

#[derive(Clone)]
pub struct OrderPresenter {
    catalog: Arc<dyn CatalogStore>,
    accounts: Arc<dyn AccountStore>,
}

impl OrderPresenter {
    pub fn new(catalog: Arc<dyn CatalogStore>, accounts: Arc<dyn AccountStore>) -> Self { Self { catalog, accounts } }

    pub async fn present(&self, order: Order) -> Result<OrderDetails> {
        self.present_with(order, &mut Lookups::default()).await
    }

    pub async fn present_all(&self, orders: Vec<Order>) -> Result<Vec<OrderDetails>> {
        let mut lookups = Lookups::default();
        let mut presented = Vec::with_capacity(orders.len());
        for order in orders {
            presented.push(self.present_with(order, &mut lookups).await?);
        }
        Ok(presented)
    }

    async fn present_with(&self, order: Order, lookups: &mut Lookups) -> Result<OrderDetails> {
        let mut lines = Vec::with_capacity(order.items().len());
        for item in order.items() {
            let product = self.product(item.product_id, lookups).await?;
            lines.push(LineDetails {
                product_id: item.product_id,
                name: product.as_ref().map(|p| p.name().to_string()),
                images: product.as_ref().map(|p| p.images().to_vec()).unwrap_or_default(),
                unit: product.as_ref().map(Product::unit),
                quantity: item.quantity,
                price: item.price,
                total: item.total()?,
            });
        }
        let farmer = self.party(order.farmer(), lookups).await?;
        let consumer = self.party(order.consumer(), lookups).await?;
        Ok(OrderDetails { order, lines, farmer, consumer })
    }

    async fn product(&self, id: ProductId, lookups: &mut Lookups) -> Result<Option<Product>> {
        if let Some(hit) = lookups.products.get(&id) { return Ok(hit.clone()); }
        let found = self.catalog.product(id).await?;
        lookups.products.insert(id, found.clone());
        Ok(found)
    }

    async fn party(&self, id: AccountId, lookups: &mut Lookups) -> Result<Option<PartySummary>> {
        if let Some(hit) = lookups.parties.get(&id) { return Ok(hit.clone()); }
        let found = self.accounts.account(id).await?.as_ref().map(PartySummary::from);
        lookups.parties.insert(id, found.clone());
        Ok(found)
    }
}
