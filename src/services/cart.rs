//! Cart Service
//!
//! Every mutation reads the cart, validates against the live product and writes the cart back
//! with a version check. Prices shown here are current prices; checkout re-validates everything.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::domain::aggregates::{Cart, Product, Unit};
use crate::domain::value_objects::{AccountId, Money, ProductId};
use crate::store::{AccountStore, CatalogStore};
use crate::{MarketError, Result};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub account_id: AccountId,
    pub lines: Vec<CartLineView>,
    pub subtotal: Money,
    pub version: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub product_id: ProductId,
    pub quantity: u32,
    /// `None` when the product no longer exists.
    pub product: Option<ProductSnapshot>,
    pub line_total: Option<Money>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub name: String,
    pub price: Money,
    pub unit: Unit,
    pub images: Vec<String>,
    pub stock: u32,
    pub is_available: bool,
    pub farmer: AccountId,
}

impl From<&Product> for ProductSnapshot {
    fn from(p: &Product) -> Self {
        Self {
            name: p.name().to_string(), price: p.price(), unit: p.unit(), images: p.images().to_vec(),
            stock: p.quantity().value(), is_available: p.is_available(), farmer: p.farmer(),
        }
    }
}

#[derive(Clone)]
pub struct CartService {
    catalog: Arc<dyn CatalogStore>,
    accounts: Arc<dyn AccountStore>,
}

impl CartService {
    pub fn new(catalog: Arc<dyn CatalogStore>, accounts: Arc<dyn AccountStore>) -> Self { Self { catalog, accounts } }

    pub async fn view(&self, account: AccountId) -> Result<CartView> {
        let cart = self.accounts.cart(account).await?;
        self.render(cart).await
    }

    #[instrument(skip_all, fields(account = %account, product = %product_id))]
    pub async fn add_item(&self, account: AccountId, product_id: ProductId, quantity: u32) -> Result<CartView> {
        if quantity < 1 { return Err(MarketError::InvalidArgument("quantity must be at least 1".into())); }
        let product = self.load_product(product_id).await?;
        let mut cart = self.accounts.cart(account).await?;
        cart.add_item(&product, quantity)?;
        priced_line(&cart, &product)?;
        let saved = self.accounts.save_cart(&cart).await?;
        debug!(quantity = saved.quantity_of(product_id), "cart line added");
        self.render(saved).await
    }

    #[instrument(skip_all, fields(account = %account, product = %product_id))]
    pub async fn update_item(&self, account: AccountId, product_id: ProductId, quantity: u32) -> Result<CartView> {
        if quantity < 1 { return Err(MarketError::InvalidArgument("quantity must be at least 1".into())); }
        let mut cart = self.accounts.cart(account).await?;
        if cart.quantity_of(product_id).is_none() {
            return Err(MarketError::NotFound("item not found in cart".into()));
        }
        let product = self.load_product(product_id).await?;
        cart.update_item(&product, quantity)?;
        priced_line(&cart, &product)?;
        let saved = self.accounts.save_cart(&cart).await?;
        self.render(saved).await
    }

    /// Idempotent: removing a product that is not in the cart succeeds without writing.
    #[instrument(skip_all, fields(account = %account, product = %product_id))]
    pub async fn remove_item(&self, account: AccountId, product_id: ProductId) -> Result<CartView> {
        let mut cart = self.accounts.cart(account).await?;
        let cart = if cart.remove_item(product_id) { self.accounts.save_cart(&cart).await? } else { cart };
        self.render(cart).await
    }

    #[instrument(skip_all, fields(account = %account))]
    pub async fn clear(&self, account: AccountId) -> Result<CartView> {
        let mut cart = self.accounts.cart(account).await?;
        if !cart.is_empty() {
            cart.clear();
            cart = self.accounts.save_cart(&cart).await?;
        }
        self.render(cart).await
    }

    async fn load_product(&self, id: ProductId) -> Result<Product> {
        self.catalog.product(id).await?.ok_or_else(|| MarketError::NotFound(format!("product {id} not found")))
    }

    async fn render(&self, cart: Cart) -> Result<CartView> {
        let mut lines = Vec::with_capacity(cart.lines().len());
        for line in cart.lines() {
            let product = self.catalog.product(line.product_id).await?;
            lines.push(CartLineView {
                product_id: line.product_id,
                quantity: line.quantity,
                line_total: product.as_ref().map(|p| p.price().multiply(line.quantity)).transpose()?,
                product: product.as_ref().map(ProductSnapshot::from),
            });
        }
        let subtotal = Money::total(lines.iter().filter_map(|l| l.line_total))?;
        Ok(CartView { account_id: cart.account_id(), lines, subtotal, version: cart.version() })
    }
}

/// Rejects a line whose total no longer fits in a `Money` before it is written.
fn priced_line(cart: &Cart, product: &Product) -> Result<()> {
    let quantity = cart.quantity_of(product.id()).unwrap_or(0);
    product.price().multiply(quantity)?;
    Ok(())
}
