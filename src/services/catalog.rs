//! Catalog Service
//!
//! Listing management for farmers, browsing for everyone, approval for admins. Detail edits go
//! through `save_details`, which never writes stock; restocks go through `set_stock` with the
//! farmer's explicit value.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::domain::aggregates::{Location, NewProduct, Product, ProductEdit, Role};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{ProductId, Quantity, Stars};
use crate::publisher::{publish_all, EventPublisher};
use crate::services::Caller;
use crate::store::{AccountStore, CatalogStore, ProductFilter};
use crate::{MarketError, Result};

#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogStore>,
    accounts: Arc<dyn AccountStore>,
    publisher: Arc<dyn EventPublisher>,
    auto_approve: bool,
}

impl CatalogService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        accounts: Arc<dyn AccountStore>,
        publisher: Arc<dyn EventPublisher>,
        auto_approve: bool,
    ) -> Self {
        Self { catalog, accounts, publisher, auto_approve }
    }

    /// Storefront listing. Unapproved and sold-out products are never included.
    pub async fn list(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        let filter = ProductFilter { approved_only: true, available_only: true, farmer: None, ..filter };
        self.catalog.products(&filter).await
    }

    pub async fn product(&self, id: ProductId) -> Result<Product> {
        self.catalog.product(id).await?.ok_or_else(|| not_found(id))
    }

    #[instrument(skip_all, fields(farmer = %caller.id))]
    pub async fn create(&self, caller: Caller, listing: NewProduct) -> Result<Product> {
        caller.require(Role::Farmer)?;
        let farmer = self.accounts.account(caller.id).await?
            .ok_or_else(|| MarketError::Unauthenticated("unknown account".into()))?;
        let location = farmer.address()
            .map(|a| Location { city: a.city.clone(), state: a.state.clone() })
            .unwrap_or_default();
        let product = Product::create(caller.id, listing, location, self.auto_approve)?;
        self.catalog.insert_product(&product).await?;
        info!(product = %product.id(), approved = product.is_approved(), "product listed");
        Ok(product)
    }

    /// Applies a detail edit and, when a quantity is given, a restock. These are two writes and
    /// are not atomic together: if the restock fails the detail edit stays saved and the error is
    /// returned. Both writes set absolute values, so retrying the same edit converges.
    #[instrument(skip_all, fields(farmer = %caller.id, product = %id))]
    pub async fn update(&self, caller: Caller, id: ProductId, mut edit: ProductEdit) -> Result<Product> {
        let mut product = self.owned(caller, id).await?;
        let restock = edit.quantity.take();
        product.apply_edit(edit)?;
        if !self.catalog.save_details(&product).await? { return Err(not_found(id)); }
        match restock {
            Some(quantity) => {
                let restocked = self.catalog.set_stock(id, Quantity::new(quantity)).await?.ok_or_else(|| not_found(id))?;
                info!(quantity, "product restocked");
                Ok(restocked)
            }
            None => self.product(id).await,
        }
    }

    #[instrument(skip_all, fields(farmer = %caller.id, product = %id))]
    pub async fn delete(&self, caller: Caller, id: ProductId) -> Result<()> {
        self.owned(caller, id).await?;
        if !self.catalog.delete_product(id).await? { return Err(not_found(id)); }
        info!("product deleted");
        Ok(())
    }

    /// Records the caller's rating, replacing any earlier rating they gave this product.
    #[instrument(skip_all, fields(author = %caller.id, product = %id, stars = stars.value()))]
    pub async fn rate(&self, caller: Caller, id: ProductId, stars: Stars, review: Option<String>) -> Result<Product> {
        let mut product = self.product(id).await?;
        product.rate(caller.id, stars, review);
        if !self.catalog.save_details(&product).await? { return Err(not_found(id)); }
        let event = DomainEvent::Product(ProductEvent::Rated { product_id: id, average_rating: product.average_rating() });
        publish_all(self.publisher.as_ref(), vec![event]).await;
        self.product(id).await
    }

    #[instrument(skip_all, fields(admin = %caller.id, product = %id))]
    pub async fn approve(&self, caller: Caller, id: ProductId) -> Result<Product> {
        caller.require(Role::Admin)?;
        let mut product = self.product(id).await?;
        product.approve();
        if !self.catalog.save_details(&product).await? { return Err(not_found(id)); }
        info!("product approved");
        self.product(id).await
    }

    /// Every listing of the calling farmer, including sold-out and unapproved ones.
    pub async fn farmer_products(&self, caller: Caller) -> Result<Vec<Product>> {
        caller.require(Role::Farmer)?;
        self.catalog.products(&ProductFilter::for_farmer(caller.id)).await
    }

    pub async fn all_products(&self, caller: Caller) -> Result<Vec<Product>> {
        caller.require(Role::Admin)?;
        self.catalog.products(&ProductFilter::default()).await
    }

    async fn owned(&self, caller: Caller, id: ProductId) -> Result<Product> {
        caller.require(Role::Farmer)?;
        let product = self.product(id).await?;
        if product.farmer() != caller.id {
            return Err(MarketError::Forbidden("only the listing farmer may change this product".into()));
        }
        Ok(product)
    }
}

fn not_found(id: ProductId) -> MarketError { MarketError::NotFound(format!("product {id} not found")) }
