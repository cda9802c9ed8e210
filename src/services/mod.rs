//! Application services. Each one is cheap to clone and holds only store handles.

use std::sync::Arc;

use crate::domain::aggregates::Role;
use crate::domain::value_objects::AccountId;
use crate::publisher::EventPublisher;
use crate::store::Stores;
use crate::{MarketError, Result};

pub mod analytics;
pub mod cart;
pub mod catalog;
pub mod lifecycle;
pub mod ordering;
pub mod presenter;
pub mod profile;

pub use analytics::{AdminAnalytics, MarketAnalytics};
pub use cart::{CartService, CartView};
pub use catalog::CatalogService;
pub use lifecycle::{Earnings, OrderLifecycle};
pub use ordering::{OrderLine, OrderPlacement, PlaceOrder};
pub use presenter::{OrderDetails, OrderPresenter};
pub use profile::ProfileService;

/// The authenticated account on whose behalf an operation runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    pub id: AccountId,
    pub role: Role,
}

impl Caller {
    pub fn new(id: AccountId, role: Role) -> Self { Self { id, role } }
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }

    pub fn require(&self, role: Role) -> Result<()> {
        if self.role != role {
            return Err(MarketError::Forbidden(format!("only {} accounts may do this", role.as_str())));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Services {
    pub stores: Stores,
    pub cart: CartService,
    pub ordering: OrderPlacement,
    pub lifecycle: OrderLifecycle,
    pub catalog: CatalogService,
    pub profile: ProfileService,
    pub analytics: AdminAnalytics,
}

impl Services {
    pub fn new(stores: Stores, publisher: Arc<dyn EventPublisher>, auto_approve_products: bool) -> Self {
        let presenter = OrderPresenter::new(stores.catalog.clone(), stores.accounts.clone());
        Self {
            cart: CartService::new(stores.catalog.clone(), stores.accounts.clone()),
            ordering: OrderPlacement::new(stores.clone(), publisher.clone(), presenter.clone()),
            lifecycle: OrderLifecycle::new(stores.orders.clone(), publisher.clone(), presenter),
            catalog: CatalogService::new(stores.catalog.clone(), stores.accounts.clone(), publisher, auto_approve_products),
            profile: ProfileService::new(stores.accounts.clone()),
            analytics: AdminAnalytics::new(stores.clone()),
            stores,
        }
    }
}
