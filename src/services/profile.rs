//! Farmer profile: contact and farm details shown alongside listings and orders.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::domain::aggregates::{Account, ProfileUpdate, Role};
use crate::services::Caller;
use crate::store::AccountStore;
use crate::{MarketError, Result};

#[derive(Clone)]
pub struct ProfileService {
    accounts: Arc<dyn AccountStore>,
}

impl ProfileService {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self { Self { accounts } }

    pub async fn profile(&self, caller: Caller) -> Result<Account> {
        caller.require(Role::Farmer)?;
        self.accounts.account(caller.id).await?.ok_or_else(unknown)
    }

    #[instrument(skip_all, fields(farmer = %caller.id))]
    pub async fn update_profile(&self, caller: Caller, update: ProfileUpdate) -> Result<Account> {
        caller.require(Role::Farmer)?;
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(MarketError::InvalidArgument("name must not be blank".into()));
        }
        let account = self.accounts.update_profile(caller.id, &update).await?.ok_or_else(unknown)?;
        info!("profile updated");
        Ok(account)
    }
}

fn unknown() -> MarketError { MarketError::Unauthenticated("unknown account".into()) }
