//! Demo data for running the in-memory store by hand.

use rust_decimal::Decimal;
use tracing::info;

use crate::domain::aggregates::{Account, Address, Category, NewProduct, Role, Unit};
use crate::domain::value_objects::Money;
use crate::services::{Caller, Services};
use crate::Result;

/// Registers one account per role plus a few listings, and logs the ids to use as `x-account-id`.
pub async fn demo_market(services: &Services) -> Result<Vec<Account>> {
    let address = |city: &str, state: &str, pincode: &str| Address {
        street: "1 Market Road".into(), city: city.into(), state: state.into(), pincode: pincode.into(),
    };
    let accounts = vec![
        Account::register("Asha Patil", "asha@farm.example", Role::Farmer)
            .with_farm("Patil Organic Farm", "Nashik")
            .with_address(address("Nashik", "Maharashtra", "422001")),
        Account::register("Rahul Mehta", "rahul@home.example", Role::Consumer)
            .with_phone("+91 90000 00000")
            .with_address(address("Pune", "Maharashtra", "411001")),
        Account::register("Market Admin", "admin@market.example", Role::Admin),
    ];
    for account in &accounts {
        services.stores.accounts.insert_account(account).await?;
        info!(account_id = %account.id(), role = account.role().as_str(), email = account.email(), "demo account ready");
    }

    let farmer = Caller::new(accounts[0].id(), Role::Farmer);
    let listings = [
        ("Tomatoes", Category::Vegetables, 40, 50, Unit::Kg),
        ("Alphonso Mangoes", Category::Fruits, 600, 20, Unit::Dozen),
        ("Basmati Rice", Category::Grains, 120, 100, Unit::Kg),
        ("Buffalo Milk", Category::Dairy, 70, 30, Unit::Litre),
    ];
    for (name, category, price, quantity, unit) in listings {
        let product = services.catalog.create(farmer, NewProduct {
            name: name.into(), description: format!("Fresh {} from Nashik", name.to_lowercase()), category,
            price: Money::new(Decimal::new(price, 0))?, quantity, unit, images: vec![],
        }).await?;
        info!(product_id = %product.id(), name, "demo product listed");
    }
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::NullPublisher;
    use crate::store::{ProductFilter, Stores};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_demo_market_is_browsable() {
        let services = Services::new(Stores::memory(), Arc::new(NullPublisher), true);
        let accounts = demo_market(&services).await.unwrap();
        assert_eq!(accounts.len(), 3);
        assert_eq!(services.catalog.list(ProductFilter::default()).await.unwrap().len(), 4);
        assert_eq!(demo_market(&services).await.unwrap_err().kind(), "conflict");
    }
}
