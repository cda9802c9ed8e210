use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use super::extract::JsonBody;
use super::AppState;
use crate::domain::aggregates::{Account, Address, Product, ProfileUpdate};
use crate::services::{Caller, Earnings, OrderDetails};
use crate::Result;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(max = 120))]
    pub farm_name: Option<String>,
    #[validate(length(max = 120))]
    pub farm_location: Option<String>,
    pub address: Option<Address>,
}

pub async fn profile(State(s): State<AppState>, caller: Caller) -> Result<Json<Account>> {
    Ok(Json(s.services.profile.profile(caller).await?))
}

pub async fn update_profile(State(s): State<AppState>, caller: Caller, JsonBody(r): JsonBody<ProfileRequest>) -> Result<Json<Account>> {
    r.validate()?;
    let update = ProfileUpdate { name: r.name, phone: r.phone, farm_name: r.farm_name, farm_location: r.farm_location, address: r.address };
    Ok(Json(s.services.profile.update_profile(caller, update).await?))
}

pub async fn products(State(s): State<AppState>, caller: Caller) -> Result<Json<Vec<Product>>> {
    Ok(Json(s.services.catalog.farmer_products(caller).await?))
}

pub async fn orders(State(s): State<AppState>, caller: Caller) -> Result<Json<Vec<OrderDetails>>> {
    Ok(Json(s.services.lifecycle.orders_for_farmer(caller).await?))
}

pub async fn earnings(State(s): State<AppState>, caller: Caller) -> Result<Json<Earnings>> {
    Ok(Json(s.services.lifecycle.earnings(caller).await?))
}
