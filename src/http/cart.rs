use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::extract::{JsonBody, PathParam};
use super::AppState;
use crate::domain::value_objects::ProductId;
use crate::services::{CartView, Caller};
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
}

pub async fn view(State(s): State<AppState>, caller: Caller) -> Result<Json<CartView>> {
    Ok(Json(s.services.cart.view(caller.id).await?))
}

pub async fn add_item(State(s): State<AppState>, caller: Caller, JsonBody(r): JsonBody<CartItemRequest>) -> Result<Json<CartView>> {
    r.validate()?;
    Ok(Json(s.services.cart.add_item(caller.id, ProductId::from(r.product_id), r.quantity).await?))
}

pub async fn update_item(State(s): State<AppState>, caller: Caller, JsonBody(r): JsonBody<CartItemRequest>) -> Result<Json<CartView>> {
    r.validate()?;
    Ok(Json(s.services.cart.update_item(caller.id, ProductId::from(r.product_id), r.quantity).await?))
}

pub async fn remove_item(State(s): State<AppState>, caller: Caller, PathParam(product_id): PathParam<Uuid>) -> Result<Json<CartView>> {
    Ok(Json(s.services.cart.remove_item(caller.id, ProductId::from(product_id)).await?))
}

pub async fn clear(State(s): State<AppState>, caller: Caller) -> Result<Json<CartView>> {
    Ok(Json(s.services.cart.clear(caller.id).await?))
}
