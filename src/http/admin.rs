use axum::{extract::State, Json};
use uuid::Uuid;

use super::extract::PathParam;
use super::AppState;
use crate::domain::aggregates::Product;
use crate::domain::value_objects::ProductId;
use crate::services::{Caller, MarketAnalytics, OrderDetails};
use crate::Result;

/// Every listing, including ones still awaiting approval.
pub async fn products(State(s): State<AppState>, caller: Caller) -> Result<Json<Vec<Product>>> {
    Ok(Json(s.services.catalog.all_products(caller).await?))
}

pub async fn approve(State(s): State<AppState>, caller: Caller, PathParam(id): PathParam<Uuid>) -> Result<Json<Product>> {
    Ok(Json(s.services.catalog.approve(caller, ProductId::from(id)).await?))
}

pub async fn orders(State(s): State<AppState>, caller: Caller) -> Result<Json<Vec<OrderDetails>>> {
    Ok(Json(s.services.lifecycle.all_orders(caller).await?))
}

pub async fn analytics(State(s): State<AppState>, caller: Caller) -> Result<Json<MarketAnalytics>> {
    Ok(Json(s.services.analytics.summary(caller).await?))
}
