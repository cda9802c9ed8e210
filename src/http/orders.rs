use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::extract::{JsonBody, PathParam};
use super::AppState;
use crate::domain::aggregates::{Address, OrderStatus, PaymentMethod};
use crate::domain::value_objects::{OrderId, ProductId};
use crate::services::{Caller, OrderDetails, OrderLine, PlaceOrder};
use crate::{MarketError, Result};

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: Option<Address>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub shipping_address: Option<Address>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

fn payment_method(raw: Option<String>) -> Result<Option<PaymentMethod>> {
    Ok(raw.map(|m| m.trim().to_lowercase().parse::<PaymentMethod>()).transpose()?)
}

pub async fn place(State(s): State<AppState>, caller: Caller, JsonBody(r): JsonBody<PlaceOrderRequest>) -> Result<(StatusCode, Json<OrderDetails>)> {
    r.validate()?;
    let request = PlaceOrder {
        lines: r.items.iter().map(|i| OrderLine { product_id: ProductId::from(i.product_id), quantity: i.quantity }).collect(),
        shipping_address: r.shipping_address,
        payment_method: payment_method(r.payment_method)?,
    };
    let details = s.services.ordering.place_order(caller.id, request).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// The body is optional; an empty one checks out with the account's defaults.
pub async fn checkout(State(s): State<AppState>, caller: Caller, body: Bytes) -> Result<(StatusCode, Json<OrderDetails>)> {
    let r: CheckoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CheckoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| MarketError::InvalidArgument(format!("invalid checkout body: {e}")))?
    };
    let details = s.services.ordering.checkout_cart(caller.id, r.shipping_address, payment_method(r.payment_method)?).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn mine(State(s): State<AppState>, caller: Caller) -> Result<Json<Vec<OrderDetails>>> {
    Ok(Json(s.services.lifecycle.orders_for_consumer(caller).await?))
}

pub async fn get_order(State(s): State<AppState>, caller: Caller, PathParam(id): PathParam<Uuid>) -> Result<Json<OrderDetails>> {
    Ok(Json(s.services.lifecycle.order(caller, OrderId::from(id)).await?))
}

pub async fn update_status(
    State(s): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Uuid>,
    JsonBody(r): JsonBody<StatusRequest>,
) -> Result<Json<OrderDetails>> {
    let next: OrderStatus = r.status.trim().parse()?;
    Ok(Json(s.services.lifecycle.update_status(caller, OrderId::from(id), next).await?))
}
