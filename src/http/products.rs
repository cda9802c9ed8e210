use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::extract::{JsonBody, PathParam, QueryParams};
use super::AppState;
use crate::domain::aggregates::{Category, NewProduct, Product, ProductEdit, Unit};
use crate::domain::value_objects::{Money, ProductId, Stars};
use crate::services::Caller;
use crate::store::ProductFilter;
use crate::Result;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub quantity: u32,
    pub unit: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<u32>,
    pub unit: Option<String>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RatingRequest {
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: u8,
    #[validate(length(max = 1000))]
    pub review: Option<String>,
}

/// Blank query values are treated as absent.
fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ListParams {
    fn into_filter(self) -> Result<ProductFilter> {
        Ok(ProductFilter {
            category: present(self.category).map(|c| c.to_lowercase().parse::<Category>()).transpose()?,
            search: present(self.search),
            min_price: self.min_price.map(Money::new).transpose()?,
            max_price: self.max_price.map(Money::new).transpose()?,
            location: present(self.location),
            ..ProductFilter::storefront()
        })
    }
}

pub async fn list(State(s): State<AppState>, QueryParams(p): QueryParams<ListParams>) -> Result<Json<Vec<Product>>> {
    Ok(Json(s.services.catalog.list(p.into_filter()?).await?))
}

pub async fn get_product(State(s): State<AppState>, PathParam(id): PathParam<Uuid>) -> Result<Json<Product>> {
    Ok(Json(s.services.catalog.product(ProductId::from(id)).await?))
}

pub async fn create(State(s): State<AppState>, caller: Caller, JsonBody(r): JsonBody<CreateProductRequest>) -> Result<(StatusCode, Json<Product>)> {
    r.validate()?;
    let listing = NewProduct {
        name: r.name,
        description: r.description,
        category: r.category.to_lowercase().parse()?,
        price: Money::new(r.price)?,
        quantity: r.quantity,
        unit: r.unit.map(|u| u.to_lowercase().parse::<Unit>()).transpose()?.unwrap_or_default(),
        images: r.images,
    };
    let product = s.services.catalog.create(caller, listing).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update(
    State(s): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Uuid>,
    JsonBody(r): JsonBody<UpdateProductRequest>,
) -> Result<Json<Product>> {
    r.validate()?;
    let edit = ProductEdit {
        name: r.name,
        description: r.description,
        category: r.category.map(|c| c.to_lowercase().parse::<Category>()).transpose()?,
        price: r.price.map(Money::new).transpose()?,
        quantity: r.quantity,
        unit: r.unit.map(|u| u.to_lowercase().parse::<Unit>()).transpose()?,
        images: r.images,
    };
    Ok(Json(s.services.catalog.update(caller, ProductId::from(id), edit).await?))
}

pub async fn remove(State(s): State<AppState>, caller: Caller, PathParam(id): PathParam<Uuid>) -> Result<StatusCode> {
    s.services.catalog.delete(caller, ProductId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn rate(
    State(s): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Uuid>,
    JsonBody(r): JsonBody<RatingRequest>,
) -> Result<Json<Product>> {
    r.validate()?;
    let stars = Stars::new(r.rating)?;
    Ok(Json(s.services.catalog.rate(caller, ProductId::from(id), stars, r.review).await?))
}
