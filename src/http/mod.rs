//! HTTP surface: routing, caller extraction, error rendering.

use axum::{routing::{delete, get, post, put}, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::Services;

mod admin;
mod caller;
mod cart;
mod error;
mod extract;
mod farmers;
mod orders;
mod products;

pub use caller::ACCOUNT_HEADER;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
}

impl AppState {
    pub fn new(services: Services) -> Self { Self { services } }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "farm-market"})) }))
        .route("/api/cart", get(cart::view).delete(cart::clear))
        .route("/api/cart/items", post(cart::add_item).put(cart::update_item))
        .route("/api/cart/items/:product_id", delete(cart::remove_item))
        .route("/api/orders", post(orders::place))
        .route("/api/orders/checkout", post(orders::checkout))
        .route("/api/orders/mine", get(orders::mine))
        .route("/api/orders/:id", get(orders::get_order))
        .route("/api/orders/:id/status", put(orders::update_status))
        .route("/api/products", get(products::list).post(products::create))
        .route("/api/products/:id", get(products::get_product).put(products::update).delete(products::remove))
        .route("/api/products/:id/ratings", post(products::rate))
        .route("/api/farmers/profile", get(farmers::profile).put(farmers::update_profile))
        .route("/api/farmers/products", get(farmers::products))
        .route("/api/farmers/orders", get(farmers::orders))
        .route("/api/farmers/earnings", get(farmers::earnings))
        .route("/api/admin/products", get(admin::products))
        .route("/api/admin/products/:id/approve", put(admin::approve))
        .route("/api/admin/orders", get(admin::orders))
        .route("/api/admin/analytics", get(admin::analytics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
