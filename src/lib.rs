//! Farm Market
//!
//! Marketplace connecting farmers who list produce with consumers who buy it.
//!
//! ## Features
//! - Produce catalog with approval, ratings and derived availability
//! - Per-account carts validated against live stock
//! - All-or-nothing order placement with atomic stock decrements
//! - Single-farmer orders with totals frozen at placement
//! - Order status lifecycle driven by farmers and admins

use thiserror::Error;

pub mod config;
pub mod domain;
pub mod http;
pub mod publisher;
pub mod seed;
pub mod services;
pub mod store;

use domain::aggregates::{CartError, OrderError, ProductError};
use domain::value_objects::{MoneyError, StarsError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    OutOfStock(String),

    #[error("{0}")]
    InsufficientStock(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl MarketError {
    /// Stable machine-readable discriminator, surfaced to API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::OutOfStock(_) => "out_of_stock",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::Forbidden(_) => "forbidden",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Conflict(_) => "conflict",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<sqlx::Error> for MarketError {
    fn from(err: sqlx::Error) -> Self { MarketError::Storage(err.to_string()) }
}

impl From<validator::ValidationErrors> for MarketError {
    fn from(err: validator::ValidationErrors) -> Self { MarketError::InvalidArgument(err.to_string()) }
}

impl From<CartError> for MarketError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InvalidQuantity => MarketError::InvalidArgument(err.to_string()),
            CartError::ItemNotFound => MarketError::NotFound(err.to_string()),
            CartError::OutOfStock { .. } => MarketError::OutOfStock(err.to_string()),
            CartError::InsufficientStock { .. } => MarketError::InsufficientStock(err.to_string()),
        }
    }
}

impl From<OrderError> for MarketError {
    fn from(err: OrderError) -> Self { MarketError::InvalidArgument(err.to_string()) }
}

impl From<ProductError> for MarketError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::Unavailable | ProductError::InsufficientInventory { .. } => MarketError::OutOfStock(err.to_string()),
            _ => MarketError::InvalidArgument(err.to_string()),
        }
    }
}

impl From<MoneyError> for MarketError {
    fn from(err: MoneyError) -> Self { MarketError::InvalidArgument(err.to_string()) }
}

impl From<StarsError> for MarketError {
    fn from(err: StarsError) -> Self { MarketError::InvalidArgument(err.to_string()) }
}

pub type Result<T> = std::result::Result<T, MarketError>;
