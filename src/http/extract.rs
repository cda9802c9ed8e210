//! Request extractors whose rejections render as `MarketError`, so malformed bodies, paths and
//! queries get the same `{"error", "message"}` envelope as every other failure.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};

use crate::MarketError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(MarketError))]
pub struct JsonBody<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(MarketError))]
pub struct PathParam<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(MarketError))]
pub struct QueryParams<T>(pub T);

impl From<JsonRejection> for MarketError {
    fn from(rejection: JsonRejection) -> Self { MarketError::InvalidArgument(rejection.body_text()) }
}

impl From<PathRejection> for MarketError {
    fn from(rejection: PathRejection) -> Self { MarketError::InvalidArgument(rejection.body_text()) }
}

impl From<QueryRejection> for MarketError {
    fn from(rejection: QueryRejection) -> Self { MarketError::InvalidArgument(rejection.body_text()) }
}
