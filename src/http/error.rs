use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

use crate::MarketError;

impl MarketError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::OutOfStock(_) | Self::InsufficientStock(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Renders `{"error": <kind>, "message": <text>}`. Storage details stay in the logs.
impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Storage(detail) => {
                tracing::error!(error = %detail, "storage failure while handling request");
                "the request could not be completed, try again later".to_string()
            }
            other => {
                tracing::debug!(kind = other.kind(), error = %other, "request rejected");
                other.to_string()
            }
        };
        (self.status_code(), Json(json!({ "error": self.kind(), "message": message }))).into_response()
    }
}
