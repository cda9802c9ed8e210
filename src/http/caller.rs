//! Caller identity. Tokens are issued and checked upstream; requests reach this service with the
//! account id in a header, which is resolved here against the account store.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use super::AppState;
use crate::domain::value_objects::AccountId;
use crate::services::Caller;
use crate::MarketError;

pub const ACCOUNT_HEADER: &str = "x-account-id";

#[axum::async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = MarketError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts.headers.get(ACCOUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| MarketError::Unauthenticated(format!("missing {ACCOUNT_HEADER} header")))?;
        let id = Uuid::parse_str(raw.trim())
            .map(AccountId::from)
            .map_err(|_| MarketError::Unauthenticated(format!("malformed {ACCOUNT_HEADER} header")))?;
        let account = state.services.stores.accounts.account(id).await?
            .ok_or_else(|| MarketError::Unauthenticated("unknown account".into()))?;
        Ok(Caller::new(account.id(), account.role()))
    }
}
