//! Value Objects for the marketplace

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self { Self(Uuid::now_v7()) }
            pub fn as_uuid(&self) -> Uuid { self.0 }
        }

        impl Default for $name { fn default() -> Self { Self::new() } }
        impl From<Uuid> for $name { fn from(id: Uuid) -> Self { Self(id) } }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }
    };
}

entity_id!(
    /// Identity of a catalog listing.
    ProductId
);
entity_id!(
    /// Identity of a farmer, consumer or admin account.
    AccountId
);
entity_id!(
    /// Identity of a placed order.
    OrderId
);

/// Non-negative monetary amount. Currency is implicit and shared by the whole market.
///
/// Amounts carry at most two decimal places and never exceed [`Money::max`], the largest value a
/// `NUMERIC(14, 2)` column holds. Arithmetic is checked against the same bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

const MONEY_SCALE: u32 = 2;
const MONEY_MAX_MINOR_UNITS: i64 = 99_999_999_999_999;

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// 999999999999.99
    pub fn max() -> Money { Money(Decimal::new(MONEY_MAX_MINOR_UNITS, MONEY_SCALE)) }

    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() { return Err(MoneyError::Negative(amount)); }
        let amount = amount.normalize();
        if amount > Self::max().0 { return Err(MoneyError::TooLarge(amount)); }
        if amount.scale() > MONEY_SCALE { return Err(MoneyError::TooPrecise(amount)); }
        Ok(Self(amount))
    }
    pub fn amount(&self) -> Decimal { self.0 }

    pub fn add(&self, other: Money) -> Result<Money, MoneyError> {
        self.0.checked_add(other.0).ok_or(MoneyError::Overflow).and_then(bounded)
    }

    pub fn multiply(&self, qty: u32) -> Result<Money, MoneyError> {
        self.0.checked_mul(Decimal::from(qty)).ok_or(MoneyError::Overflow).and_then(bounded)
    }

    /// Adds up `amounts`, failing on the first partial sum that leaves the supported range.
    pub fn total(amounts: impl IntoIterator<Item = Money>) -> Result<Money, MoneyError> {
        amounts.into_iter().try_fold(Money::ZERO, |acc, m| acc.add(m))
    }
}

fn bounded(amount: Decimal) -> Result<Money, MoneyError> {
    if amount > Money::max().0 { return Err(MoneyError::Overflow); }
    Ok(Money(amount.normalize()))
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;
    fn try_from(amount: Decimal) -> Result<Self, Self::Error> { Money::new(amount) }
}

impl From<Money> for Decimal { fn from(m: Money) -> Self { m.0 } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("amount must not be negative, got {0}")]
    Negative(Decimal),
    #[error("amount may have at most two decimal places, got {0}")]
    TooPrecise(Decimal),
    #[error("amount {0} exceeds the largest supported amount")]
    TooLarge(Decimal),
    #[error("amount exceeds the largest supported amount")]
    Overflow,
}

/// Stock counter. Cannot go below zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

/// Star rating between 1 and 5 inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Stars(u8);

impl Stars {
    pub fn new(value: u8) -> Result<Self, StarsError> {
        if !(1..=5).contains(&value) { return Err(StarsError(value)); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u8 { self.0 }
}

impl TryFrom<u8> for Stars {
    type Error = StarsError;
    fn try_from(value: u8) -> Result<Self, Self::Error> { Stars::new(value) }
}

impl From<Stars> for u8 { fn from(s: Stars) -> Self { s.0 } }

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rating must be between 1 and 5, got {0}")]
pub struct StarsError(pub u8);
