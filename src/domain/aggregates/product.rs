//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use crate::domain::value_objects::{AccountId, Money, ProductId, Quantity, Stars};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub(crate) id: ProductId,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) category: Category,
    pub(crate) price: Money,
    pub(crate) quantity: Quantity,
    pub(crate) unit: Unit,
    pub(crate) images: Vec<String>,
    pub(crate) farmer: AccountId,
    pub(crate) location: Location,
    pub(crate) is_available: bool,
    pub(crate) is_approved: bool,
    pub(crate) ratings: Vec<ProductRating>,
    pub(crate) average_rating: Decimal,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category { Vegetables, Fruits, Grains, Dairy, Other }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit { #[default] Kg, Dozen, Litre, Piece, Bunch }

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location { pub city: String, pub state: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRating { pub user: AccountId, pub rating: Stars, pub review: Option<String>, pub created_at: DateTime<Utc> }

/// Fields a farmer supplies when listing produce.
#[derive(Clone, Debug)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub category: Category,
    pub price: Money,
    pub quantity: u32,
    pub unit: Unit,
    pub images: Vec<String>,
}

/// Partial edit of a listing. `quantity` is an explicit restock value, never derived from a prior read.
#[derive(Clone, Debug, Default)]
pub struct ProductEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub price: Option<Money>,
    pub quantity: Option<u32>,
    pub unit: Option<Unit>,
    pub images: Option<Vec<String>>,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vegetables => "vegetables", Self::Fruits => "fruits", Self::Grains => "grains",
            Self::Dairy => "dairy", Self::Other => "other",
        }
    }
}

impl FromStr for Category {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vegetables" => Ok(Self::Vegetables), "fruits" => Ok(Self::Fruits), "grains" => Ok(Self::Grains),
            "dairy" => Ok(Self::Dairy), "other" => Ok(Self::Other),
            _ => Err(ProductError::UnknownCategory(s.to_string())),
        }
    }
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kg => "kg", Self::Dozen => "dozen", Self::Litre => "litre", Self::Piece => "piece", Self::Bunch => "bunch",
        }
    }
}

impl FromStr for Unit {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kg" => Ok(Self::Kg), "dozen" => Ok(Self::Dozen), "litre" => Ok(Self::Litre),
            "piece" => Ok(Self::Piece), "bunch" => Ok(Self::Bunch),
            _ => Err(ProductError::UnknownUnit(s.to_string())),
        }
    }
}

impl Product {
    pub fn create(farmer: AccountId, listing: NewProduct, location: Location, approved: bool) -> Result<Self, ProductError> {
        let name = listing.name.trim().to_string();
        if name.is_empty() { return Err(ProductError::MissingName); }
        let now = Utc::now();
        let mut product = Self {
            id: ProductId::new(), name, description: listing.description.trim().to_string(),
            category: listing.category, price: listing.price, quantity: Quantity::new(listing.quantity),
            unit: listing.unit, images: listing.images, farmer, location, is_available: true,
            is_approved: approved, ratings: vec![], average_rating: Decimal::ZERO, created_at: now, updated_at: now,
        };
        product.refresh_availability();
        Ok(product)
    }

    pub fn id(&self) -> ProductId { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> &str { &self.description }
    pub fn category(&self) -> Category { self.category }
    pub fn price(&self) -> Money { self.price }
    pub fn quantity(&self) -> Quantity { self.quantity }
    pub fn unit(&self) -> Unit { self.unit }
    pub fn images(&self) -> &[String] { &self.images }
    pub fn farmer(&self) -> AccountId { self.farmer }
    pub fn location(&self) -> &Location { &self.location }
    pub fn is_available(&self) -> bool { self.is_available }
    pub fn is_approved(&self) -> bool { self.is_approved }
    pub fn ratings(&self) -> &[ProductRating] { &self.ratings }
    pub fn average_rating(&self) -> Decimal { self.average_rating }

    /// True when the listing can currently supply `qty` units.
    pub fn has_stock_for(&self, qty: u32) -> bool { self.is_available && self.quantity.value() >= qty }

    pub fn apply_edit(&mut self, edit: ProductEdit) -> Result<(), ProductError> {
        if let Some(name) = edit.name {
            let name = name.trim().to_string();
            if name.is_empty() { return Err(ProductError::MissingName); }
            self.name = name;
        }
        if let Some(description) = edit.description { self.description = description.trim().to_string(); }
        if let Some(category) = edit.category { self.category = category; }
        if let Some(price) = edit.price { self.price = price; }
        if let Some(unit) = edit.unit { self.unit = unit; }
        if let Some(images) = edit.images { self.images = images; }
        if let Some(quantity) = edit.quantity { self.restock(quantity); }
        self.touch();
        Ok(())
    }

    pub fn approve(&mut self) { self.is_approved = true; self.touch(); }

    pub fn restock(&mut self, quantity: u32) {
        self.quantity = Quantity::new(quantity);
        self.refresh_availability();
        self.touch();
    }

    /// Takes `qty` units out of stock, flipping availability off when the counter reaches zero.
    pub fn withdraw(&mut self, qty: u32) -> Result<(), ProductError> {
        if !self.is_available { return Err(ProductError::Unavailable); }
        self.quantity = self.quantity.subtract(qty).ok_or(ProductError::InsufficientInventory {
            requested: qty,
            available: self.quantity.value(),
        })?;
        self.refresh_availability();
        self.touch();
        Ok(())
    }

    pub fn replenish(&mut self, qty: u32) {
        self.quantity = self.quantity.add(qty);
        self.refresh_availability();
        self.touch();
    }

    /// Records a rating; an author rating the same product again replaces their earlier rating.
    pub fn rate(&mut self, user: AccountId, rating: Stars, review: Option<String>) {
        let review = review.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        match self.ratings.iter_mut().find(|r| r.user == user) {
            Some(existing) => { existing.rating = rating; existing.review = review; }
            None => self.ratings.push(ProductRating { user, rating, review, created_at: Utc::now() }),
        }
        self.average_rating = average_of(&self.ratings);
        self.touch();
    }

    fn refresh_availability(&mut self) { self.is_available = !self.quantity.is_zero(); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Arithmetic mean rounded half away from zero to one decimal place, 0 when unrated.
pub fn average_of(ratings: &[ProductRating]) -> Decimal {
    if ratings.is_empty() { return Decimal::ZERO; }
    let sum: u32 = ratings.iter().map(|r| u32::from(r.rating.value())).sum();
    (Decimal::from(sum) / Decimal::from(ratings.len() as u64)).round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("product name is required")]
    MissingName,
    #[error("product is not available")]
    Unavailable,
    #[error("insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: u32, available: u32 },
    #[error("unknown category '{0}'")]
    UnknownCategory(String),
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(quantity: u32) -> NewProduct {
        NewProduct {
            name: " Tomatoes ".into(), description: String::new(), category: Category::Vegetables,
            price: Money::new(Decimal::new(40, 0)).unwrap(), quantity, unit: Unit::Kg, images: vec![],
        }
    }

    #[test]
    fn test_product_create() {
        let p = Product::create(AccountId::new(), listing(5), Location::default(), true).unwrap();
        assert_eq!(p.name(), "Tomatoes");
        assert!(p.is_available());
        assert!(p.is_approved());
        let empty = Product::create(AccountId::new(), listing(0), Location::default(), false).unwrap();
        assert!(!empty.is_available());
    }

    #[test]
    fn test_withdraw_to_zero_flips_availability() {
        let mut p = Product::create(AccountId::new(), listing(3), Location::default(), true).unwrap();
        p.withdraw(2).unwrap();
        assert!(p.is_available());
        assert_eq!(p.withdraw(2), Err(ProductError::InsufficientInventory { requested: 2, available: 1 }));
        p.withdraw(1).unwrap();
        assert_eq!(p.quantity().value(), 0);
        assert!(!p.is_available());
        assert_eq!(p.withdraw(1), Err(ProductError::Unavailable));
        p.replenish(4);
        assert!(p.has_stock_for(4));
    }

    #[test]
    fn test_edit_restock_recomputes_availability() {
        let mut p = Product::create(AccountId::new(), listing(3), Location::default(), true).unwrap();
        p.apply_edit(ProductEdit { quantity: Some(0), ..Default::default() }).unwrap();
        assert!(!p.is_available());
        p.apply_edit(ProductEdit { quantity: Some(7), price: Some(Money::new(Decimal::new(55, 0)).unwrap()), ..Default::default() }).unwrap();
        assert!(p.is_available());
        assert_eq!(p.price().amount(), Decimal::new(55, 0));
        assert_eq!(p.apply_edit(ProductEdit { name: Some("  ".into()), ..Default::default() }), Err(ProductError::MissingName));
    }

    #[test]
    fn test_rating_average_and_replacement() {
        let mut p = Product::create(AccountId::new(), listing(3), Location::default(), true).unwrap();
        assert_eq!(p.average_rating(), Decimal::ZERO);
        let (a, b, c) = (AccountId::new(), AccountId::new(), AccountId::new());
        p.rate(a, Stars::new(5).unwrap(), Some("sweet".into()));
        p.rate(b, Stars::new(4).unwrap(), None);
        p.rate(c, Stars::new(4).unwrap(), None);
        assert_eq!(p.average_rating(), Decimal::new(43, 1));
        p.rate(a, Stars::new(1).unwrap(), None);
        assert_eq!(p.ratings().len(), 3);
        assert_eq!(p.average_rating(), Decimal::new(30, 1));
        assert_eq!(p.ratings()[0].review, None);
    }

    #[test]
    fn test_average_rounds_half_up() {
        let rating = |n| ProductRating { user: AccountId::new(), rating: Stars::new(n).unwrap(), review: None, created_at: Utc::now() };
        assert_eq!(average_of(&[rating(4), rating(5)]), Decimal::new(45, 1));
        assert_eq!(average_of(&[rating(5), rating(5), rating(4), rating(4)]), Decimal::new(45, 1));
        assert_eq!(average_of(&[rating(2), rating(3), rating(3)]), Decimal::new(27, 1));
    }
}
