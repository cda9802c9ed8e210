//! Cart Aggregate
//!
//! One cart per account. Lines are unique by product and always hold a quantity of at least one.
//! `version` is bumped by the store on every successful save and used to reject stale writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::aggregates::Product;
use crate::domain::value_objects::{AccountId, ProductId};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub(crate) account_id: AccountId,
    pub(crate) lines: Vec<CartLine>,
    pub(crate) version: u64,
    pub(crate) updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine { pub product_id: ProductId, pub quantity: u32 }

impl Cart {
    pub fn new(account_id: AccountId) -> Self {
        Self { account_id, lines: vec![], version: 0, updated_at: Utc::now() }
    }

    pub fn account_id(&self) -> AccountId { self.account_id }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn version(&self) -> u64 { self.version }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.lines.iter().find(|l| l.product_id == product_id).map(|l| l.quantity)
    }

    /// Adds `quantity` units of `product`, merging with an existing line.
    /// The merged quantity is checked against live stock; on failure the cart is untouched.
    pub fn add_item(&mut self, product: &Product, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        if !product.has_stock_for(quantity) {
            return Err(CartError::OutOfStock { product: product.name().to_string() });
        }
        match self.lines.iter_mut().find(|l| l.product_id == product.id()) {
            Some(line) => {
                let combined = line.quantity.saturating_add(quantity);
                if combined > product.quantity().value() {
                    return Err(CartError::InsufficientStock { requested: combined, available: product.quantity().value() });
                }
                line.quantity = combined;
            }
            None => self.lines.push(CartLine { product_id: product.id(), quantity }),
        }
        self.touch();
        Ok(())
    }

    pub fn update_item(&mut self, product: &Product, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        let line = self.lines.iter_mut().find(|l| l.product_id == product.id()).ok_or(CartError::ItemNotFound)?;
        if quantity > product.quantity().value() {
            return Err(CartError::InsufficientStock { requested: quantity, available: product.quantity().value() });
        }
        line.quantity = quantity;
        self.touch();
        Ok(())
    }

    /// Returns whether a line was removed. Removing an absent product is not an error.
    pub fn remove_item(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.touch();
        self.lines.len() != before
    }

    pub fn clear(&mut self) { self.lines.clear(); self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    #[error("item not found in cart")]
    ItemNotFound,
    #[error("{product} is not available in the requested quantity")]
    OutOfStock { product: String },
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Category, Location, NewProduct, Unit};
    use crate::domain::value_objects::Money;
    use rust_decimal::Decimal;

    fn product(stock: u32) -> Product {
        Product::create(AccountId::new(), NewProduct {
            name: "Spinach".into(), description: String::new(), category: Category::Vegetables,
            price: Money::new(Decimal::new(30, 0)).unwrap(), quantity: stock, unit: Unit::Bunch, images: vec![],
        }, Location::default(), true).unwrap()
    }

    #[test]
    fn test_cart_operations() {
        let p = product(10);
        let mut cart = Cart::new(AccountId::new());
        cart.add_item(&p, 2).unwrap();
        cart.add_item(&p, 3).unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.quantity_of(p.id()), Some(5)); // Merged
        cart.update_item(&p, 9).unwrap();
        assert_eq!(cart.quantity_of(p.id()), Some(9));
        assert!(cart.remove_item(p.id()));
        assert!(!cart.remove_item(p.id()));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_combined_quantity_over_stock_leaves_line() {
        let p = product(5);
        let mut cart = Cart::new(AccountId::new());
        cart.add_item(&p, 2).unwrap();
        assert_eq!(cart.add_item(&p, 4), Err(CartError::InsufficientStock { requested: 6, available: 5 }));
        assert_eq!(cart.quantity_of(p.id()), Some(2));
    }

    #[test]
    fn test_add_rejects_unavailable_product() {
        let mut p = product(1);
        let mut cart = Cart::new(AccountId::new());
        assert!(matches!(cart.add_item(&p, 2), Err(CartError::OutOfStock { .. })));
        p.withdraw(1).unwrap();
        assert!(matches!(cart.add_item(&p, 1), Err(CartError::OutOfStock { .. })));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_checks() {
        let p = product(4);
        let mut cart = Cart::new(AccountId::new());
        assert_eq!(cart.update_item(&p, 1), Err(CartError::ItemNotFound));
        cart.add_item(&p, 1).unwrap();
        assert_eq!(cart.update_item(&p, 0), Err(CartError::InvalidQuantity));
        assert_eq!(cart.update_item(&p, 5), Err(CartError::InsufficientStock { requested: 5, available: 4 }));
        assert_eq!(cart.quantity_of(p.id()), Some(1));
    }
}
