//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod account;

pub use product::{Product, ProductError, ProductEdit, ProductRating, NewProduct, Category, Unit, Location};
pub use order::{Order, OrderError, OrderStatus, PaymentStatus, PaymentMethod, LineItem, Address};
pub use cart::{Cart, CartError, CartLine};
pub use account::{Account, ProfileUpdate, Role};
