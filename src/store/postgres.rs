//! PostgreSQL store.
//!
//! Embedded documents (ratings, cart lines, order items, addresses) are JSONB columns.
//! Stock changes are single UPDATE statements that recompute `is_available` from the new quantity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::fmt::Display;
use tracing::instrument;
use uuid::Uuid;

use super::{AccountStore, CatalogStore, OrderLedger, ProductFilter, StockReservation};
use crate::domain::aggregates::{Account, Address, Cart, CartLine, LineItem, Location, Order, OrderStatus, Product, ProductRating, ProfileUpdate};
use crate::domain::value_objects::{AccountId, Money, OrderId, ProductId, Quantity};
use crate::{MarketError, Result};

#[derive(Clone)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| MarketError::Storage(e.to_string()))
    }
}

fn corrupt(what: &str, id: Uuid, err: impl Display) -> MarketError {
    MarketError::Storage(format!("corrupt {what} record {id}: {err}"))
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[derive(FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: String,
    category: String,
    price: Decimal,
    quantity: i64,
    unit: String,
    images: Vec<String>,
    farmer_id: Uuid,
    location_city: String,
    location_state: String,
    is_available: bool,
    is_approved: bool,
    ratings: Json<Vec<ProductRating>>,
    average_rating: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = MarketError;
    fn try_from(row: ProductRow) -> Result<Self> {
        let quantity = u32::try_from(row.quantity).map_err(|e| corrupt("product", row.id, e))?;
        Ok(Product {
            id: row.id.into(),
            name: row.name,
            description: row.description,
            category: row.category.parse().map_err(|e| corrupt("product", row.id, e))?,
            price: Money::new(row.price).map_err(|e| corrupt("product", row.id, e))?,
            quantity: Quantity::new(quantity),
            unit: row.unit.parse().map_err(|e| corrupt("product", row.id, e))?,
            images: row.images,
            farmer: row.farmer_id.into(),
            location: Location { city: row.location_city, state: row.location_state },
            is_available: row.is_available,
            is_approved: row.is_approved,
            ratings: row.ratings.0,
            average_rating: row.average_rating,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct AccountRow {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    role: String,
    address: Option<Json<Address>>,
    farm_name: Option<String>,
    farm_location: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = MarketError;
    fn try_from(row: AccountRow) -> Result<Self> {
        Ok(Account {
            id: row.id.into(),
            name: row.name,
            email: row.email,
            phone: row.phone,
            role: row.role.parse().map_err(|e| corrupt("account", row.id, e))?,
            address: row.address.map(|a| a.0),
            farm_name: row.farm_name,
            farm_location: row.farm_location,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct CartRow { account_id: Uuid, lines: Json<Vec<CartLine>>, version: i64, updated_at: DateTime<Utc> }

impl TryFrom<CartRow> for Cart {
    type Error = MarketError;
    fn try_from(row: CartRow) -> Result<Self> {
        Ok(Cart {
            account_id: row.account_id.into(),
            lines: row.lines.0,
            version: u64::try_from(row.version).map_err(|e| corrupt("cart", row.account_id, e))?,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    consumer_id: Uuid,
    farmer_id: Uuid,
    items: Json<Vec<LineItem>>,
    total_amount: Decimal,
    status: String,
    payment_status: String,
    shipping_address: Option<Json<Address>>,
    payment_method: String,
    order_date: DateTime<Utc>,
    delivery_date: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = MarketError;
    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(Order {
            id: row.id.into(),
            consumer: row.consumer_id.into(),
            farmer: row.farmer_id.into(),
            items: row.items.0,
            total_amount: Money::new(row.total_amount).map_err(|e| corrupt("order", row.id, e))?,
            status: row.status.parse().map_err(|e| corrupt("order", row.id, e))?,
            payment_status: row.payment_status.parse().map_err(|e| corrupt("order", row.id, e))?,
            shipping_address: row.shipping_address.map(|a| a.0),
            payment_method: row.payment_method.parse().map_err(|e| corrupt("order", row.id, e))?,
            order_date: row.order_date,
            delivery_date: row.delivery_date,
            updated_at: row.updated_at,
            events: vec![],
        })
    }
}

fn collect<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = MarketError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_product(&self, p: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, name, description, category, price, quantity, unit, images, farmer_id, \
             location_city, location_state, is_available, is_approved, ratings, average_rating, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(p.id().as_uuid())
        .bind(p.name())
        .bind(p.description())
        .bind(p.category().as_str())
        .bind(p.price().amount())
        .bind(i64::from(p.quantity().value()))
        .bind(p.unit().as_str())
        .bind(p.images())
        .bind(p.farmer().as_uuid())
        .bind(&p.location().city)
        .bind(&p.location().state)
        .bind(p.is_available())
        .bind(p.is_approved())
        .bind(Json(p.ratings()))
        .bind(p.average_rating())
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM products WHERE TRUE");
        if filter.approved_only { qb.push(" AND is_approved"); }
        if filter.available_only { qb.push(" AND is_available"); }
        if let Some(category) = filter.category { qb.push(" AND category = ").push_bind(category.as_str()); }
        if let Some(farmer) = filter.farmer { qb.push(" AND farmer_id = ").push_bind(farmer.as_uuid()); }
        if let Some(min) = filter.min_price { qb.push(" AND price >= ").push_bind(min.amount()); }
        if let Some(max) = filter.max_price { qb.push(" AND price <= ").push_bind(max.amount()); }
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (name ILIKE ").push_bind(pattern.clone()).push(" OR description ILIKE ").push_bind(pattern).push(")");
        }
        if let Some(location) = &filter.location {
            let pattern = format!("%{}%", escape_like(location));
            qb.push(" AND (location_city ILIKE ").push_bind(pattern.clone()).push(" OR location_state ILIKE ").push_bind(pattern).push(")");
        }
        qb.push(" ORDER BY created_at DESC, id DESC");
        let rows = qb.build_query_as::<ProductRow>().fetch_all(&self.pool).await?;
        collect(rows)
    }

    async fn save_details(&self, p: &Product) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE products SET name = $2, description = $3, category = $4, price = $5, unit = $6, images = $7, \
             location_city = $8, location_state = $9, is_approved = $10, ratings = $11, average_rating = $12, updated_at = $13 \
             WHERE id = $1",
        )
        .bind(p.id().as_uuid())
        .bind(p.name())
        .bind(p.description())
        .bind(p.category().as_str())
        .bind(p.price().amount())
        .bind(p.unit().as_str())
        .bind(p.images())
        .bind(&p.location().city)
        .bind(&p.location().state)
        .bind(p.is_approved())
        .bind(Json(p.ratings()))
        .bind(p.average_rating())
        .bind(p.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_stock(&self, id: ProductId, quantity: Quantity) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>(
            "UPDATE products SET quantity = $2, is_available = $2 > 0, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id.as_uuid())
        .bind(i64::from(quantity.value()))
        .fetch_optional(&self.pool)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    #[instrument(skip(self), fields(product = %id))]
    async fn reserve_stock(&self, id: ProductId, qty: u32) -> Result<StockReservation> {
        let updated = sqlx::query_as::<_, ProductRow>(
            "UPDATE products SET quantity = quantity - $2, is_available = quantity - $2 > 0, updated_at = NOW() \
             WHERE id = $1 AND is_available AND quantity >= $2 RETURNING *",
        )
        .bind(id.as_uuid())
        .bind(i64::from(qty))
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = updated {
            return Ok(StockReservation::Reserved(Product::try_from(row)?));
        }
        let current: Option<(i64,)> = sqlx::query_as("SELECT quantity FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(match current {
            None => StockReservation::Missing,
            Some((available,)) => StockReservation::Insufficient { available: u32::try_from(available).unwrap_or(0) },
        })
    }

    #[instrument(skip(self), fields(product = %id))]
    async fn release_stock(&self, id: ProductId, qty: u32) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>(
            "UPDATE products SET quantity = quantity + $2, is_available = quantity + $2 > 0, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id.as_uuid())
        .bind(i64::from(qty))
        .fetch_optional(&self.pool)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id.as_uuid()).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn insert_account(&self, a: &Account) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO accounts (id, name, email, phone, role, address, farm_name, farm_location, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) ON CONFLICT (email) DO NOTHING",
        )
        .bind(a.id().as_uuid())
        .bind(a.name())
        .bind(a.email())
        .bind(a.phone())
        .bind(a.role().as_str())
        .bind(a.address().map(Json))
        .bind(a.farm_name())
        .bind(a.farm_location())
        .bind(a.created_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(MarketError::Conflict(format!("email {} is already registered", a.email())));
        }
        Ok(())
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    /// Blank strings clear the optional columns, matching `Account::apply_profile`.
    async fn update_profile(&self, id: AccountId, update: &ProfileUpdate) -> Result<Option<Account>> {
        fn trimmed(v: &Option<String>) -> Option<&str> {
            v.as_deref().map(str::trim)
        }
        sqlx::query_as::<_, AccountRow>(
            "UPDATE accounts SET name = COALESCE($2, name), \
             phone = CASE WHEN $3::TEXT IS NULL THEN phone ELSE NULLIF($3, '') END, \
             farm_name = CASE WHEN $4::TEXT IS NULL THEN farm_name ELSE NULLIF($4, '') END, \
             farm_location = CASE WHEN $5::TEXT IS NULL THEN farm_location ELSE NULLIF($5, '') END, \
             address = COALESCE($6, address) \
             WHERE id = $1 RETURNING *",
        )
        .bind(id.as_uuid())
        .bind(trimmed(&update.name))
        .bind(trimmed(&update.phone))
        .bind(trimmed(&update.farm_name))
        .bind(trimmed(&update.farm_location))
        .bind(update.address.as_ref().map(Json))
        .fetch_optional(&self.pool)
        .await?
        .map(Account::try_from)
        .transpose()
    }

    async fn cart(&self, account_id: AccountId) -> Result<Cart> {
        let row = sqlx::query_as::<_, CartRow>("SELECT * FROM carts WHERE account_id = $1")
            .bind(account_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Cart::try_from(row),
            None => Ok(Cart::new(account_id)),
        }
    }

    async fn save_cart(&self, cart: &Cart) -> Result<Cart> {
        let next = i64::try_from(cart.version() + 1).map_err(|e| corrupt("cart", cart.account_id().as_uuid(), e))?;
        let result = if cart.version() == 0 {
            sqlx::query(
                "INSERT INTO carts (account_id, lines, version, updated_at) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (account_id) DO NOTHING",
            )
            .bind(cart.account_id().as_uuid())
            .bind(Json(cart.lines()))
            .bind(next)
            .bind(cart.updated_at())
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query("UPDATE carts SET lines = $2, version = $3, updated_at = $4 WHERE account_id = $1 AND version = $5")
                .bind(cart.account_id().as_uuid())
                .bind(Json(cart.lines()))
                .bind(next)
                .bind(cart.updated_at())
                .bind(next - 1)
                .execute(&self.pool)
                .await?
        };
        if result.rows_affected() == 0 {
            return Err(MarketError::Conflict("cart was modified concurrently, reload and retry".into()));
        }
        let mut saved = cart.clone();
        saved.version += 1;
        Ok(saved)
    }
}

#[async_trait]
impl OrderLedger for PgStore {
    async fn insert_order(&self, o: &Order) -> Result<()> {
        sqlx::query(
            "INSERT INTO orders (id, consumer_id, farmer_id, items, total_amount, status, payment_status, \
             shipping_address, payment_method, order_date, delivery_date, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(o.id().as_uuid())
        .bind(o.consumer().as_uuid())
        .bind(o.farmer().as_uuid())
        .bind(Json(o.items()))
        .bind(o.total_amount().amount())
        .bind(o.status().as_str())
        .bind(o.payment_status().as_str())
        .bind(o.shipping_address().map(Json))
        .bind(o.payment_method().as_str())
        .bind(o.order_date())
        .bind(o.delivery_date())
        .bind(o.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn orders_for_consumer(&self, consumer: AccountId) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE consumer_id = $1 ORDER BY order_date DESC, id DESC")
            .bind(consumer.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn orders_for_farmer(&self, farmer: AccountId) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE farmer_id = $1 ORDER BY order_date DESC, id DESC")
            .bind(farmer.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders ORDER BY order_date DESC, id DESC")
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn commit_transition(&self, o: &Order, from: OrderStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, payment_status = $3, delivery_date = $4, updated_at = $5 \
             WHERE id = $1 AND status = $6",
        )
        .bind(o.id().as_uuid())
        .bind(o.status().as_str())
        .bind(o.payment_status().as_str())
        .bind(o.delivery_date())
        .bind(o.updated_at)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
