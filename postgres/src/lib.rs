//! `PostgreSQL` order store for orderstream.
//!
//! [`PostgresOrderStore`] implements [`OrderStore`] on four tables:
//! `orders` (root), `deliveries` (1:1), `payments` (1:1) and `items` (1:N),
//! all keyed by `order_uid`.
//!
//! # Example
//!
//! ```ignore
//! use orderstream_postgres::PostgresOrderStore;
//!
//! let store = PostgresOrderStore::new("postgres://localhost/orders").await?;
//! store.ensure_schema().await?;
//! let orders = store.load_all().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod schema;

use chrono::{DateTime, Utc};
use orderstream_core::model::{Delivery, Item, Order, Payment};
use orderstream_core::order_store::{OrderStore, OrderStoreError};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Default pool size for [`PostgresOrderStore::new`].
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// PostgreSQL-backed [`OrderStore`].
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Connect with a pool of [`DEFAULT_MAX_CONNECTIONS`].
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError::DatabaseError`] if the database is unreachable.
    pub async fn new(database_url: &str) -> Result<Self, OrderStoreError> {
        Self::connect_with(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect with an explicit pool size.
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError::DatabaseError`] if the database is unreachable.
    pub async fn connect_with(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self, OrderStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| OrderStoreError::DatabaseError(format!("Failed to connect: {e}")))?;

        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the order tables if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError::DatabaseError`] if any statement fails.
    pub async fn ensure_schema(&self) -> Result<(), OrderStoreError> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| OrderStoreError::DatabaseError(format!("Schema setup failed: {e}")))?;
        }
        tracing::debug!("order schema ready");
        Ok(())
    }

    async fn insert(&self, order: &Order) -> Result<(), OrderStoreError> {
        let uid = order.order_uid.as_str();
        // Dropping `tx` without commit rolls everything back.
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        sqlx::query(
            "INSERT INTO orders (order_uid, track_number, entry, locale, internal_signature,
                customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .execute(&mut *tx)
        .await
        .map_err(|e| insert_error(uid, e))?;

        let delivery = &order.delivery;
        sqlx::query(
            "INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(uid)
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.zip)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .bind(&delivery.region)
        .bind(&delivery.email)
        .execute(&mut *tx)
        .await
        .map_err(|e| insert_error(uid, e))?;

        let payment = &order.payment;
        sqlx::query(
            "INSERT INTO payments (order_uid, transaction, request_id, currency, provider, amount,
                payment_dt, bank, delivery_cost, goods_total, custom_fee)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(uid)
        .bind(&payment.transaction)
        .bind(&payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(payment.custom_fee)
        .execute(&mut *tx)
        .await
        .map_err(|e| insert_error(uid, e))?;

        for (position, item) in order.items.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| {
                OrderStoreError::DatabaseError(format!("Order {uid} has too many items"))
            })?;

            sqlx::query(
                "INSERT INTO items (order_uid, position, chrt_id, track_number, price, rid, name,
                    sale, size, total_price, nm_id, brand, status)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            )
            .bind(uid)
            .bind(position)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *tx)
            .await
            .map_err(|e| insert_error(uid, e))?;
        }

        tx.commit().await.map_err(database_error)?;

        tracing::debug!(order_uid = %uid, items = order.items.len(), "order committed");
        Ok(())
    }

    async fn select_all(&self) -> Result<Vec<Order>, OrderStoreError> {
        // One snapshot for both queries, so items always match their orders.
        let mut tx = self.pool.begin().await.map_err(database_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(database_error)?;

        let order_rows = sqlx::query(
            "SELECT o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature,
                    o.customer_id, o.delivery_service, o.shardkey, o.sm_id, o.date_created,
                    o.oof_shard,
                    d.order_uid AS delivery_order_uid, d.name, d.phone, d.zip, d.city,
                    d.address, d.region, d.email,
                    p.order_uid AS payment_order_uid, p.transaction, p.request_id, p.currency,
                    p.provider, p.amount, p.payment_dt, p.bank, p.delivery_cost,
                    p.goods_total, p.custom_fee
             FROM orders o
             LEFT JOIN deliveries d ON d.order_uid = o.order_uid
             LEFT JOIN payments p ON p.order_uid = o.order_uid
             ORDER BY o.order_uid",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(database_error)?;

        let item_rows = sqlx::query(
            "SELECT order_uid, chrt_id, track_number, price, rid, name, sale, size,
                    total_price, nm_id, brand, status
             FROM items
             ORDER BY order_uid, position, id",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(database_error)?;

        tx.commit().await.map_err(database_error)?;

        let mut items_by_order: HashMap<String, Vec<Item>> = HashMap::new();
        for row in &item_rows {
            let uid: String = row.try_get("order_uid").map_err(database_error)?;
            items_by_order
                .entry(uid)
                .or_default()
                .push(item_from_row(row).map_err(database_error)?);
        }

        let mut orders = Vec::with_capacity(order_rows.len());
        for row in &order_rows {
            let mut order = order_from_row(row)?;
            order.items = items_by_order.remove(&order.order_uid).unwrap_or_default();
            orders.push(order);
        }

        tracing::debug!(orders = orders.len(), items = item_rows.len(), "loaded stored orders");
        Ok(orders)
    }
}

impl OrderStore for PostgresOrderStore {
    fn save<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), OrderStoreError>> + Send + 'a>> {
        Box::pin(self.insert(order))
    }

    fn load_all(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Order>, OrderStoreError>> + Send + '_>> {
        Box::pin(self.select_all())
    }
}

fn database_error(e: sqlx::Error) -> OrderStoreError {
    OrderStoreError::DatabaseError(e.to_string())
}

fn insert_error(order_uid: &str, e: sqlx::Error) -> OrderStoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            OrderStoreError::DuplicateOrder(order_uid.to_string())
        }
        _ => database_error(e),
    }
}

fn order_from_row(row: &PgRow) -> Result<Order, OrderStoreError> {
    let order_uid: String = row.try_get("order_uid").map_err(database_error)?;

    let delivery_uid: Option<String> = row.try_get("delivery_order_uid").map_err(database_error)?;
    if delivery_uid.is_none() {
        return Err(OrderStoreError::Integrity(format!("order {order_uid} has no delivery")));
    }
    let payment_uid: Option<String> = row.try_get("payment_order_uid").map_err(database_error)?;
    if payment_uid.is_none() {
        return Err(OrderStoreError::Integrity(format!("order {order_uid} has no payment")));
    }

    let date_created: DateTime<Utc> = row.try_get("date_created").map_err(database_error)?;

    let order = Order {
        track_number: row.try_get("track_number").map_err(database_error)?,
        entry: row.try_get("entry").map_err(database_error)?,
        delivery: delivery_from_row(row).map_err(database_error)?,
        payment: payment_from_row(row).map_err(database_error)?,
        items: Vec::new(),
        locale: row.try_get("locale").map_err(database_error)?,
        internal_signature: row.try_get("internal_signature").map_err(database_error)?,
        customer_id: row.try_get("customer_id").map_err(database_error)?,
        delivery_service: row.try_get("delivery_service").map_err(database_error)?,
        shardkey: row.try_get("shardkey").map_err(database_error)?,
        sm_id: row.try_get("sm_id").map_err(database_error)?,
        date_created,
        oof_shard: row.try_get("oof_shard").map_err(database_error)?,
        order_uid,
    };
    Ok(order)
}

fn delivery_from_row(row: &PgRow) -> Result<Delivery, sqlx::Error> {
    Ok(Delivery {
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        zip: row.try_get("zip")?,
        city: row.try_get("city")?,
        address: row.try_get("address")?,
        region: row.try_get("region")?,
        email: row.try_get("email")?,
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment, sqlx::Error> {
    Ok(Payment {
        transaction: row.try_get("transaction")?,
        request_id: row.try_get("request_id")?,
        currency: row.try_get("currency")?,
        provider: row.try_get("provider")?,
        amount: row.try_get("amount")?,
        payment_dt: row.try_get("payment_dt")?,
        bank: row.try_get("bank")?,
        delivery_cost: row.try_get("delivery_cost")?,
        goods_total: row.try_get("goods_total")?,
        custom_fee: row.try_get("custom_fee")?,
    })
}

fn item_from_row(row: &PgRow) -> Result<Item, sqlx::Error> {
    Ok(Item {
        chrt_id: row.try_get("chrt_id")?,
        track_number: row.try_get("track_number")?,
        price: row.try_get("price")?,
        rid: row.try_get("rid")?,
        name: row.try_get("name")?,
        sale: row.try_get("sale")?,
        size: row.try_get("size")?,
        total_price: row.try_get("total_price")?,
        nm_id: row.try_get("nm_id")?,
        brand: row.try_get("brand")?,
        status: row.try_get("status")?,
    })
}
