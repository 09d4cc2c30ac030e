//! Durable storage seam for order aggregates.
//!
//! An [`OrderStore`] persists an admitted aggregate as one unit and can read
//! every stored aggregate back for cache warm-start.
//!
//! # Implementations
//!
//! - `PostgresOrderStore` (in `orderstream-postgres`): production storage
//! - `InMemoryOrderStore` (in `orderstream-testing`): deterministic tests
//!
//! Stores surface failures to the caller and never retry internally. Whether a
//! failed save is retried is the ingestion pipeline's call (it is not).

use crate::model::Order;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during order store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderStoreError {
    /// An order with this `order_uid` is already stored. Nothing was written.
    #[error("Order already exists: {0}")]
    DuplicateOrder(String),

    /// Stored rows do not form a complete aggregate (missing delivery or payment).
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Connection, transaction or query failure.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Transactional persistence for order aggregates.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so the store can be shared as
/// `Arc<dyn OrderStore>` between warm-start and the ingestion pipeline.
pub trait OrderStore: Send + Sync {
    /// Persist the order, its delivery, its payment and all of its items in a
    /// single transaction.
    ///
    /// Either every row is written or none is.
    ///
    /// # Errors
    ///
    /// - [`OrderStoreError::DuplicateOrder`] if `order_uid` is already stored
    /// - [`OrderStoreError::DatabaseError`] for any other failure
    fn save<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), OrderStoreError>> + Send + 'a>>;

    /// Read every stored aggregate, items in their original order.
    ///
    /// The result reflects committed transactions only.
    ///
    /// # Errors
    ///
    /// - [`OrderStoreError::Integrity`] if an order lacks its delivery or payment
    /// - [`OrderStoreError::DatabaseError`] for any other failure
    fn load_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Order>, OrderStoreError>> + Send + '_>>;
}
