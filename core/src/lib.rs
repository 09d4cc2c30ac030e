//! # orderstream core
//!
//! Shared vocabulary for the order ingestion service.
//!
//! - [`model`]: the Order Aggregate (order, delivery, payment, items) as it
//!   travels on the stream and is served by the lookup endpoint
//! - [`validation`]: the admission check every aggregate passes before it is
//!   persisted or cached
//! - [`order_store`]: the durable storage seam ([`OrderStore`])
//! - [`message_bus`]: the stream seam ([`MessageBus`])
//!
//! Both seams are dyn-compatible traits so the runtime can hold
//! `Arc<dyn OrderStore>` and `Arc<dyn MessageBus>` and tests can swap in
//! in-memory doubles.

pub mod message_bus;
pub mod model;
pub mod order_store;
pub mod validation;

pub use chrono::{DateTime, Utc};
pub use message_bus::{BusError, InboundMessage, MessageBus, MessageStream, OutboundMessage};
pub use model::{Delivery, Item, Order, Payment, UNSET_TIMESTAMP};
pub use order_store::{OrderStore, OrderStoreError};
pub use validation::{ValidationError, validate_order};
