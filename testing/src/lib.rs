//! # orderstream testing
//!
//! Test doubles and fixtures for the order ingestion service.
//!
//! - [`InMemoryOrderStore`]: `HashMap`-backed [`OrderStore`](orderstream_core::OrderStore)
//!   that counts save calls and can be told to fail
//! - [`InMemoryMessageBus`]: per-topic log with live subscribers
//! - [`fixtures`]: admissible orders and a builder to vary them
//!
//! ## Example
//!
//! ```ignore
//! use orderstream_testing::{InMemoryMessageBus, InMemoryOrderStore, fixtures};
//!
//! let store = InMemoryOrderStore::new();
//! let bus = InMemoryMessageBus::new();
//! bus.publish_order("orders", &fixtures::valid_order("order_abc")).await?;
//! ```

pub mod fixtures;
mod message_bus;
mod order_store;

pub use message_bus::InMemoryMessageBus;
pub use order_store::InMemoryOrderStore;
