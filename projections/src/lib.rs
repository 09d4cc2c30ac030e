//! Read model for orderstream.
//!
//! The [`OrderCache`] mirrors committed orders for point lookups. It is a
//! derived view: [`warm_start`] rebuilds it from the [`OrderStore`] at
//! startup, before the ingestion pipeline or the lookup endpoint go live,
//! and the pipeline keeps it current afterwards.
//!
//! ```text
//! startup:  OrderStore::load_all ──▶ OrderCache::load_many
//! runtime:  pipeline save ──▶ OrderCache::set      lookup ──▶ OrderCache::get
//! ```
//!
//! [`OrderStore`]: orderstream_core::OrderStore

pub mod cache;
pub mod warm_start;

pub use cache::OrderCache;
pub use warm_start::warm_start;
