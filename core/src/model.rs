//! The Order Aggregate.
//!
//! An [`Order`] owns exactly one [`Delivery`], exactly one [`Payment`] and an
//! ordered sequence of [`Item`]s. The aggregate is validated, persisted and
//! cached as one unit.
//!
//! Field names match the JSON carried on the `orders` topic. Every field
//! falls back to its default when absent, so an incomplete payload still
//! decodes and is then turned away by [`Order::validate`] with a precise
//! reason instead of a generic decode failure.
//!
//! A missing `date_created` decodes to [`UNSET_TIMESTAMP`], which no real
//! timestamp can equal. Decoded timestamps are truncated to microseconds, the
//! precision `PostgreSQL` keeps, so a cached order reads the same before and
//! after a reload from storage.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// `date_created` of an order whose payload did not carry one.
pub const UNSET_TIMESTAMP: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

/// Root of the aggregate, keyed by `order_uid`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    /// Globally unique order identifier. Cache key and storage primary key.
    pub order_uid: String,
    /// Tracking number.
    pub track_number: String,
    /// Entry channel code.
    pub entry: String,
    /// Recipient details.
    pub delivery: Delivery,
    /// Payment details.
    pub payment: Payment,
    /// Line items, in the order they were submitted.
    pub items: Vec<Item>,
    /// Locale, e.g. `en`.
    pub locale: String,
    /// Internal signature, may be empty.
    pub internal_signature: String,
    /// Customer identifier.
    pub customer_id: String,
    /// Delivery service code.
    pub delivery_service: String,
    /// Shard key.
    pub shardkey: String,
    /// Numeric shard id.
    pub sm_id: i32,
    /// Creation timestamp, [`UNSET_TIMESTAMP`] when absent.
    #[serde(default = "unset_timestamp", deserialize_with = "deserialize_micros")]
    pub date_created: DateTime<Utc>,
    /// Shard override flag.
    pub oof_shard: String,
}

/// Recipient of an order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    /// Recipient name.
    pub name: String,
    /// Phone number.
    pub phone: String,
    /// Postal code.
    pub zip: String,
    /// City.
    pub city: String,
    /// Street address.
    pub address: String,
    /// Region.
    pub region: String,
    /// Contact email.
    pub email: String,
}

/// Payment attached to an order. Amounts are integers in minor units.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    /// Transaction id.
    pub transaction: String,
    /// Request id.
    pub request_id: String,
    /// Currency code.
    pub currency: String,
    /// Payment provider.
    pub provider: String,
    /// Total amount.
    pub amount: i64,
    /// Payment time as Unix seconds.
    pub payment_dt: i64,
    /// Bank.
    pub bank: String,
    /// Delivery cost.
    pub delivery_cost: i64,
    /// Sum of goods.
    pub goods_total: i64,
    /// Customs fee.
    pub custom_fee: i64,
}

/// One line item of an order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    /// Catalog id.
    pub chrt_id: i64,
    /// Tracking number.
    pub track_number: String,
    /// Unit price.
    pub price: i64,
    /// Return id.
    pub rid: String,
    /// Product name.
    pub name: String,
    /// Sale percentage.
    pub sale: i32,
    /// Size label.
    pub size: String,
    /// Price after sale.
    pub total_price: i64,
    /// Numeric product id.
    pub nm_id: i64,
    /// Brand.
    pub brand: String,
    /// Status code.
    pub status: i32,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            order_uid: String::new(),
            track_number: String::new(),
            entry: String::new(),
            delivery: Delivery::default(),
            payment: Payment::default(),
            items: Vec::new(),
            locale: String::new(),
            internal_signature: String::new(),
            customer_id: String::new(),
            delivery_service: String::new(),
            shardkey: String::new(),
            sm_id: 0,
            date_created: UNSET_TIMESTAMP,
            oof_shard: String::new(),
        }
    }
}

const fn unset_timestamp() -> DateTime<Utc> {
    UNSET_TIMESTAMP
}

fn deserialize_micros<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    DateTime::<Utc>::deserialize(deserializer).map(|t| t.trunc_subsecs(6))
}

impl Order {
    /// Number of line items.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}
