//! Order fixtures.
//!
//! [`valid_order`] returns an order that passes every admission rule:
//! one item, email `a@b.com`, amount and goods total of 500.

use chrono::{DateTime, TimeZone, Utc};
use orderstream_core::model::{Delivery, Item, Order, Payment};

/// An admissible order with one item.
#[must_use]
pub fn valid_order(order_uid: &str) -> Order {
    OrderBuilder::new(order_uid).build()
}

/// JSON payload for `order`, as a producer would publish it.
#[must_use]
pub fn order_payload(order: &Order) -> Vec<u8> {
    serde_json::to_vec(order).unwrap_or_default()
}

/// Fluent builder over an admissible order.
///
/// ```ignore
/// let order = OrderBuilder::new("order_abc").items(3).email("not-an-email").build();
/// ```
#[derive(Clone, Debug)]
pub struct OrderBuilder {
    order: Order,
}

impl OrderBuilder {
    /// Start from an admissible order with one item.
    #[must_use]
    pub fn new(order_uid: &str) -> Self {
        let track_number = "WBILMTESTTRACK".to_string();
        let order = Order {
            order_uid: order_uid.to_string(),
            track_number: track_number.clone(),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                phone: "+9720000000".to_string(),
                zip: "2639809".to_string(),
                city: "Kiryat Mozkin".to_string(),
                address: "Ploshad Mira 15".to_string(),
                region: "Kraiot".to_string(),
                email: "a@b.com".to_string(),
            },
            payment: Payment {
                transaction: order_uid.to_string(),
                request_id: format!("req-{order_uid}"),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 500,
                payment_dt: 1_637_907_727,
                bank: "alpha".to_string(),
                delivery_cost: 0,
                goods_total: 500,
                custom_fee: 0,
            },
            items: vec![item(&track_number, 0)],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: created_at(),
            oof_shard: "1".to_string(),
        };
        Self { order }
    }

    /// Replace the items with `count` distinct admissible items.
    #[must_use]
    pub fn items(mut self, count: usize) -> Self {
        self.order.items = (0..count)
            .map(|n| item(&self.order.track_number, n))
            .collect();
        self
    }

    /// Set the delivery email.
    #[must_use]
    pub fn email(mut self, email: &str) -> Self {
        self.order.delivery.email = email.to_string();
        self
    }

    /// Set the payment amount.
    #[must_use]
    pub const fn amount(mut self, amount: i64) -> Self {
        self.order.payment.amount = amount;
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> Order {
        self.order
    }
}

fn item(track_number: &str, n: usize) -> Item {
    let n = i64::try_from(n).unwrap_or(i64::MAX - 9_934_930);
    Item {
        chrt_id: 9_934_930 + n,
        track_number: track_number.to_string(),
        price: 500,
        rid: format!("ab4219087a764ae0btest{n}"),
        name: "Mascaras".to_string(),
        sale: 0,
        size: "0".to_string(),
        total_price: 500,
        nm_id: 2_389_212 + n,
        brand: "Vivienne Sabo".to_string(),
        status: 202,
    }
}

fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
