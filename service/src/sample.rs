//! Randomized, admissible orders for the `publish-orders` tool.

use chrono::{TimeZone, Utc};
use orderstream_core::model::{Delivery, Item, Order, Payment};
use rand::Rng;
use rand::seq::SliceRandom;

const CITIES: &[&str] = &["Kiryat Mozkin", "Haifa", "Tel Aviv", "Moscow", "Kazan"];
const BRANDS: &[&str] = &["Vivienne Sabo", "Maybelline", "Nivea", "L'Oreal"];
const CURRENCIES: &[&str] = &["USD", "EUR", "RUB"];

/// Build the `n`th test order, `test_order_<n>`, with random contents.
///
/// Amounts are consistent: `goods_total` is the sum of the item totals and
/// `amount` adds the delivery cost on top.
pub fn sample_order<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Order {
    let order_uid = format!("test_order_{n}");
    let track_number = format!("WBILM{:08}", rng.gen_range(0..100_000_000u32));

    let item_count = rng.gen_range(1..=3);
    let items: Vec<Item> = (0..item_count)
        .map(|i| sample_item(&track_number, i, rng))
        .collect();
    let goods_total: i64 = items.iter().map(|item| item.total_price).sum();
    let delivery_cost = rng.gen_range(0..=1_500);

    let created = Utc::now();
    Order {
        order_uid: order_uid.clone(),
        track_number: track_number.clone(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: format!("+972{:07}", rng.gen_range(0..10_000_000u32)),
            zip: rng.gen_range(1_000_000..9_999_999u32).to_string(),
            city: pick(CITIES, rng),
            address: format!("Ploshad Mira {}", rng.gen_range(1..200)),
            region: "Kraiot".to_string(),
            email: format!("customer{}@example.com", rng.gen_range(1..10_000)),
        },
        payment: Payment {
            transaction: order_uid,
            request_id: format!("req-{n}"),
            currency: pick(CURRENCIES, rng),
            provider: "wbpay".to_string(),
            amount: goods_total + delivery_cost,
            payment_dt: created.timestamp(),
            bank: "alpha".to_string(),
            delivery_cost,
            goods_total,
            custom_fee: 0,
        },
        items,
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: format!("customer{}", rng.gen_range(1..1_000)),
        delivery_service: "meest".to_string(),
        shardkey: rng.gen_range(1..10).to_string(),
        sm_id: rng.gen_range(1..100),
        date_created: Utc.timestamp_opt(created.timestamp(), 0).single().unwrap_or(created),
        oof_shard: "1".to_string(),
    }
}

fn sample_item<R: Rng + ?Sized>(track_number: &str, index: usize, rng: &mut R) -> Item {
    let price = rng.gen_range(100..5_000);
    let sale = rng.gen_range(0..50);
    Item {
        chrt_id: rng.gen_range(1_000_000..9_999_999),
        track_number: track_number.to_string(),
        price,
        rid: format!("{:016x}{index}", rng.r#gen::<u64>()),
        name: "Mascaras".to_string(),
        sale,
        size: "0".to_string(),
        total_price: price * i64::from(100 - sale) / 100,
        nm_id: rng.gen_range(1_000_000..9_999_999),
        brand: pick(BRANDS, rng),
        status: 202,
    }
}

fn pick<R: Rng + ?Sized>(choices: &[&str], rng: &mut R) -> String {
    choices.choose(rng).copied().unwrap_or_default().to_string()
}
