//! Table definitions, applied idempotently at startup.
//!
//! `deliveries` and `payments` use the order id as both primary and foreign
//! key, which makes the 1:1 relationship a storage-level constraint. Items
//! keep a `position` column so the sequence reads back in submission order.

pub(crate) const STATEMENTS: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS orders (
        order_uid VARCHAR(255) PRIMARY KEY,
        track_number VARCHAR(255) NOT NULL,
        entry VARCHAR(255) NOT NULL,
        locale VARCHAR(10) NOT NULL,
        internal_signature VARCHAR(255) NOT NULL,
        customer_id VARCHAR(255) NOT NULL,
        delivery_service VARCHAR(255) NOT NULL,
        shardkey VARCHAR(255) NOT NULL,
        sm_id INTEGER NOT NULL,
        date_created TIMESTAMPTZ NOT NULL,
        oof_shard VARCHAR(255) NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS deliveries (
        order_uid VARCHAR(255) PRIMARY KEY REFERENCES orders(order_uid),
        name VARCHAR(255) NOT NULL,
        phone VARCHAR(20) NOT NULL,
        zip VARCHAR(20) NOT NULL,
        city VARCHAR(255) NOT NULL,
        address VARCHAR(255) NOT NULL,
        region VARCHAR(255) NOT NULL,
        email VARCHAR(255) NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS payments (
        order_uid VARCHAR(255) PRIMARY KEY REFERENCES orders(order_uid),
        transaction VARCHAR(255) NOT NULL,
        request_id VARCHAR(255) NOT NULL,
        currency VARCHAR(10) NOT NULL,
        provider VARCHAR(255) NOT NULL,
        amount BIGINT NOT NULL,
        payment_dt BIGINT NOT NULL,
        bank VARCHAR(255) NOT NULL,
        delivery_cost BIGINT NOT NULL,
        goods_total BIGINT NOT NULL,
        custom_fee BIGINT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS items (
        id BIGSERIAL PRIMARY KEY,
        order_uid VARCHAR(255) NOT NULL REFERENCES orders(order_uid),
        position INTEGER NOT NULL,
        chrt_id BIGINT NOT NULL,
        track_number VARCHAR(255) NOT NULL,
        price BIGINT NOT NULL,
        rid VARCHAR(255) NOT NULL,
        name VARCHAR(255) NOT NULL,
        sale INTEGER NOT NULL,
        size VARCHAR(10) NOT NULL,
        total_price BIGINT NOT NULL,
        nm_id BIGINT NOT NULL,
        brand VARCHAR(255) NOT NULL,
        status INTEGER NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_items_order_uid ON items(order_uid, position)",
];
