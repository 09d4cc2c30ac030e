//! Admission rules for the Order Aggregate.
//!
//! [`validate_order`] is a pure function: no I/O, no side effects. It walks
//! the aggregate root first, then delivery, payment and items, and stops at
//! the first rule that fails. The returned [`ValidationError`] names the
//! offending field so a rejected message can be traced back and replayed by
//! hand from the topic's retention window.
//!
//! An order is admissible only if every child record is. One bad item rejects
//! the whole order, and an order with no items is never admissible.

use crate::model::{Delivery, Item, Order, Payment, UNSET_TIMESTAMP};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why an order was refused admission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field is empty.
    #[error("missing required field '{field}'")]
    MissingField {
        /// Dotted path of the field, e.g. `delivery.city`.
        field: &'static str,
    },

    /// `date_created` is unset.
    #[error("creation date is not set")]
    InvalidCreationDate,

    /// The delivery email is not a syntactically valid address.
    #[error("invalid email address '{0}'")]
    InvalidEmail(String),

    /// A numeric field that must be strictly positive is not.
    #[error("field '{field}' must be positive, got {value}")]
    NotPositive {
        /// Dotted path of the field.
        field: &'static str,
        /// Offending value.
        value: i64,
    },

    /// A numeric field that must not be negative is.
    #[error("field '{field}' must not be negative, got {value}")]
    Negative {
        /// Dotted path of the field.
        field: &'static str,
        /// Offending value.
        value: i64,
    },

    /// The order carries no items.
    #[error("order has no items")]
    NoItems,

    /// One of the items failed its own rules.
    #[error("item {index} is invalid: {reason}")]
    InvalidItem {
        /// Zero-based position of the item.
        index: usize,
        /// What was wrong with it.
        #[source]
        reason: Box<ValidationError>,
    },
}

impl Order {
    /// Check this order against the admission rules.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_order(self)
    }
}

/// Decide whether `order` may be persisted and cached.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered, in the order: root
/// fields, creation date, delivery, payment, items.
pub fn validate_order(order: &Order) -> Result<(), ValidationError> {
    require("order_uid", &order.order_uid)?;
    require("track_number", &order.track_number)?;
    require("entry", &order.entry)?;
    require("locale", &order.locale)?;
    require("customer_id", &order.customer_id)?;
    require("delivery_service", &order.delivery_service)?;
    require_timestamp(order.date_created)?;

    validate_delivery(&order.delivery)?;
    validate_payment(&order.payment)?;

    if order.items.is_empty() {
        return Err(ValidationError::NoItems);
    }
    for (index, item) in order.items.iter().enumerate() {
        validate_item(item).map_err(|reason| ValidationError::InvalidItem {
            index,
            reason: Box::new(reason),
        })?;
    }

    Ok(())
}

fn validate_delivery(delivery: &Delivery) -> Result<(), ValidationError> {
    require("delivery.name", &delivery.name)?;
    require("delivery.phone", &delivery.phone)?;
    require("delivery.zip", &delivery.zip)?;
    require("delivery.city", &delivery.city)?;
    require("delivery.address", &delivery.address)?;
    require("delivery.region", &delivery.region)?;

    if is_valid_email(&delivery.email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(delivery.email.clone()))
    }
}

fn validate_payment(payment: &Payment) -> Result<(), ValidationError> {
    require("payment.transaction", &payment.transaction)?;
    require("payment.request_id", &payment.request_id)?;
    require("payment.currency", &payment.currency)?;
    require("payment.provider", &payment.provider)?;
    require_positive("payment.amount", payment.amount)?;
    require_positive("payment.payment_dt", payment.payment_dt)?;
    if payment.delivery_cost < 0 {
        return Err(ValidationError::Negative {
            field: "payment.delivery_cost",
            value: payment.delivery_cost,
        });
    }
    require_positive("payment.goods_total", payment.goods_total)
}

fn validate_item(item: &Item) -> Result<(), ValidationError> {
    require_positive("chrt_id", item.chrt_id)?;
    require_positive("nm_id", item.nm_id)?;
    require("track_number", &item.track_number)?;
    require("rid", &item.rid)?;
    require("name", &item.name)?;
    require("brand", &item.brand)?;
    require_positive("price", item.price)
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        Err(ValidationError::MissingField { field })
    } else {
        Ok(())
    }
}

fn require_positive(field: &'static str, value: i64) -> Result<(), ValidationError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ValidationError::NotPositive { field, value })
    }
}

fn require_timestamp(value: DateTime<Utc>) -> Result<(), ValidationError> {
    if value == UNSET_TIMESTAMP {
        Err(ValidationError::InvalidCreationDate)
    } else {
        Ok(())
    }
}

/// Syntactic mail address check.
///
/// Accepts `local@domain` and `Display Name <local@domain>`. The domain is one
/// or more dot-separated labels; a single label such as `localhost` is allowed.
///
/// Stricter than RFC 5322 parsers: quoted local parts (`"john doe"@b.com`)
/// and domain literals (`a@[127.0.0.1]`) are rejected.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let address = match (email.rfind('<'), email.strip_suffix('>')) {
        (Some(open), Some(inner)) => &inner[open + 1..],
        (None, None) => email.trim(),
        _ => return false,
    };

    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    if domain.contains('@') {
        return false;
    }

    is_valid_local_part(local) && is_valid_domain(domain)
}

fn is_valid_local_part(local: &str) -> bool {
    const SPECIALS: &str = "!#$%&'*+/=?^_`{|}~-";

    !local.is_empty()
        && local
            .split('.')
            .all(|atom| !atom.is_empty() && atom.chars().all(|c| c.is_alphanumeric() || SPECIALS.contains(c)))
}

fn is_valid_domain(domain: &str) -> bool {
    !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn admissible() -> Order {
        Order {
            order_uid: "order_abc".to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
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
                transaction: "order_abc".to_string(),
                request_id: "req-1".to_string(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 500,
                payment_dt: 1_637_907_727,
                bank: "alpha".to_string(),
                delivery_cost: 0,
                goods_total: 500,
                custom_fee: 0,
            },
            items: vec![Item {
                chrt_id: 9_934_930,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 500,
                rid: "ab4219087a764ae0btest".to_string(),
                name: "Mascaras".to_string(),
                sale: 0,
                size: "0".to_string(),
                total_price: 500,
                nm_id: 2_389_212,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            }],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: "2021-11-26T06:22:19Z".parse().unwrap(),
            oof_shard: "1".to_string(),
        }
    }

    #[test]
    fn accepts_complete_order() {
        assert_eq!(admissible().validate(), Ok(()));
    }

    #[test]
    fn rejects_order_without_items() {
        let mut order = admissible();
        order.items.clear();

        assert_eq!(validate_order(&order), Err(ValidationError::NoItems));
    }

    #[test]
    fn rejects_malformed_email_even_when_everything_else_is_valid() {
        let mut order = admissible();
        order.delivery.email = "not-an-email".to_string();

        assert_eq!(
            validate_order(&order),
            Err(ValidationError::InvalidEmail("not-an-email".to_string()))
        );
    }

    #[test]
    fn one_bad_item_rejects_the_order() {
        let mut order = admissible();
        let mut bad = order.items[0].clone();
        bad.price = 0;
        order.items.push(bad);

        let err = validate_order(&order).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidItem {
                index: 1,
                reason: Box::new(ValidationError::NotPositive { field: "price", value: 0 }),
            }
        );
        assert_eq!(err.to_string(), "item 1 is invalid: field 'price' must be positive, got 0");
    }

    #[test]
    fn zero_delivery_cost_is_allowed_but_negative_is_not() {
        let mut order = admissible();
        order.payment.delivery_cost = 0;
        assert!(order.validate().is_ok());

        order.payment.delivery_cost = -1;
        assert_eq!(
            order.validate(),
            Err(ValidationError::Negative { field: "payment.delivery_cost", value: -1 })
        );
    }

    #[test]
    fn unset_creation_date_is_rejected() {
        let mut order = admissible();
        order.date_created = UNSET_TIMESTAMP;

        assert_eq!(order.validate(), Err(ValidationError::InvalidCreationDate));
    }

    #[test]
    fn pre_epoch_creation_date_is_admitted() {
        let mut order = admissible();
        order.date_created = "1969-07-20T20:17:40Z".parse().unwrap();
        assert_eq!(order.validate(), Ok(()));

        order.date_created = DateTime::<Utc>::UNIX_EPOCH;
        assert_eq!(order.validate(), Ok(()));
    }

    #[test]
    fn creation_date_missing_from_payload_is_rejected() {
        let mut json = serde_json::to_value(admissible()).unwrap();
        json.as_object_mut().unwrap().remove("date_created");
        let order: Order = serde_json::from_value(json).unwrap();

        assert_eq!(order.validate(), Err(ValidationError::InvalidCreationDate));
    }

    #[test]
    fn first_failure_wins() {
        let mut order = admissible();
        order.order_uid.clear();
        order.items.clear();

        assert_eq!(
            order.validate(),
            Err(ValidationError::MissingField { field: "order_uid" })
        );
    }

    #[test]
    fn quoted_local_parts_and_domain_literals_are_rejected() {
        assert!(!is_valid_email("\"john doe\"@b.com"));
        assert!(!is_valid_email("a@[127.0.0.1]"));
    }

    #[test]
    fn email_forms() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("first.last+tag@mail.example.org"));
        assert!(is_valid_email("user@localhost"));
        assert!(is_valid_email("Test Testov <test@gmail.com>"));

        assert!(!is_valid_email(""));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("@b.com"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("a@@b.com"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email(".a@b.com"));
        assert!(!is_valid_email("a@b..com"));
        assert!(!is_valid_email("a@-b.com"));
        assert!(!is_valid_email("Name <a@b.com"));
    }

    /// Blank out the nth required text field of an otherwise valid order.
    fn clear_required(order: &mut Order, n: usize) {
        let field = match n {
            0 => &mut order.order_uid,
            1 => &mut order.track_number,
            2 => &mut order.entry,
            3 => &mut order.locale,
            4 => &mut order.customer_id,
            5 => &mut order.delivery_service,
            6 => &mut order.delivery.name,
            7 => &mut order.delivery.phone,
            8 => &mut order.delivery.zip,
            9 => &mut order.delivery.city,
            10 => &mut order.delivery.address,
            11 => &mut order.delivery.region,
            12 => &mut order.delivery.email,
            13 => &mut order.payment.transaction,
            14 => &mut order.payment.request_id,
            15 => &mut order.payment.currency,
            16 => &mut order.payment.provider,
            17 => &mut order.items[0].track_number,
            18 => &mut order.items[0].rid,
            19 => &mut order.items[0].name,
            _ => &mut order.items[0].brand,
        };
        field.clear();
    }

    proptest! {
        #[test]
        fn any_missing_required_field_is_rejected(n in 0usize..21) {
            let mut order = admissible();
            clear_required(&mut order, n);
            prop_assert!(order.validate().is_err());
        }

        #[test]
        fn any_non_positive_amount_is_rejected(amount in i64::MIN..=0) {
            let mut order = admissible();
            order.payment.amount = amount;
            prop_assert_eq!(
                order.validate(),
                Err(ValidationError::NotPositive { field: "payment.amount", value: amount })
            );
        }

        #[test]
        fn any_non_positive_item_id_is_rejected(chrt_id in i64::MIN..=0, index in 0usize..3) {
            let mut order = admissible();
            let template = order.items[0].clone();
            order.items = vec![template; 3];
            order.items[index].chrt_id = chrt_id;

            let rejected = matches!(
                order.validate(),
                Err(ValidationError::InvalidItem { index: i, .. }) if i == index
            );
            prop_assert!(rejected);
        }
    }
}
