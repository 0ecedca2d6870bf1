use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::fields::{self, first_string, first_value};
use super::{
    CancelEvent, CustodyTransferEvent, Event, EventKind, OrderEvent, TradeEvent, format_timestamp,
};
use crate::entities::Side;
use crate::values::{OrderRef, Quantity, Timestamp};

/// Reasons a wire payload cannot become an [`Event`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Event payload is not a JSON object")]
    NotAnObject,

    #[error("Event payload has no type field")]
    MissingKind,

    #[error("Unsupported event type: {0}")]
    UnsupportedKind(String),
}

/// Map a heterogeneous wire object into a typed [`Event`].
///
/// Only the shape of the envelope can fail. Missing or malformed
/// kind-specific fields come back as `None` so the ingestor can skip the
/// matching ledger or graph update.
pub fn normalize(raw: &Value, fallback_now: Timestamp) -> Result<Event, NormalizeError> {
    let object = raw.as_object().ok_or(NormalizeError::NotAnObject)?;

    let kind_label = first_string(object, fields::KIND)
        .ok_or(NormalizeError::MissingKind)?
        .to_ascii_lowercase();

    let kind = match kind_label.as_str() {
        "order" => EventKind::Order(order_fields(object)),
        "cancel" => EventKind::Cancel(CancelEvent {
            order_ref: first_string(object, fields::CANCEL_ORDER_REF),
            account: first_string(object, fields::ACCOUNT),
        }),
        "trade" => EventKind::Trade(TradeEvent {
            buy_account: first_string(object, fields::BUY_ACCOUNT),
            sell_account: first_string(object, fields::SELL_ACCOUNT),
            instrument: first_string(object, fields::INSTRUMENT),
            quantity: quantity(object),
            buy_order_ref: first_string(object, fields::BUY_ORDER_REF),
            sell_order_ref: first_string(object, fields::SELL_ORDER_REF),
        }),
        "custody_transfer" | "custody" | "transfer" => {
            EventKind::CustodyTransfer(CustodyTransferEvent {
                from: first_string(object, fields::CUSTODY_FROM),
                to: first_string(object, fields::CUSTODY_TO),
                instrument: first_string(object, fields::INSTRUMENT),
            })
        }
        other => return Err(NormalizeError::UnsupportedKind(other.to_string())),
    };

    let parsed = first_value(object, fields::TIMESTAMP).and_then(parse_timestamp);
    let timestamp_inferred = parsed.is_none();
    let timestamp = parsed.unwrap_or(fallback_now);

    let mut attributes = object.clone();
    if timestamp_inferred {
        attributes.insert("ts".to_string(), Value::from(format_timestamp(timestamp)));
    }

    Ok(Event {
        timestamp,
        timestamp_inferred,
        kind,
        attributes,
    })
}

fn order_fields(object: &Map<String, Value>) -> OrderEvent {
    OrderEvent {
        order_ref: first_string(object, fields::ORDER_REF),
        account: first_string(object, fields::ACCOUNT),
        instrument: first_string(object, fields::INSTRUMENT),
        side: first_string(object, fields::SIDE).and_then(|s| Side::parse(&s)),
        quantity: quantity(object),
    }
}

fn quantity(object: &Map<String, Value>) -> Option<Quantity> {
    match first_value(object, fields::QUANTITY)? {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Parse a wire timestamp.
///
/// Accepts RFC 3339 (`2025-01-01T12:00:00Z`, with or without offset),
/// naive ISO-8601 read as UTC, and numeric epoch seconds. Numbers above
/// 10^11 are taken as epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => {
            let raw = n.as_f64()?;
            if !raw.is_finite() {
                return None;
            }
            let millis = if raw.abs() > 1e11 { raw } else { raw * 1_000.0 };
            Utc.timestamp_millis_opt(millis.round() as i64).single()
        }
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<Timestamp> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = s.trim_end_matches(['Z', 'z']);
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Reference for orders that arrive without one: `ORD-` plus 8 hex digits
pub fn generate_order_ref() -> OrderRef {
    let id = Uuid::new_v4().simple().to_string();
    format!("ORD-{}", &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_order_with_aliases() {
        let raw = json!({
            "type": "ORDER",
            "timestamp": "2025-01-01T10:00:00Z",
            "id": "O-9",
            "meta": { "account": "ACC-1" },
            "symbol": "XYZ",
            "side": "buy",
            "quantity": "12.5"
        });
        let event = normalize(&raw, now()).unwrap();

        assert!(!event.timestamp_inferred);
        assert_eq!(event.timestamp, Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap());
        let EventKind::Order(order) = &event.kind else {
            panic!("expected order");
        };
        assert_eq!(order.order_ref.as_deref(), Some("O-9"));
        assert_eq!(order.account.as_deref(), Some("ACC-1"));
        assert_eq!(order.instrument.as_deref(), Some("XYZ"));
        assert_eq!(order.side, Some(Side::Buy));
        assert_eq!(order.quantity, Some(dec!(12.5)));
    }

    #[test]
    fn test_missing_timestamp_falls_back_to_now() {
        let raw = json!({ "type": "cancel", "order_ref": "O-1", "account": "A" });
        let event = normalize(&raw, now()).unwrap();

        assert!(event.timestamp_inferred);
        assert_eq!(event.timestamp, now());
        assert_eq!(event.attributes["ts"], "2025-06-01T00:00:00.000000Z");
    }

    #[test]
    fn test_unparseable_timestamp_falls_back_to_now() {
        let raw = json!({ "type": "order", "ts": "yesterday-ish", "account": "A" });
        let event = normalize(&raw, now()).unwrap();
        assert!(event.timestamp_inferred);
        assert_eq!(event.timestamp, now());
    }

    #[test]
    fn test_trade_with_nested_accounts_and_related_orders() {
        let raw = json!({
            "type": "trade",
            "ts": "2025-01-01T10:00:01.250Z",
            "instrument": "XYZ",
            "qty": 3,
            "meta": { "maker": "A", "sell_account": "B" },
            "related_to": { "buy_order": "O-1", "sell_ref": "O-2" }
        });
        let event = normalize(&raw, now()).unwrap();
        let trade = event.as_trade().unwrap();

        assert_eq!(trade.buy_account.as_deref(), Some("A"));
        assert_eq!(trade.sell_account.as_deref(), Some("B"));
        assert_eq!(trade.buy_order_ref.as_deref(), Some("O-1"));
        assert_eq!(trade.sell_order_ref.as_deref(), Some("O-2"));
        assert_eq!(trade.quantity, Some(dec!(3)));
    }

    #[test]
    fn test_custody_transfer_nested_endpoints() {
        let raw = json!({
            "type": "custody_transfer",
            "ts": "2025-01-01T10:00:00Z",
            "meta": { "from": "A", "to": "X" }
        });
        let event = normalize(&raw, now()).unwrap();
        let EventKind::CustodyTransfer(transfer) = &event.kind else {
            panic!("expected custody transfer");
        };
        assert_eq!(transfer.from.as_deref(), Some("A"));
        assert_eq!(transfer.to.as_deref(), Some("X"));
    }

    #[test]
    fn test_envelope_errors() {
        assert_eq!(normalize(&json!([1, 2]), now()), Err(NormalizeError::NotAnObject));
        assert_eq!(normalize(&json!({ "ts": "x" }), now()), Err(NormalizeError::MissingKind));
        assert_eq!(
            normalize(&json!({ "type": "heartbeat" }), now()),
            Err(NormalizeError::UnsupportedKind("heartbeat".to_string()))
        );
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp(&json!("2025-01-01T10:00:00Z")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2025-01-01T11:00:00+01:00")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2025-01-01T10:00:00")), Some(expected));
        assert_eq!(parse_timestamp(&json!(expected.timestamp())), Some(expected));
        assert_eq!(
            parse_timestamp(&json!(expected.timestamp_millis())),
            Some(expected)
        );
        assert_eq!(parse_timestamp(&json!(true)), None);
    }

    #[test]
    fn test_generated_order_ref_shape() {
        let r = generate_order_ref();
        assert!(r.starts_with("ORD-"));
        assert_eq!(r.len(), 12);
    }
}
