//! Field precedence lists for the wire format
//!
//! Producers disagree on where they put things: the same account can show up
//! as `buy_account`, `meta.buy_account` or `meta.maker`. Each list below is
//! tried in order and the first non-empty value wins. Keeping every list here
//! means the resolution rules can be read (and tested) in one place.

use serde_json::{Map, Value};

/// Location of a field inside a wire object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPath {
    /// Top-level key
    Top(&'static str),
    /// Key inside a nested object, e.g. `meta.buy_account`
    Nested(&'static str, &'static str),
}

use FieldPath::{Nested, Top};

pub const KIND: &[FieldPath] = &[Top("type"), Top("event_type"), Top("kind")];

pub const TIMESTAMP: &[FieldPath] = &[Top("ts"), Top("timestamp"), Top("time")];

pub const ACCOUNT: &[FieldPath] = &[Top("account"), Nested("meta", "account")];

pub const INSTRUMENT: &[FieldPath] = &[
    Top("instrument"),
    Top("symbol"),
    Nested("meta", "instrument"),
];

pub const ORDER_REF: &[FieldPath] = &[Top("order_ref"), Top("id"), Nested("meta", "order_ref")];

/// Cancels carry their own event id under `id`, so it is not an order reference here
pub const CANCEL_ORDER_REF: &[FieldPath] = &[Top("order_ref"), Nested("meta", "order_ref")];

pub const SIDE: &[FieldPath] = &[Top("side"), Nested("meta", "side")];

pub const QUANTITY: &[FieldPath] = &[Top("qty"), Top("quantity"), Nested("meta", "qty")];

pub const BUY_ACCOUNT: &[FieldPath] = &[
    Nested("meta", "buy_account"),
    Top("buy_account"),
    Nested("meta", "maker"),
    Top("maker"),
];

pub const SELL_ACCOUNT: &[FieldPath] = &[
    Nested("meta", "sell_account"),
    Top("sell_account"),
    Nested("meta", "taker"),
    Top("taker"),
];

pub const BUY_ORDER_REF: &[FieldPath] = &[
    Nested("related_to", "buy_order"),
    Nested("related_to", "buy_ref"),
];

pub const SELL_ORDER_REF: &[FieldPath] = &[
    Nested("related_to", "sell_order"),
    Nested("related_to", "sell_ref"),
];

pub const CUSTODY_FROM: &[FieldPath] = &[
    Nested("meta", "from"),
    Top("from"),
    Nested("meta", "sender"),
];

pub const CUSTODY_TO: &[FieldPath] = &[
    Nested("meta", "to"),
    Top("to"),
    Nested("meta", "receiver"),
];

impl FieldPath {
    /// Look the path up in a wire object
    pub fn get<'a>(&self, object: &'a Map<String, Value>) -> Option<&'a Value> {
        match self {
            Top(key) => object.get(*key),
            Nested(parent, key) => object.get(*parent)?.as_object()?.get(*key),
        }
    }
}

/// First present, non-null, non-empty value along `paths`
pub fn first_value<'a>(object: &'a Map<String, Value>, paths: &[FieldPath]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|path| path.get(object))
        .find(|value| !is_blank(value))
}

/// First value along `paths` rendered as an identifier string.
///
/// Numbers are accepted and stringified, since some producers emit numeric
/// account or order ids.
pub fn first_string(object: &Map<String, Value>, paths: &[FieldPath]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| path.get(object))
        .find_map(as_identifier)
}

fn as_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
