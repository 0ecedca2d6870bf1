//! Market events
//!
//! Every event that reaches the detector is one of four kinds. The wire
//! format is loose (fields under several alternate names, sometimes nested
//! under `meta`); [`normalize`] maps it into these typed variants before any
//! detection logic runs.

pub mod fields;
mod normalize;

pub use normalize::{NormalizeError, generate_order_ref, normalize, parse_timestamp};

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::entities::Side;
use crate::values::{AccountId, OrderRef, Quantity, Timestamp};

/// Order placement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderEvent {
    pub order_ref: Option<OrderRef>,
    pub account: Option<AccountId>,
    pub instrument: Option<String>,
    pub side: Option<Side>,
    pub quantity: Option<Quantity>,
}

/// Order cancellation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CancelEvent {
    pub order_ref: Option<OrderRef>,
    pub account: Option<AccountId>,
}

/// Trade execution between a buy and a sell account
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradeEvent {
    pub buy_account: Option<AccountId>,
    pub sell_account: Option<AccountId>,
    pub instrument: Option<String>,
    pub quantity: Option<Quantity>,
    /// Order reference of the buy side, from `related_to`
    pub buy_order_ref: Option<OrderRef>,
    /// Order reference of the sell side, from `related_to`
    pub sell_order_ref: Option<OrderRef>,
}

impl TradeEvent {
    /// Both sides resolve to the same account
    pub fn is_self_trade(&self) -> bool {
        matches!((&self.buy_account, &self.sell_account), (Some(b), Some(s)) if b == s)
    }

    /// The other side of the trade from `account`'s point of view.
    ///
    /// Returns None unless both sides are known and `account` is one of them.
    pub fn counterparty_of(&self, account: &str) -> Option<&str> {
        match (self.buy_account.as_deref(), self.sell_account.as_deref()) {
            (Some(buy), Some(sell)) if buy == account => Some(sell),
            (Some(buy), Some(sell)) if sell == account => Some(buy),
            _ => None,
        }
    }
}

/// Off-exchange movement of assets between two accounts
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustodyTransferEvent {
    pub from: Option<AccountId>,
    pub to: Option<AccountId>,
    pub instrument: Option<String>,
}

/// Kind-specific payload
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Order(OrderEvent),
    Cancel(CancelEvent),
    Trade(TradeEvent),
    CustodyTransfer(CustodyTransferEvent),
}

impl EventKind {
    /// Wire name of the kind
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Order(_) => "order",
            EventKind::Cancel(_) => "cancel",
            EventKind::Trade(_) => "trade",
            EventKind::CustodyTransfer(_) => "custody_transfer",
        }
    }
}

/// A normalized, immutable market event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Resolved event time
    pub timestamp: Timestamp,
    /// The payload carried no parseable timestamp and ingestion time was used
    pub timestamp_inferred: bool,
    pub kind: EventKind,
    /// The original wire object, kept for evidence output
    pub attributes: Map<String, Value>,
}

impl Event {
    /// Build an event from typed parts, synthesizing the wire attributes
    pub fn new(kind: EventKind, timestamp: Timestamp) -> Self {
        let mut attributes = Map::new();
        attributes.insert("type".to_string(), Value::from(kind.label()));
        attributes.insert("ts".to_string(), Value::from(format_timestamp(timestamp)));
        Self {
            timestamp,
            timestamp_inferred: false,
            kind,
            attributes,
        }
    }

    /// Attach an extra wire attribute (builder)
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn order(order: OrderEvent, timestamp: Timestamp) -> Self {
        let mut event = Self::new(EventKind::Order(order.clone()), timestamp);
        put(&mut event.attributes, "order_ref", order.order_ref);
        put(&mut event.attributes, "account", order.account);
        put(&mut event.attributes, "instrument", order.instrument);
        if let Some(side) = order.side {
            let label = match side {
                Side::Buy => "buy",
                Side::Sell => "sell",
            };
            event.attributes.insert("side".to_string(), Value::from(label));
        }
        if let Some(qty) = order.quantity {
            event.attributes.insert("qty".to_string(), Value::from(qty.to_string()));
        }
        event
    }

    pub fn cancel(cancel: CancelEvent, timestamp: Timestamp) -> Self {
        let mut event = Self::new(EventKind::Cancel(cancel.clone()), timestamp);
        put(&mut event.attributes, "order_ref", cancel.order_ref);
        put(&mut event.attributes, "account", cancel.account);
        event
    }

    pub fn trade(trade: TradeEvent, timestamp: Timestamp) -> Self {
        let mut event = Self::new(EventKind::Trade(trade.clone()), timestamp);
        put(&mut event.attributes, "buy_account", trade.buy_account);
        put(&mut event.attributes, "sell_account", trade.sell_account);
        put(&mut event.attributes, "instrument", trade.instrument);
        if let Some(qty) = trade.quantity {
            event.attributes.insert("qty".to_string(), Value::from(qty.to_string()));
        }
        if trade.buy_order_ref.is_some() || trade.sell_order_ref.is_some() {
            let mut related = Map::new();
            put(&mut related, "buy_order", trade.buy_order_ref);
            put(&mut related, "sell_order", trade.sell_order_ref);
            event
                .attributes
                .insert("related_to".to_string(), Value::Object(related));
        }
        event
    }

    pub fn custody_transfer(transfer: CustodyTransferEvent, timestamp: Timestamp) -> Self {
        let mut event = Self::new(EventKind::CustodyTransfer(transfer.clone()), timestamp);
        put(&mut event.attributes, "from", transfer.from);
        put(&mut event.attributes, "to", transfer.to);
        put(&mut event.attributes, "instrument", transfer.instrument);
        event
    }

    /// Every account named anywhere in the event
    pub fn participants(&self) -> Vec<&str> {
        let slots: [Option<&AccountId>; 2] = match &self.kind {
            EventKind::Order(o) => [o.account.as_ref(), None],
            EventKind::Cancel(c) => [c.account.as_ref(), None],
            EventKind::Trade(t) => [t.buy_account.as_ref(), t.sell_account.as_ref()],
            EventKind::CustodyTransfer(c) => [c.from.as_ref(), c.to.as_ref()],
        };
        slots.into_iter().flatten().map(String::as_str).collect()
    }

    /// Returns true if any participant is in `accounts`
    pub fn involves<F>(&self, mut is_member: F) -> bool
    where
        F: FnMut(&str) -> bool,
    {
        self.participants().into_iter().any(|acct| is_member(acct))
    }

    pub fn as_trade(&self) -> Option<&TradeEvent> {
        match &self.kind {
            EventKind::Trade(trade) => Some(trade),
            _ => None,
        }
    }

    /// Wire name of the event kind
    pub fn label(&self) -> &'static str {
        self.kind.label()
    }
}

impl Serialize for Event {
    /// Events serialize as their wire object, so evidence output mirrors
    /// what was ingested.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.attributes.serialize(serializer)
    }
}

/// Fixed-width ISO-8601 UTC rendering used on the wire (`2025-01-01T12:00:00.000000Z`)
pub fn format_timestamp(ts: Timestamp) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn put(map: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        map.insert(key.to_string(), Value::from(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_trade_participants_and_counterparty() {
        let event = Event::trade(
            TradeEvent {
                buy_account: Some("A".into()),
                sell_account: Some("B".into()),
                ..Default::default()
            },
            ts(),
        );

        assert_eq!(event.participants(), vec!["A", "B"]);
        let trade = event.as_trade().unwrap();
        assert_eq!(trade.counterparty_of("A"), Some("B"));
        assert_eq!(trade.counterparty_of("B"), Some("A"));
        assert_eq!(trade.counterparty_of("C"), None);
        assert!(!trade.is_self_trade());
    }

    #[test]
    fn test_custody_participants_include_receiver() {
        let event = Event::custody_transfer(
            CustodyTransferEvent {
                from: Some("A".into()),
                to: Some("X".into()),
                instrument: None,
            },
            ts(),
        );
        assert!(event.involves(|a| a == "X"));
        assert!(!event.involves(|a| a == "Q"));
    }

    #[test]
    fn test_typed_constructor_synthesizes_wire_attributes() {
        let event = Event::order(
            OrderEvent {
                order_ref: Some("O-1".into()),
                account: Some("A".into()),
                instrument: Some("XYZ".into()),
                side: Some(Side::Sell),
                quantity: None,
            },
            ts(),
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "order");
        assert_eq!(json["order_ref"], "O-1");
        assert_eq!(json["side"], "sell");
        assert_eq!(json["ts"], "2025-03-01T09:30:00.000000Z");
    }
}
