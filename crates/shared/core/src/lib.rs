//! Vigil Core Domain
//!
//! Pure domain types for the Vigil manipulation detector.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod alert;
pub mod entities;
pub mod events;
pub mod signals;
pub mod values;

// Re-export commonly used types at crate root
pub use alert::{Alert, EvidencePack, new_alert_id};
pub use entities::{AccountStats, INSTRUMENT_PREFIX, NodeId, OrderRecord, Side, seconds_between};
pub use events::{
    CancelEvent, CustodyTransferEvent, Event, EventKind, NormalizeError, OrderEvent, TradeEvent,
    format_timestamp, generate_order_ref, normalize, parse_timestamp,
};
pub use signals::{SignalName, SignalSnapshot, SignalVector, round3};
pub use values::{AccountId, FeatureVector, OrderRef, Quantity, Timestamp};
