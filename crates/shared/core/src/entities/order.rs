use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::Side;
use crate::values::{AccountId, OrderRef, Quantity, Timestamp};

/// An order as tracked by the ledger's order index.
///
/// The placement fields never change after ingestion. The annotation fields
/// are filled in later, when a cancel or trade resolves back to this order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_ref: OrderRef,
    /// Placing account, when the event named one
    pub account: Option<AccountId>,
    pub instrument: Option<String>,
    pub side: Option<Side>,
    pub quantity: Option<Quantity>,
    /// Event timestamp of the placement
    pub placed_at: Timestamp,
    /// When the order was cancelled, if it was
    pub cancelled_at: Option<Timestamp>,
    /// Cancel latency in seconds
    pub cancel_latency_secs: Option<f64>,
    /// Cancelled within the immediate-cancel threshold
    pub immediate_cancel: bool,
    /// A trade referenced this order
    pub filled_by_trade: bool,
}

impl OrderRecord {
    /// Create a freshly placed order with no annotations
    pub fn new(
        order_ref: impl Into<OrderRef>,
        account: Option<AccountId>,
        instrument: Option<String>,
        side: Option<Side>,
        quantity: Option<Quantity>,
        placed_at: Timestamp,
    ) -> Self {
        Self {
            order_ref: order_ref.into(),
            account,
            instrument,
            side,
            quantity,
            placed_at,
            cancelled_at: None,
            cancel_latency_secs: None,
            immediate_cancel: false,
            filled_by_trade: false,
        }
    }

    /// Annotate a cancellation and return the latency in seconds.
    ///
    /// A negative latency (cancel stamped before its order) still counts as
    /// immediate, matching a straight `delta <= threshold` comparison.
    pub fn mark_cancelled(&mut self, at: Timestamp, immediate_threshold_secs: f64) -> f64 {
        let latency = seconds_between(self.placed_at, at);
        self.cancelled_at = Some(at);
        self.cancel_latency_secs = Some(latency);
        self.immediate_cancel = latency <= immediate_threshold_secs;
        latency
    }

    /// Annotate that a trade filled this order
    pub fn mark_filled(&mut self) {
        self.filled_by_trade = true;
    }

    /// Returns true if this order belongs to the given account
    pub fn is_owned_by(&self, account: &str) -> bool {
        self.account.as_deref() == Some(account)
    }

    /// Returns true if the order was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }
}

/// Signed difference `to - from` in fractional seconds
pub fn seconds_between(from: Timestamp, to: Timestamp) -> f64 {
    let delta: Duration = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn placed() -> OrderRecord {
        OrderRecord::new(
            "ORD-1",
            Some("ACC-A".to_string()),
            Some("XYZ".to_string()),
            Some(Side::Buy),
            Some(dec!(100)),
            Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_immediate_cancel_within_threshold() {
        let mut order = placed();
        let at = order.placed_at + Duration::milliseconds(1500);
        let latency = order.mark_cancelled(at, 2.0);

        assert!((latency - 1.5).abs() < 1e-9);
        assert!(order.immediate_cancel);
        assert!(order.is_cancelled());
    }

    #[test]
    fn test_slow_cancel_not_immediate() {
        let mut order = placed();
        let at = order.placed_at + Duration::seconds(30);
        order.mark_cancelled(at, 2.0);

        assert!(!order.immediate_cancel);
        assert_eq!(order.cancel_latency_secs, Some(30.0));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut order = placed();
        order.mark_cancelled(order.placed_at + Duration::seconds(2), 2.0);
        assert!(order.immediate_cancel);
    }

    #[test]
    fn test_ownership() {
        let order = placed();
        assert!(order.is_owned_by("ACC-A"));
        assert!(!order.is_owned_by("ACC-B"));
    }
}
