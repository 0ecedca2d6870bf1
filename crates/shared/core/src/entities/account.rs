use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::values::{AccountId, Timestamp};

/// Running per-account counters maintained by the ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountStats {
    pub orders: u64,
    pub cancels: u64,
    /// Orders of this account currently flagged as immediately cancelled.
    /// Kept here so evicting old order records never shrinks it.
    #[serde(default)]
    pub immediate_cancels: u64,
    pub trades: u64,
    /// Number of trades executed against each counterparty
    pub trade_with: HashMap<AccountId, u64>,
    pub last_seen: Option<Timestamp>,
}

impl AccountStats {
    /// Refresh the last-seen marker
    pub fn touch(&mut self, at: Timestamp) {
        self.last_seen = Some(at);
    }

    /// Count one trade against `counterparty`
    pub fn record_counterparty(&mut self, counterparty: &str) {
        *self
            .trade_with
            .entry(counterparty.to_string())
            .or_insert(0) += 1;
    }

    /// Follow an order's immediate-cancel flag from `was` to `is`
    pub fn reflag_immediate_cancel(&mut self, was: bool, is: bool) {
        match (was, is) {
            (false, true) => self.immediate_cancels += 1,
            (true, false) => self.immediate_cancels = self.immediate_cancels.saturating_sub(1),
            _ => {}
        }
    }

    /// Trades executed against `counterparty`
    pub fn trades_with(&self, counterparty: &str) -> u64 {
        self.trade_with.get(counterparty).copied().unwrap_or(0)
    }

    /// Distinct counterparties with at least one trade
    pub fn distinct_counterparties(&self) -> usize {
        self.trade_with.values().filter(|&&n| n > 0).count()
    }
}
