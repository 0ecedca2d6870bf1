//! Per-account counters and the order index
//!
//! ```text
//!            ┌──────────────────────── AccountLedger ───────────────────────┐
//! order  ──► │ AccountRegistry   id ──► AccountStats {orders, cancels, ...} │
//! cancel ──► │ OrderIndex        ref ─► OrderRecord (arrival-ordered arena) │
//! trade  ──► │                                                              │
//! custody ─► └──────────────────────────────┬───────────────────────────────┘
//!                                           ▼
//!                                  RelationshipGraph edges
//! ```

use log::debug;
use std::collections::{HashMap, VecDeque};
use vigil_core::{
    AccountId, AccountStats, NodeId, OrderRecord, OrderRef, Timestamp, TradeEvent,
    seconds_between,
};
use vigil_graph::RelationshipGraph;

use crate::config::DetectorConfig;

/// Explicit map from account id to its counters.
///
/// Lookups never create entries; [`AccountRegistry::get_or_create`] is the
/// only way an account comes into existence.
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: HashMap<AccountId, AccountStats>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, account: &str) -> Option<&AccountStats> {
        self.accounts.get(account)
    }

    pub fn get_or_create(&mut self, account: &str) -> &mut AccountStats {
        self.accounts.entry(account.to_string()).or_default()
    }

    pub fn contains(&self, account: &str) -> bool {
        self.accounts.contains_key(account)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, &AccountStats)> {
        self.accounts.iter()
    }
}

/// Bounded index of orders by reference
///
/// Records live in an arena keyed by reference; a separate arrival queue
/// remembers insertion order. Replacing a reference gives it a fresh
/// sequence number, which moves it to the newest position and leaves a
/// stale queue entry behind that is skipped and eventually compacted.
#[derive(Debug, Clone)]
pub struct OrderIndex {
    orders: HashMap<OrderRef, (u64, OrderRecord)>,
    arrival: VecDeque<(u64, OrderRef)>,
    next_seq: u64,
    retention_secs: f64,
    capacity: usize,
    newest: Option<Timestamp>,
    evicted: u64,
}

enum FrontEntry {
    Keep,
    Stale,
    Evict,
}

impl OrderIndex {
    pub fn new(retention_secs: f64, capacity: usize) -> Self {
        Self {
            orders: HashMap::new(),
            arrival: VecDeque::new(),
            next_seq: 0,
            retention_secs,
            capacity,
            newest: None,
            evicted: 0,
        }
    }

    /// Insert or replace a record. Last write wins.
    pub fn insert(&mut self, record: OrderRecord) -> Option<OrderRecord> {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.newest = Some(match self.newest {
            Some(newest) if newest >= record.placed_at => newest,
            _ => record.placed_at,
        });

        let order_ref = record.order_ref.clone();
        let replaced = self
            .orders
            .insert(order_ref.clone(), (seq, record))
            .map(|(_, old)| old);
        if replaced.is_some() {
            debug!("Order reference {} replaced by a later order", order_ref);
        }
        self.arrival.push_back((seq, order_ref));

        self.evict();
        self.compact();
        replaced
    }

    pub fn get(&self, order_ref: &str) -> Option<&OrderRecord> {
        self.orders.get(order_ref).map(|(_, record)| record)
    }

    pub fn get_mut(&mut self, order_ref: &str) -> Option<&mut OrderRecord> {
        self.orders.get_mut(order_ref).map(|(_, record)| record)
    }

    pub fn contains(&self, order_ref: &str) -> bool {
        self.orders.contains_key(order_ref)
    }

    /// Up to `n` live records, newest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &OrderRecord> {
        self.arrival
            .iter()
            .rev()
            .filter_map(|(seq, order_ref)| match self.orders.get(order_ref) {
                Some((live, record)) if live == seq => Some(record),
                _ => None,
            })
            .take(n)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Records dropped by age or capacity since creation
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    fn evict(&mut self) {
        loop {
            let Some((seq, order_ref)) = self.arrival.front() else {
                break;
            };
            let verdict = match self.orders.get(order_ref) {
                Some((live, record)) if live == seq => {
                    let over_capacity = self.orders.len() > self.capacity;
                    let expired = self.newest.is_some_and(|newest| {
                        seconds_between(record.placed_at, newest) > self.retention_secs
                    });
                    if over_capacity || expired {
                        FrontEntry::Evict
                    } else {
                        FrontEntry::Keep
                    }
                }
                _ => FrontEntry::Stale,
            };

            match verdict {
                FrontEntry::Keep => break,
                FrontEntry::Stale => {
                    self.arrival.pop_front();
                }
                FrontEntry::Evict => {
                    if let Some((_, order_ref)) = self.arrival.pop_front() {
                        self.orders.remove(&order_ref);
                        self.evicted += 1;
                    }
                }
            }
        }
    }

    fn compact(&mut self) {
        if self.arrival.len() <= 2 * self.orders.len() + 64 {
            return;
        }
        let orders = &self.orders;
        self.arrival
            .retain(|(seq, order_ref)| matches!(orders.get(order_ref), Some((live, _)) if live == seq));
    }
}

/// Ledger state plus the graph updates each event implies
#[derive(Debug, Clone)]
pub struct AccountLedger {
    accounts: AccountRegistry,
    orders: OrderIndex,
    immediate_cancel_threshold_secs: f64,
}

impl AccountLedger {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            accounts: AccountRegistry::new(),
            orders: OrderIndex::new(config.order_retention_seconds(), config.max_tracked_orders),
            immediate_cancel_threshold_secs: config.immediate_cancel_threshold_seconds,
        }
    }

    pub fn accounts(&self) -> &AccountRegistry {
        &self.accounts
    }

    pub fn orders(&self) -> &OrderIndex {
        &self.orders
    }

    /// Counters for `account`, if it has been seen
    pub fn stats(&self, account: &str) -> Option<&AccountStats> {
        self.accounts.get(account)
    }

    /// Track a placed order, count it for its account and link the account
    /// to the instrument
    pub fn record_order(&mut self, graph: &mut RelationshipGraph, record: OrderRecord) {
        if let Some(account) = record.account.as_deref() {
            let stats = self.accounts.get_or_create(account);
            stats.orders += 1;
            stats.touch(record.placed_at);

            if let Some(instrument) = record.instrument.as_deref() {
                graph.add_edge(&NodeId::account(account), &NodeId::instrument(instrument), 1);
            }
        }

        // The replaced record no longer counts as an immediate cancel
        if let Some(old) = self.orders.insert(record) {
            if let Some(owner) = old.account.as_deref().filter(|_| old.immediate_cancel) {
                self.accounts
                    .get_or_create(owner)
                    .reflag_immediate_cancel(true, false);
            }
        }
    }

    /// Count a cancel and, when the reference resolves, annotate the order.
    ///
    /// Returns the cancel latency in seconds for resolved references.
    pub fn record_cancel(
        &mut self,
        order_ref: Option<&str>,
        account: Option<&str>,
        at: Timestamp,
    ) -> Option<f64> {
        if let Some(account) = account {
            let stats = self.accounts.get_or_create(account);
            stats.cancels += 1;
            stats.touch(at);
        }

        let order = order_ref.and_then(|r| self.orders.get_mut(r))?;
        let was_immediate = order.immediate_cancel;
        let latency = order.mark_cancelled(at, self.immediate_cancel_threshold_secs);
        let is_immediate = order.immediate_cancel;
        if let Some(owner) = order.account.clone() {
            let stats = self.accounts.get_or_create(&owner);
            stats.touch(at);
            stats.reflag_immediate_cancel(was_immediate, is_immediate);
        }
        Some(latency)
    }

    /// Count a trade for both sides, tally the counterparty pair and link
    /// accounts to each other and to the instrument
    pub fn record_trade(&mut self, graph: &mut RelationshipGraph, trade: &TradeEvent, at: Timestamp) {
        let buy = trade.buy_account.as_deref();
        let sell = trade.sell_account.as_deref();

        for account in [buy, sell].into_iter().flatten() {
            let stats = self.accounts.get_or_create(account);
            stats.trades += 1;
            stats.touch(at);
        }

        if let (Some(buy), Some(sell)) = (buy, sell) {
            self.accounts.get_or_create(buy).record_counterparty(sell);
            self.accounts.get_or_create(sell).record_counterparty(buy);
            graph.add_edge(&NodeId::account(buy), &NodeId::account(sell), 1);
        }

        if let Some(instrument) = trade.instrument.as_deref() {
            let instrument = NodeId::instrument(instrument);
            for account in [buy, sell].into_iter().flatten() {
                graph.add_edge(&NodeId::account(account), &instrument, 1);
            }
        }

        for order_ref in [&trade.buy_order_ref, &trade.sell_order_ref]
            .into_iter()
            .flatten()
        {
            if let Some(order) = self.orders.get_mut(order_ref) {
                order.mark_filled();
            }
        }
    }

    /// Link both endpoints of a custody transfer. Counters are untouched.
    pub fn record_custody_transfer(
        &mut self,
        graph: &mut RelationshipGraph,
        from: Option<&str>,
        to: Option<&str>,
        at: Timestamp,
    ) {
        let (Some(from), Some(to)) = (from, to) else {
            debug!("Custody transfer without both endpoints, graph unchanged");
            return;
        };
        graph.add_edge(&NodeId::account(from), &NodeId::account(to), 1);
        self.accounts.get_or_create(from).touch(at);
        self.accounts.get_or_create(to).touch(at);
    }
}
