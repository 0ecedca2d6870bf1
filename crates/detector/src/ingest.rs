//! Event routing
//!
//! Every event lands in the window first, then its kind decides which
//! ledger and graph updates follow. Missing fields only suppress the update
//! that needs them.

use log::{debug, trace};
use serde::Serialize;
use vigil_core::{Event, EventKind, OrderRecord, generate_order_ref};
use vigil_graph::RelationshipGraph;

use crate::config::DetectorConfig;
use crate::ledger::AccountLedger;
use crate::window::SlidingWindow;

/// Running counts of what the ingestor has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub orders: u64,
    pub cancels: u64,
    pub trades: u64,
    pub custody_transfers: u64,
    /// Payloads that could not be normalized
    pub rejected: u64,
    /// Events whose timestamp fell back to ingestion time
    pub inferred_timestamps: u64,
    /// Cancels that did not resolve to a tracked order
    pub unlinked_cancels: u64,
    /// Events pruned out of the window
    pub expired: u64,
}

impl IngestStats {
    /// Events accepted into the window
    pub fn accepted(&self) -> u64 {
        self.orders + self.cancels + self.trades + self.custody_transfers
    }
}

/// Owner of the window, ledger and graph for one detector instance
#[derive(Debug, Clone)]
pub struct EventIngestor {
    window: SlidingWindow,
    ledger: AccountLedger,
    graph: RelationshipGraph,
    stats: IngestStats,
}

impl EventIngestor {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            window: SlidingWindow::new(config.window_seconds),
            ledger: AccountLedger::new(config),
            graph: RelationshipGraph::new(),
            stats: IngestStats::default(),
        }
    }

    /// Retain, prune, then route one event
    pub fn ingest(&mut self, event: Event) {
        let at = event.timestamp;
        if event.timestamp_inferred {
            self.stats.inferred_timestamps += 1;
        }

        match &event.kind {
            EventKind::Order(order) => {
                self.stats.orders += 1;
                let order_ref = order.order_ref.clone().unwrap_or_else(generate_order_ref);
                trace!("order {} account={:?}", order_ref, order.account);
                let record = OrderRecord::new(
                    order_ref,
                    order.account.clone(),
                    order.instrument.clone(),
                    order.side,
                    order.quantity,
                    at,
                );
                self.ledger.record_order(&mut self.graph, record);
            }
            EventKind::Cancel(cancel) => {
                self.stats.cancels += 1;
                let linked = self
                    .ledger
                    .record_cancel(cancel.order_ref.as_deref(), cancel.account.as_deref(), at);
                if linked.is_none() {
                    self.stats.unlinked_cancels += 1;
                    debug!("Cancel for untracked order {:?}", cancel.order_ref);
                }
            }
            EventKind::Trade(trade) => {
                self.stats.trades += 1;
                self.ledger.record_trade(&mut self.graph, trade, at);
            }
            EventKind::CustodyTransfer(transfer) => {
                self.stats.custody_transfers += 1;
                self.ledger.record_custody_transfer(
                    &mut self.graph,
                    transfer.from.as_deref(),
                    transfer.to.as_deref(),
                    at,
                );
            }
        }

        self.window.push(event);
        if let Some(newest) = self.window.newest() {
            self.stats.expired += self.window.prune(newest) as u64;
        }
    }

    /// Count a payload that never became an event
    pub fn record_rejected(&mut self) {
        self.stats.rejected += 1;
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn ledger(&self) -> &AccountLedger {
        &self.ledger
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use vigil_core::{CancelEvent, CustodyTransferEvent, NodeId, OrderEvent, Timestamp};

    fn at(secs: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn order(order_ref: Option<&str>, account: &str, secs: i64) -> Event {
        Event::order(
            OrderEvent {
                order_ref: order_ref.map(String::from),
                account: Some(account.to_string()),
                instrument: Some("XYZ".to_string()),
                ..Default::default()
            },
            at(secs),
        )
    }

    #[test]
    fn test_order_then_cancel_is_linked() {
        let mut ingestor = EventIngestor::new(&DetectorConfig::default());
        ingestor.ingest(order(Some("O-1"), "A", 0));
        ingestor.ingest(Event::cancel(
            CancelEvent {
                order_ref: Some("O-1".into()),
                account: Some("A".into()),
            },
            at(1),
        ));

        assert_eq!(ingestor.stats().orders, 1);
        assert_eq!(ingestor.stats().cancels, 1);
        assert_eq!(ingestor.stats().unlinked_cancels, 0);
        assert!(ingestor.ledger().orders().get("O-1").unwrap().immediate_cancel);
        assert_eq!(ingestor.window().len(), 2);
    }

    #[test]
    fn test_order_without_reference_gets_generated_one() {
        let mut ingestor = EventIngestor::new(&DetectorConfig::default());
        ingestor.ingest(order(None, "A", 0));

        let record = ingestor.ledger().orders().recent(1).next().unwrap();
        assert!(record.order_ref.starts_with("ORD-"));
    }

    #[test]
    fn test_order_without_account_skips_graph() {
        let mut ingestor = EventIngestor::new(&DetectorConfig::default());
        ingestor.ingest(Event::order(
            OrderEvent {
                order_ref: Some("O-1".into()),
                instrument: Some("XYZ".into()),
                ..Default::default()
            },
            at(0),
        ));

        assert_eq!(ingestor.graph().node_count(), 0);
        assert!(ingestor.ledger().accounts().is_empty());
        assert_eq!(ingestor.window().len(), 1);
    }

    #[test]
    fn test_window_pruned_against_newest_event() {
        let config = DetectorConfig {
            window_seconds: 10.0,
            ..Default::default()
        };
        let mut ingestor = EventIngestor::new(&config);
        ingestor.ingest(order(Some("O-1"), "A", 0));
        ingestor.ingest(order(Some("O-2"), "A", 5));
        ingestor.ingest(order(Some("O-3"), "A", 20));

        assert_eq!(ingestor.window().len(), 1);
        assert_eq!(ingestor.stats().expired, 2);
        // Ledger state outlives the window
        assert_eq!(ingestor.ledger().stats("A").unwrap().orders, 3);
    }

    #[test]
    fn test_custody_transfer_routes_to_graph() {
        let mut ingestor = EventIngestor::new(&DetectorConfig::default());
        ingestor.ingest(Event::custody_transfer(
            CustodyTransferEvent {
                from: Some("A".into()),
                to: Some("X".into()),
                instrument: None,
            },
            at(0),
        ));

        assert_eq!(ingestor.stats().custody_transfers, 1);
        assert_eq!(ingestor.graph().degree(&NodeId::account("X")), 1);
    }
}
