//! Per-account signal computation
//!
//! All five weighted signals plus the two raw cluster features are derived
//! on demand from ledger, window and graph state. Values keep full
//! precision; rounding happens only when a snapshot is taken for evidence.

use std::collections::HashSet;
use vigil_core::{NodeId, SignalVector};
use vigil_graph::RelationshipGraph;

use crate::config::DetectorConfig;
use crate::ledger::AccountLedger;
use crate::window::SlidingWindow;

/// Size and density of an account's connected component
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClusterShape {
    /// Account members only
    pub size: usize,
    /// Mean degree over account members
    pub avg_degree: f64,
}

impl ClusterShape {
    /// Shape of an already extracted component
    pub fn of(component: &HashSet<NodeId>, graph: &RelationshipGraph) -> Self {
        let degrees: Vec<u64> = component
            .iter()
            .filter(|node| node.is_account())
            .map(|node| graph.degree(node))
            .collect();

        let avg_degree = if degrees.is_empty() {
            0.0
        } else {
            degrees.iter().sum::<u64>() as f64 / degrees.len() as f64
        };

        Self {
            size: degrees.len(),
            avg_degree,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalComputer {
    round_trip_pair_threshold: u64,
    cluster_size_norm: f64,
    avg_degree_norm: f64,
}

impl SignalComputer {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            round_trip_pair_threshold: config.round_trip_pair_threshold,
            cluster_size_norm: config.cluster_size_norm,
            avg_degree_norm: config.avg_degree_norm,
        }
    }

    /// Signals for `account`, extracting its component from the graph
    pub fn compute(
        &self,
        account: &str,
        ledger: &AccountLedger,
        window: &SlidingWindow,
        graph: &RelationshipGraph,
    ) -> SignalVector {
        let component = graph.connected_component(&NodeId::account(account));
        let shape = ClusterShape::of(&component, graph);
        self.compute_in_cluster(account, shape, ledger, window)
    }

    /// Signals for `account` when its component shape is already known,
    /// so a cluster evaluation walks the component once
    pub fn compute_in_cluster(
        &self,
        account: &str,
        shape: ClusterShape,
        ledger: &AccountLedger,
        window: &SlidingWindow,
    ) -> SignalVector {
        let (orders, immediate_cancels, trades) = ledger
            .stats(account)
            .map(|s| (s.orders, s.immediate_cancels, s.trades))
            .unwrap_or((0, 0, 0));
        let order_base = orders.max(1) as f64;

        SignalVector {
            immediate_cancel_ratio: immediate_cancels as f64 / order_base,
            round_trip_rate: self.round_trip_rate(account, ledger, window),
            beneficiary_churn: beneficiary_churn(account, ledger),
            network_cluster_score: self.network_cluster_score(shape),
            trade_to_order_ratio: trades as f64 / order_base,
            cluster_size: shape.size as f64,
            avg_degree: shape.avg_degree,
        }
    }

    /// Account-scoped numerator over the window-wide trade count
    fn round_trip_rate(&self, account: &str, ledger: &AccountLedger, window: &SlidingWindow) -> f64 {
        let stats = ledger.stats(account);
        let mut window_trades = 0usize;
        let mut round_trips = 0usize;

        for trade in window.snapshot().filter_map(|event| event.as_trade()) {
            window_trades += 1;
            if trade.is_self_trade() {
                if trade.buy_account.as_deref() == Some(account) {
                    round_trips += 1;
                }
                continue;
            }
            let Some(counterparty) = trade.counterparty_of(account) else {
                continue;
            };
            let pair_trades = stats.map(|s| s.trades_with(counterparty)).unwrap_or(0);
            if pair_trades > self.round_trip_pair_threshold {
                round_trips += 1;
            }
        }

        round_trips as f64 / window_trades.max(1) as f64
    }

    fn network_cluster_score(&self, shape: ClusterShape) -> f64 {
        let raw = shape.size as f64 / self.cluster_size_norm + shape.avg_degree / self.avg_degree_norm;
        raw.clamp(0.0, 1.0)
    }
}

/// Distinct counterparties per trade; 0 for accounts that never traded
fn beneficiary_churn(account: &str, ledger: &AccountLedger) -> f64 {
    match ledger.stats(account) {
        Some(stats) if stats.trades > 0 => {
            stats.distinct_counterparties() as f64 / stats.trades as f64
        }
        _ => 0.0,
    }
}
