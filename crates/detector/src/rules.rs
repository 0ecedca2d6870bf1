//! Rule-level flags
//!
//! Plain threshold checks that explain an alert to an investigator. They are
//! attached to evidence packs and never feed back into the score.

use serde::{Deserialize, Serialize};
use vigil_core::{SignalName, SignalVector};

/// Thresholds at or above which a signal is flagged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleBook {
    pub immediate_cancel_ratio: f64,
    pub round_trip_rate: f64,
    pub beneficiary_churn: f64,
    pub network_cluster_score: f64,
    pub trade_to_order_ratio: f64,
    pub anomaly: f64,
    /// Largest cluster for the cancel + round-trip composite flag
    pub composite_max_cluster: f64,
}

impl Default for RuleBook {
    fn default() -> Self {
        Self {
            immediate_cancel_ratio: 0.4,
            round_trip_rate: 0.15,
            beneficiary_churn: 0.6,
            network_cluster_score: 0.35,
            trade_to_order_ratio: 2.0,
            anomaly: 0.6,
            composite_max_cluster: 3.0,
        }
    }
}

impl RuleBook {
    pub fn threshold(&self, signal: SignalName) -> f64 {
        match signal {
            SignalName::ImmediateCancelRatio => self.immediate_cancel_ratio,
            SignalName::RoundTripRate => self.round_trip_rate,
            SignalName::BeneficiaryChurn => self.beneficiary_churn,
            SignalName::NetworkClusterScore => self.network_cluster_score,
            SignalName::TradeToOrderRatio => self.trade_to_order_ratio,
        }
    }

    /// Human-readable reasons the signals trip, empty when none do.
    ///
    /// Expects the rounded presentation copy so the quoted values match the
    /// evidence pack.
    pub fn evaluate(&self, signals: &SignalVector, anomaly: f64) -> Vec<String> {
        let mut reasons: Vec<String> = SignalName::ALL
            .into_iter()
            .filter(|&name| signals.get(name) >= self.threshold(name))
            .map(|name| {
                format!(
                    "{} >= {} (val={})",
                    name,
                    self.threshold(name),
                    signals.get(name)
                )
            })
            .collect();

        if anomaly >= self.anomaly {
            reasons.push(format!("anomaly score >= {} (val={})", self.anomaly, anomaly));
        }

        if signals.immediate_cancel_ratio >= self.immediate_cancel_ratio
            && signals.round_trip_rate >= self.round_trip_rate
            && signals.cluster_size <= self.composite_max_cluster
        {
            reasons.push(
                "composite: immediate cancels + round-trips in a very small cluster, likely wash trading or laddering"
                    .to_string(),
            );
        }

        reasons
    }
}
