//! Per-account signal vectors
//!
//! Signals are derived on demand from ledger, window, and graph state and are
//! never stored. Scores are computed from full-precision values; the
//! [`SignalVector::rounded`] copy is what goes into evidence packs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::values::FeatureVector;

/// The five signals that carry a rule weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalName {
    ImmediateCancelRatio,
    RoundTripRate,
    BeneficiaryChurn,
    NetworkClusterScore,
    TradeToOrderRatio,
}

impl SignalName {
    /// All weighted signals in declaration order
    pub const ALL: [SignalName; 5] = [
        SignalName::ImmediateCancelRatio,
        SignalName::RoundTripRate,
        SignalName::BeneficiaryChurn,
        SignalName::NetworkClusterScore,
        SignalName::TradeToOrderRatio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalName::ImmediateCancelRatio => "immediate_cancel_ratio",
            SignalName::RoundTripRate => "round_trip_rate",
            SignalName::BeneficiaryChurn => "beneficiary_churn",
            SignalName::NetworkClusterScore => "network_cluster_score",
            SignalName::TradeToOrderRatio => "trade_to_order_ratio",
        }
    }
}

impl fmt::Display for SignalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown signal '{}'", s))
    }
}

/// Fixed-shape signal vector for one account
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalVector {
    pub immediate_cancel_ratio: f64,
    pub round_trip_rate: f64,
    pub beneficiary_churn: f64,
    pub network_cluster_score: f64,
    pub trade_to_order_ratio: f64,
    /// Accounts in the connected component (instrument nodes excluded)
    pub cluster_size: f64,
    /// Mean degree of the component's account members
    pub avg_degree: f64,
}

impl SignalVector {
    /// Value of a weighted signal
    pub fn get(&self, name: SignalName) -> f64 {
        match name {
            SignalName::ImmediateCancelRatio => self.immediate_cancel_ratio,
            SignalName::RoundTripRate => self.round_trip_rate,
            SignalName::BeneficiaryChurn => self.beneficiary_churn,
            SignalName::NetworkClusterScore => self.network_cluster_score,
            SignalName::TradeToOrderRatio => self.trade_to_order_ratio,
        }
    }

    /// Copy with every field rounded to 3 decimals, for presentation
    pub fn rounded(&self) -> Self {
        Self {
            immediate_cancel_ratio: round3(self.immediate_cancel_ratio),
            round_trip_rate: round3(self.round_trip_rate),
            beneficiary_churn: round3(self.beneficiary_churn),
            network_cluster_score: round3(self.network_cluster_score),
            trade_to_order_ratio: round3(self.trade_to_order_ratio),
            cluster_size: self.cluster_size,
            avg_degree: round3(self.avg_degree),
        }
    }

    /// Anomaly-model features, in a stable order:
    /// the five weighted signals, then cluster size and average degree
    pub fn features(&self) -> FeatureVector {
        [
            self.immediate_cancel_ratio,
            self.round_trip_rate,
            self.beneficiary_churn,
            self.network_cluster_score,
            self.trade_to_order_ratio,
            self.cluster_size,
            self.avg_degree,
        ]
    }

    /// Strongest weighted signal; ties go to the earlier signal
    pub fn top_signal(&self) -> (SignalName, f64) {
        SignalName::ALL
            .into_iter()
            .map(|name| (name, self.get(name)))
            .fold((SignalName::ImmediateCancelRatio, f64::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 { cur } else { best }
            })
    }
}

/// Rounded signals plus the score breakdown, as shown to investigators
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    #[serde(flatten)]
    pub signals: SignalVector,
    #[serde(rename = "_rule_score")]
    pub rule_score: f64,
    #[serde(rename = "_anomaly_score")]
    pub anomaly_score: f64,
    #[serde(rename = "_final_score")]
    pub final_score: f64,
}

impl SignalSnapshot {
    pub fn new(signals: &SignalVector, rule_score: f64, anomaly_score: f64, final_score: f64) -> Self {
        Self {
            signals: signals.rounded(),
            rule_score: round3(rule_score),
            anomaly_score: round3(anomaly_score),
            final_score: round3(final_score),
        }
    }
}

/// Round to 3 decimal places
pub fn round3(value: f64) -> f64 {
    (value * 1_000.0).round() / 1_000.0
}
