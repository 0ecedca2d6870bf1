//! Detector configuration
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! {
//!   "window_seconds": 600,
//!   "alert_threshold": 0.55,
//!   "rule_weights": { "round_trip_rate": 0.4 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use vigil_core::SignalName;

use crate::error::{DetectorError, Result};
use crate::scorer::RuleWeights;

/// Tunables for one detector instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Sliding-window horizon in seconds
    pub window_seconds: f64,
    /// Cancels at or under this latency count as immediate
    pub immediate_cancel_threshold_seconds: f64,
    /// Share of the final score taken from the anomaly model, in [0, 1]
    pub ml_weight: f64,
    /// Cluster score at or above which an alert is raised
    pub alert_threshold: f64,
    /// Number of highest-degree accounts evaluated per scan
    pub seed_count: usize,
    /// Members listed in an alert
    pub top_members: usize,
    /// Overrides for the default rule weights, keyed by signal name
    pub rule_weights: HashMap<String, f64>,
    /// A counterparty is a round-trip partner once the pair traded more than this
    pub round_trip_pair_threshold: u64,
    pub cluster_size_norm: f64,
    pub avg_degree_norm: f64,
    /// Orders older than this multiple of the window are evicted from the index
    pub order_retention_multiple: f64,
    pub max_tracked_orders: usize,
    /// Population size below which the anomaly model is not trained
    pub anomaly_min_samples: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_seconds: 300.0,
            immediate_cancel_threshold_seconds: 2.0,
            ml_weight: 0.0,
            alert_threshold: 0.6,
            seed_count: 10,
            top_members: 8,
            rule_weights: HashMap::new(),
            round_trip_pair_threshold: 3,
            cluster_size_norm: 10.0,
            avg_degree_norm: 20.0,
            order_retention_multiple: 10.0,
            max_tracked_orders: 100_000,
            anomaly_min_samples: 8,
        }
    }
}

impl DetectorConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| DetectorError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DetectorError::Parse(e.to_string()))
    }

    /// Set the alert threshold (builder)
    pub fn with_alert_threshold(mut self, threshold: f64) -> Self {
        self.alert_threshold = threshold;
        self
    }

    /// Set the anomaly mixing weight (builder)
    pub fn with_ml_weight(mut self, weight: f64) -> Self {
        self.ml_weight = weight;
        self
    }

    /// Override one rule weight (builder)
    pub fn with_rule_weight(mut self, signal: SignalName, weight: f64) -> Self {
        self.rule_weights.insert(signal.as_str().to_string(), weight);
        self
    }

    /// Order index retention in seconds
    pub fn order_retention_seconds(&self) -> f64 {
        self.window_seconds * self.order_retention_multiple
    }

    /// Defaults merged with the configured overrides
    pub fn rule_weights(&self) -> Result<RuleWeights> {
        let mut weights = RuleWeights::default();
        for (name, weight) in &self.rule_weights {
            let signal: SignalName = name
                .parse()
                .map_err(|reason: String| DetectorError::invalid("rule_weights", reason))?;
            if !weight.is_finite() {
                return Err(DetectorError::invalid(
                    "rule_weights",
                    format!("weight for '{}' must be finite", name),
                ));
            }
            weights.set(signal, *weight);
        }
        Ok(weights)
    }

    /// Reject configurations the detector cannot run with
    pub fn validate(&self) -> Result<()> {
        positive("window_seconds", self.window_seconds)?;
        if !self.immediate_cancel_threshold_seconds.is_finite()
            || self.immediate_cancel_threshold_seconds < 0.0
        {
            return Err(DetectorError::invalid(
                "immediate_cancel_threshold_seconds",
                "must be a finite, non-negative number of seconds",
            ));
        }
        unit_interval("ml_weight", self.ml_weight)?;
        unit_interval("alert_threshold", self.alert_threshold)?;
        if self.seed_count == 0 {
            return Err(DetectorError::invalid("seed_count", "must be at least 1"));
        }
        if self.top_members == 0 {
            return Err(DetectorError::invalid("top_members", "must be at least 1"));
        }
        positive("cluster_size_norm", self.cluster_size_norm)?;
        positive("avg_degree_norm", self.avg_degree_norm)?;
        positive("order_retention_multiple", self.order_retention_multiple)?;
        if self.max_tracked_orders == 0 {
            return Err(DetectorError::invalid(
                "max_tracked_orders",
                "must be at least 1",
            ));
        }
        self.rule_weights()?;
        Ok(())
    }
}

fn positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DetectorError::invalid(field, format!("must be positive, got {}", value)))
    }
}

fn unit_interval(field: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DetectorError::invalid(field, format!("must be within [0, 1], got {}", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_seconds, 300.0);
        assert_eq!(config.alert_threshold, 0.6);
        assert_eq!(config.ml_weight, 0.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = DetectorConfig::from_json(
            r#"{ "window_seconds": 60, "rule_weights": { "round_trip_rate": 0.5 } }"#,
        )
        .unwrap();

        assert_eq!(config.window_seconds, 60.0);
        assert_eq!(config.immediate_cancel_threshold_seconds, 2.0);
        let weights = config.rule_weights().unwrap();
        assert_eq!(weights.get(SignalName::RoundTripRate), 0.5);
        assert_eq!(weights.get(SignalName::ImmediateCancelRatio), 0.25);
    }

    #[test]
    fn test_negative_window_rejected() {
        let config = DetectorConfig {
            window_seconds: -5.0,
            ..Default::default()
        };
        match config.validate() {
            Err(DetectorError::InvalidConfig { field, .. }) => assert_eq!(field, "window_seconds"),
            other => panic!("expected invalid config, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_weights_rejected() {
        assert!(DetectorConfig::default().with_ml_weight(1.5).validate().is_err());
        assert!(DetectorConfig::default().with_alert_threshold(-0.1).validate().is_err());
        assert!(DetectorConfig::default().with_ml_weight(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_unknown_rule_weight_rejected() {
        let mut config = DetectorConfig::default();
        config.rule_weights.insert("cluster_size".to_string(), 0.2);
        assert!(config.validate().is_err());

        let config = DetectorConfig::default()
            .with_rule_weight(SignalName::BeneficiaryChurn, f64::INFINITY);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error_reported() {
        assert!(matches!(
            DetectorConfig::from_json("{ not json"),
            Err(DetectorError::Parse(_))
        ));
    }
}
