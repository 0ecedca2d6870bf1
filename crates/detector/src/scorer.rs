//! Risk scoring
//!
//! ```text
//! SignalVector ──► rule score    Σ weight·signal, clamped to [0, 1]
//!        │
//!        └──────► anomaly score  AnomalyModel, 0.0 when unavailable
//!
//! final = (1 - ml_weight)·rule + ml_weight·anomaly, clamped to [0, 1]
//! ```
//!
//! The scorer depends only on the anomaly ports. Whether a model exists is
//! tracked in [`AnomalyStatus`]; it never changes how the rule score is
//! computed.

use log::{debug, warn};
use std::fmt;
use std::sync::Arc;
use vigil_core::{FeatureVector, SignalName, SignalVector};
use vigil_ports::{AnomalyDetector, AnomalyError, AnomalyModel};

/// Weight per weighted signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleWeights {
    weights: [f64; 5],
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            weights: [0.25, 0.30, 0.15, 0.20, 0.10],
        }
    }
}

impl RuleWeights {
    pub fn get(&self, signal: SignalName) -> f64 {
        self.weights[index(signal)]
    }

    pub fn set(&mut self, signal: SignalName, weight: f64) {
        self.weights[index(signal)] = weight;
    }

    /// Weighted sum of the five signals, clamped to [0, 1]
    pub fn apply(&self, signals: &SignalVector) -> f64 {
        let raw: f64 = SignalName::ALL
            .into_iter()
            .map(|name| self.get(name) * signals.get(name))
            .sum();
        clamp_unit(raw)
    }
}

fn index(signal: SignalName) -> usize {
    match signal {
        SignalName::ImmediateCancelRatio => 0,
        SignalName::RoundTripRate => 1,
        SignalName::BeneficiaryChurn => 2,
        SignalName::NetworkClusterScore => 3,
        SignalName::TradeToOrderRatio => 4,
    }
}

/// Clamp to [0, 1]; NaN maps to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Score components for one account
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreBreakdown {
    pub rule: f64,
    pub anomaly: f64,
    pub final_score: f64,
}

/// Availability of the anomaly component for the current cycle
#[derive(Debug, Clone, PartialEq)]
pub enum AnomalyStatus {
    /// Mixing weight is zero; nothing is trained or queried
    Disabled,
    /// Population below the training minimum
    InsufficientSamples { needed: usize, available: usize },
    /// A trained model is installed
    Ready { samples: usize },
    /// Training failed or timed out; rule-only this cycle
    Failed(String),
}

impl fmt::Display for AnomalyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyStatus::Disabled => write!(f, "disabled"),
            AnomalyStatus::InsufficientSamples { needed, available } => {
                write!(f, "insufficient samples ({}/{})", available, needed)
            }
            AnomalyStatus::Ready { samples } => write!(f, "ready ({} samples)", samples),
            AnomalyStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

pub struct Scorer {
    weights: RuleWeights,
    ml_weight: f64,
    min_samples: usize,
    detector: Arc<dyn AnomalyDetector>,
    model: Option<Arc<dyn AnomalyModel>>,
    status: AnomalyStatus,
}

impl Scorer {
    pub fn new(
        weights: RuleWeights,
        ml_weight: f64,
        min_samples: usize,
        detector: Arc<dyn AnomalyDetector>,
    ) -> Self {
        Self {
            weights,
            ml_weight: clamp_unit(ml_weight),
            min_samples,
            detector,
            model: None,
            status: AnomalyStatus::Disabled,
        }
    }

    pub fn weights(&self) -> &RuleWeights {
        &self.weights
    }

    pub fn ml_weight(&self) -> f64 {
        self.ml_weight
    }

    pub fn status(&self) -> &AnomalyStatus {
        &self.status
    }

    /// The detector, for callers that train off-thread
    pub fn anomaly_detector(&self) -> Arc<dyn AnomalyDetector> {
        Arc::clone(&self.detector)
    }

    /// Training minimum, taking the detector's own floor into account
    pub fn min_samples(&self) -> usize {
        self.min_samples.max(self.detector.min_samples())
    }

    /// Whether a refresh would do anything this cycle
    pub fn wants_model(&self) -> bool {
        self.ml_weight > 0.0
    }

    pub fn rule_score(&self, signals: &SignalVector) -> f64 {
        self.weights.apply(signals)
    }

    /// Anomaly contribution; exactly 0.0 whenever no usable model exists
    pub fn anomaly_score(&self, signals: &SignalVector) -> f64 {
        let Some(model) = &self.model else {
            return 0.0;
        };
        match model.anomaly_score(&signals.features()) {
            Ok(score) => clamp_unit(score),
            Err(e) => {
                warn!("Anomaly inference failed, scoring rule-only: {}", e);
                0.0
            }
        }
    }

    pub fn score(&self, signals: &SignalVector) -> ScoreBreakdown {
        let rule = self.rule_score(signals);
        if self.ml_weight == 0.0 {
            return ScoreBreakdown {
                rule,
                anomaly: 0.0,
                final_score: rule,
            };
        }

        let anomaly = self.anomaly_score(signals);
        let final_score = clamp_unit((1.0 - self.ml_weight) * rule + self.ml_weight * anomaly);
        ScoreBreakdown {
            rule,
            anomaly,
            final_score,
        }
    }

    /// Train a fresh model on `population` and swap it in.
    ///
    /// Any failure leaves no model installed, so scoring falls back to
    /// rule-only for the cycle.
    pub fn refresh(&mut self, population: &[FeatureVector]) -> &AnomalyStatus {
        if !self.wants_model() {
            self.model = None;
            self.status = AnomalyStatus::Disabled;
            return &self.status;
        }

        let needed = self.min_samples();
        if population.len() < needed {
            self.install(
                None,
                AnomalyStatus::InsufficientSamples {
                    needed,
                    available: population.len(),
                },
            );
            return &self.status;
        }

        let result = self.detector.fit(population);
        self.install_result(result, population.len());
        &self.status
    }

    /// Install the outcome of a fit that ran elsewhere
    pub fn install_result(
        &mut self,
        result: Result<Arc<dyn AnomalyModel>, AnomalyError>,
        samples: usize,
    ) {
        match result {
            Ok(model) => self.install(Some(model), AnomalyStatus::Ready { samples }),
            Err(AnomalyError::InsufficientSamples { needed, available }) => {
                self.install(None, AnomalyStatus::InsufficientSamples { needed, available })
            }
            Err(e) => {
                warn!(
                    "Anomaly training with {} failed, scoring rule-only: {}",
                    self.detector.name(),
                    e
                );
                self.install(None, AnomalyStatus::Failed(e.to_string()))
            }
        }
    }

    /// Swap the model and status in one step
    pub fn install(&mut self, model: Option<Arc<dyn AnomalyModel>>, status: AnomalyStatus) {
        debug!("Anomaly component: {}", status);
        self.model = model;
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::NoopAnomalyDetector;
    use vigil_ports::AnomalyResult;

    struct FixedModel(f64);

    impl AnomalyModel for FixedModel {
        fn anomaly_score(&self, _sample: &FeatureVector) -> AnomalyResult<f64> {
            Ok(self.0)
        }
    }

    struct FixedDetector(f64);

    impl AnomalyDetector for FixedDetector {
        fn name(&self) -> &str {
            "fixed"
        }

        fn min_samples(&self) -> usize {
            2
        }

        fn fit(&self, _samples: &[FeatureVector]) -> AnomalyResult<Arc<dyn AnomalyModel>> {
            Ok(Arc::new(FixedModel(self.0)))
        }
    }

    struct BrokenDetector;

    impl AnomalyDetector for BrokenDetector {
        fn name(&self) -> &str {
            "broken"
        }

        fn min_samples(&self) -> usize {
            1
        }

        fn fit(&self, _samples: &[FeatureVector]) -> AnomalyResult<Arc<dyn AnomalyModel>> {
            Err(AnomalyError::Training("singular matrix".to_string()))
        }
    }

    fn signals() -> SignalVector {
        SignalVector {
            immediate_cancel_ratio: 0.5,
            round_trip_rate: 0.4,
            beneficiary_churn: 0.2,
            network_cluster_score: 0.3,
            trade_to_order_ratio: 1.0,
            cluster_size: 2.0,
            avg_degree: 4.0,
        }
    }

    fn rule_only() -> Scorer {
        Scorer::new(RuleWeights::default(), 0.0, 8, Arc::new(NoopAnomalyDetector))
    }

    #[test]
    fn test_default_rule_score() {
        // 0.125 + 0.12 + 0.03 + 0.06 + 0.10
        let score = rule_only().rule_score(&signals());
        assert!((score - 0.435).abs() < 1e-12);
    }

    #[test]
    fn test_zero_ml_weight_is_exactly_rule_score() {
        let scorer = rule_only();
        let breakdown = scorer.score(&signals());
        assert_eq!(breakdown.final_score, breakdown.rule);
        assert_eq!(breakdown.anomaly, 0.0);
    }

    #[test]
    fn test_scores_clamped_for_adversarial_inputs() {
        let mut weights = RuleWeights::default();
        weights.set(SignalName::TradeToOrderRatio, 1e9);
        let scorer = Scorer::new(weights, 0.0, 8, Arc::new(NoopAnomalyDetector));

        let huge = SignalVector {
            trade_to_order_ratio: 1e12,
            ..signals()
        };
        assert_eq!(scorer.score(&huge).final_score, 1.0);

        let negative = SignalVector {
            trade_to_order_ratio: -1e12,
            ..signals()
        };
        assert_eq!(scorer.score(&negative).final_score, 0.0);

        let nan = SignalVector {
            round_trip_rate: f64::NAN,
            ..signals()
        };
        assert_eq!(scorer.score(&nan).final_score, 0.0);
    }

    #[test]
    fn test_mixing_with_trained_model() {
        let mut scorer = Scorer::new(RuleWeights::default(), 0.5, 2, Arc::new(FixedDetector(0.9)));
        let status = scorer.refresh(&[[0.0; 7], [1.0; 7]]).clone();
        assert_eq!(status, AnomalyStatus::Ready { samples: 2 });

        let breakdown = scorer.score(&signals());
        assert!((breakdown.anomaly - 0.9).abs() < 1e-12);
        assert!((breakdown.final_score - (0.5 * 0.435 + 0.5 * 0.9)).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_samples_degrades_to_zero_anomaly() {
        let mut scorer = Scorer::new(RuleWeights::default(), 0.5, 8, Arc::new(FixedDetector(0.9)));
        let status = scorer.refresh(&[[0.0; 7]; 3]).clone();

        assert_eq!(
            status,
            AnomalyStatus::InsufficientSamples {
                needed: 8,
                available: 3
            }
        );
        let breakdown = scorer.score(&signals());
        assert_eq!(breakdown.anomaly, 0.0);
        assert!((breakdown.final_score - 0.5 * 0.435).abs() < 1e-12);
    }

    #[test]
    fn test_training_failure_is_contained() {
        let mut scorer = Scorer::new(RuleWeights::default(), 0.3, 1, Arc::new(BrokenDetector));
        let status = scorer.refresh(&[[0.0; 7]; 4]).clone();

        assert!(matches!(status, AnomalyStatus::Failed(_)));
        assert_eq!(scorer.anomaly_score(&signals()), 0.0);
    }

    #[test]
    fn test_disabled_when_weight_zero() {
        let mut scorer = Scorer::new(RuleWeights::default(), 0.0, 1, Arc::new(FixedDetector(1.0)));
        assert_eq!(scorer.refresh(&[[0.0; 7]; 10]), &AnomalyStatus::Disabled);
        assert_eq!(scorer.anomaly_score(&signals()), 0.0);
    }
}
