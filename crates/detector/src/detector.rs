//! Detector facade
//!
//! One instance owns all mutable state (window, ledger, graph) and expects
//! strictly sequential use: ingest, ingest, ..., scan, ingest, ... Callers
//! feeding it from several producers must funnel events through a single
//! writer.

use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;
use vigil_clock::SystemClock;
use vigil_core::{Alert, Event, FeatureVector, NormalizeError, SignalVector, normalize};
use vigil_graph::RelationshipGraph;
use vigil_ports::{AnomalyDetector, AnomalyError, AnomalyModel, Clock, NarrativeComposer};

use crate::anomaly::NoopAnomalyDetector;
use crate::cluster::{ClusterEvaluation, ClusterEvaluator, RaisedAlert};
use crate::config::DetectorConfig;
use crate::error::Result;
use crate::evidence::EvidenceBuilder;
use crate::ingest::{EventIngestor, IngestStats};
use crate::ledger::AccountLedger;
use crate::rules::RuleBook;
use crate::scorer::{AnomalyStatus, ScoreBreakdown, Scorer};
use crate::signals::SignalComputer;
use crate::window::SlidingWindow;

pub struct Detector {
    config: DetectorConfig,
    clock: Arc<dyn Clock>,
    ingestor: EventIngestor,
    computer: SignalComputer,
    scorer: Scorer,
    evaluator: ClusterEvaluator,
    evidence: EvidenceBuilder,
    alerts: Vec<Alert>,
}

impl Detector {
    /// Validate `config` and build a rule-only detector on the system clock
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let weights = config.rule_weights()?;

        if config.ml_weight > 0.0 {
            warn!(
                "ml_weight {} configured without an anomaly detector; scoring rule-only until one is installed",
                config.ml_weight
            );
        }
        let scorer = Scorer::new(
            weights,
            0.0,
            config.anomaly_min_samples,
            Arc::new(NoopAnomalyDetector),
        );

        info!(
            "Detector ready: window={}s, immediate_cancel<={}s, threshold={}, seeds={}",
            config.window_seconds,
            config.immediate_cancel_threshold_seconds,
            config.alert_threshold,
            config.seed_count
        );

        Ok(Self {
            clock: Arc::new(SystemClock),
            ingestor: EventIngestor::new(&config),
            computer: SignalComputer::new(&config),
            evaluator: ClusterEvaluator::new(&config),
            evidence: EvidenceBuilder::default(),
            alerts: Vec::new(),
            scorer,
            config,
        })
    }

    /// Use `clock` for fallback timestamps and creation times
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Install an anomaly detector; the configured `ml_weight` takes effect
    pub fn with_anomaly_detector(mut self, detector: Arc<dyn AnomalyDetector>) -> Self {
        info!(
            "Anomaly detector '{}' installed with ml_weight={}",
            detector.name(),
            self.config.ml_weight
        );
        self.scorer = Scorer::new(
            *self.scorer.weights(),
            self.config.ml_weight,
            self.config.anomaly_min_samples,
            detector,
        );
        self
    }

    pub fn with_narrative(mut self, narrative: Box<dyn NarrativeComposer>) -> Self {
        self.evidence.set_narrative(narrative);
        self
    }

    pub fn with_rule_book(mut self, rules: RuleBook) -> Self {
        self.evidence.set_rules(rules);
        self
    }

    /// Ingest an already normalized event
    pub fn ingest(&mut self, event: Event) {
        self.ingestor.ingest(event);
    }

    /// Normalize and ingest a wire payload.
    ///
    /// A rejected payload is counted and logged; the detector stays usable.
    pub fn ingest_value(&mut self, raw: &Value) -> std::result::Result<(), NormalizeError> {
        match normalize(raw, self.clock.now()) {
            Ok(event) => {
                self.ingestor.ingest(event);
                Ok(())
            }
            Err(e) => {
                self.ingestor.record_rejected();
                warn!("Rejected event: {}", e);
                Err(e)
            }
        }
    }

    /// Refresh the anomaly model, then evaluate every seed
    pub fn scan(&mut self) -> Vec<RaisedAlert> {
        self.refresh_anomaly_model();
        self.scan_with_current_model()
    }

    /// Evaluate every seed against whatever model is installed
    pub fn scan_with_current_model(&mut self) -> Vec<RaisedAlert> {
        let seeds = self.evaluator.seeds(self.ingestor.graph());
        seeds
            .iter()
            .filter_map(|seed| self.evaluate_and_alert(seed))
            .collect()
    }

    /// Retrain in place on the current population
    pub fn refresh_anomaly_model(&mut self) -> &AnomalyStatus {
        if !self.scorer.wants_model() {
            return self.scorer.status();
        }
        let population = self.anomaly_population();
        self.scorer.refresh(&population)
    }

    /// Evaluate one seed without raising anything
    pub fn evaluate_seed(&self, seed: &str) -> Option<ClusterEvaluation> {
        self.evaluator.evaluate(
            seed,
            self.ingestor.graph(),
            self.ingestor.ledger(),
            self.ingestor.window(),
            &self.computer,
            &self.scorer,
        )
    }

    /// Evaluate one seed and raise an alert if its cluster crosses the threshold
    pub fn evaluate_and_alert(&mut self, seed: &str) -> Option<RaisedAlert> {
        let evaluation = self.evaluate_seed(seed)?;
        if !self.evaluator.should_alert(&evaluation) {
            return None;
        }

        let created_at = self.clock.now();
        let accounts = evaluation.top_members(self.evaluator.top_members());
        let evidence = self.evidence.build(
            &accounts,
            &evaluation.members,
            evaluation.cluster_score,
            self.ingestor.window(),
            created_at,
        );
        let alert = self
            .evaluator
            .build_alert(&evaluation, &evidence.evidence_id, created_at);

        info!(
            "[ALERT] {} | score={} | accounts={} | evidence={}",
            alert.alert_id,
            alert.cluster_score,
            alert.cluster_accounts.join(","),
            evidence.evidence_id
        );
        self.alerts.push(alert.clone());
        Some(RaisedAlert { alert, evidence })
    }

    pub fn signals(&self, account: &str) -> SignalVector {
        self.computer.compute(
            account,
            self.ingestor.ledger(),
            self.ingestor.window(),
            self.ingestor.graph(),
        )
    }

    pub fn score_account(&self, account: &str) -> ScoreBreakdown {
        self.scorer.score(&self.signals(account))
    }

    /// Feature vectors of every account in the graph, ordered by account id
    pub fn anomaly_population(&self) -> Vec<FeatureVector> {
        let mut accounts: Vec<&str> = self.ingestor.graph().account_nodes().collect();
        accounts.sort_unstable();
        accounts
            .into_iter()
            .map(|account| self.signals(account).features())
            .collect()
    }

    /// Swap in the outcome of a fit that ran off the ingest path
    pub fn install_anomaly_model(
        &mut self,
        result: std::result::Result<Arc<dyn AnomalyModel>, AnomalyError>,
        samples: usize,
    ) {
        self.scorer.install_result(result, samples);
    }

    pub fn anomaly_detector(&self) -> Arc<dyn AnomalyDetector> {
        self.scorer.anomaly_detector()
    }

    pub fn anomaly_status(&self) -> &AnomalyStatus {
        self.scorer.status()
    }

    /// Whether scans use an anomaly model at all
    pub fn anomaly_enabled(&self) -> bool {
        self.scorer.wants_model()
    }

    /// Minimum population for anomaly training
    pub fn anomaly_min_samples(&self) -> usize {
        self.scorer.min_samples()
    }

    /// Every alert raised so far
    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn stats(&self) -> &IngestStats {
        self.ingestor.stats()
    }

    pub fn graph(&self) -> &RelationshipGraph {
        self.ingestor.graph()
    }

    pub fn window(&self) -> &SlidingWindow {
        self.ingestor.window()
    }

    pub fn ledger(&self) -> &AccountLedger {
        self.ingestor.ledger()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::IsolationForestDetector;
    use crate::error::DetectorError;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use vigil_clock::ManualClock;

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()))
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let config = DetectorConfig {
            window_seconds: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            Detector::new(config),
            Err(DetectorError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_ml_weight_without_detector_is_rule_only() {
        let detector = Detector::new(DetectorConfig::default().with_ml_weight(0.5)).unwrap();
        assert!(!detector.anomaly_enabled());
        assert_eq!(detector.anomaly_status(), &AnomalyStatus::Disabled);
    }

    #[test]
    fn test_rejected_payload_keeps_detector_usable() {
        let mut detector = Detector::new(DetectorConfig::default()).unwrap();

        assert!(detector.ingest_value(&json!({ "type": "heartbeat" })).is_err());
        assert!(detector.ingest_value(&json!("nope")).is_err());
        assert!(
            detector
                .ingest_value(&json!({ "type": "order", "account": "A", "instrument": "XYZ" }))
                .is_ok()
        );

        assert_eq!(detector.stats().rejected, 2);
        assert_eq!(detector.stats().orders, 1);
        assert_eq!(detector.window().len(), 1);
    }

    #[test]
    fn test_missing_timestamp_uses_clock() {
        let clock = manual_clock();
        let mut detector = Detector::new(DetectorConfig::default())
            .unwrap()
            .with_clock(clock.clone());

        detector
            .ingest_value(&json!({ "type": "order", "account": "A" }))
            .unwrap();

        let event = detector.window().snapshot().next().unwrap();
        assert_eq!(event.timestamp, clock.now());
        assert_eq!(detector.stats().inferred_timestamps, 1);
    }

    #[test]
    fn test_anomaly_needs_population() {
        let mut detector = Detector::new(DetectorConfig::default().with_ml_weight(0.3))
            .unwrap()
            .with_anomaly_detector(Arc::new(IsolationForestDetector::new()));

        detector
            .ingest_value(&json!({
                "type": "trade", "ts": "2025-01-01T00:00:00Z",
                "buy_account": "A", "sell_account": "B", "instrument": "XYZ"
            }))
            .unwrap();

        let status = detector.refresh_anomaly_model().clone();
        assert_eq!(
            status,
            AnomalyStatus::InsufficientSamples {
                needed: 8,
                available: 2
            }
        );
        assert_eq!(detector.score_account("A").anomaly, 0.0);
    }

    #[test]
    fn test_empty_detector_scans_quietly() {
        let mut detector = Detector::new(DetectorConfig::default()).unwrap();
        assert!(detector.scan().is_empty());
        assert!(detector.alerts().is_empty());
    }
}
