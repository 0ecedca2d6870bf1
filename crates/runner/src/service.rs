//! Detection Service - async single-writer loop around a [`Detector`]
//!
//! ```text
//!   producers ──► mpsc<Value> ──► DetectionService ──► mpsc<RaisedAlert>
//!                                   │        ▲
//!                          interval │        │ swap
//!                                   ▼        │
//!                         spawn_blocking(fit) ─┘  (bounded by timeout)
//! ```
//!
//! The service owns the detector outright. Any number of producers can hold
//! clones of the input sender; ingestion and scans still happen one at a time.
//!
//! At most one fit runs at a time. A fit that overruns the timeout stays in
//! flight; later scans skip training until it finishes, then install its
//! model before starting the next fit.

use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use vigil_detector::{Detector, RaisedAlert};
use vigil_ports::{AnomalyError, AnomalyModel, AnomalyResult};

use crate::config::RunnerConfig;

/// What a finished service hands back
pub struct ServiceReport {
    pub events_received: u64,
    pub scans: u64,
    pub alerts_raised: u64,
    pub training_timeouts: u64,
    /// Scans that found the previous fit still running
    pub training_skips: u64,
    /// The detector, with its full state, for inspection
    pub detector: Detector,
}

type FitOutcome = AnomalyResult<Arc<dyn AnomalyModel>>;

/// A fit that outlived its timeout
struct Training {
    handle: JoinHandle<FitOutcome>,
    samples: usize,
}

pub struct DetectionService {
    detector: Detector,
    input: mpsc::Receiver<Value>,
    output: mpsc::Sender<RaisedAlert>,
    scan_interval: Duration,
    training_timeout: Duration,
    events_received: u64,
    scans: u64,
    alerts_raised: u64,
    training_timeouts: u64,
    training_skips: u64,
    training: Option<Training>,
    pending: bool,
}

impl DetectionService {
    /// Build the service plus the input sender and alert receiver
    pub fn new(
        detector: Detector,
        config: &RunnerConfig,
    ) -> (Self, mpsc::Sender<Value>, mpsc::Receiver<RaisedAlert>) {
        let capacity = config.channel_capacity.max(1);
        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (output_tx, output_rx) = mpsc::channel(capacity);

        let service = Self {
            detector,
            input: input_rx,
            output: output_tx,
            scan_interval: config.scan_interval(),
            training_timeout: config.training_timeout(),
            events_received: 0,
            scans: 0,
            alerts_raised: 0,
            training_timeouts: 0,
            training_skips: 0,
            training: None,
            pending: false,
        };
        (service, input_tx, output_rx)
    }

    pub fn spawn(self) -> JoinHandle<ServiceReport> {
        tokio::spawn(self.run())
    }

    /// Ingest until every input sender is dropped, scanning on the interval
    /// whenever new events arrived, then scan once more and stop
    pub async fn run(mut self) -> ServiceReport {
        info!(
            "Detection service started (scan every {:?}, training timeout {:?})",
            self.scan_interval, self.training_timeout
        );

        let mut ticker = tokio::time::interval(self.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                received = self.input.recv() => {
                    match received {
                        Some(raw) => {
                            self.events_received += 1;
                            // Rejections are counted and logged by the detector
                            let _ = self.detector.ingest_value(&raw);
                            self.pending = true;
                        }
                        None => {
                            debug!("Input closed after {} events", self.events_received);
                            break;
                        }
                    }
                }

                _ = ticker.tick() => {
                    if self.pending {
                        self.scan_cycle().await;
                    }
                }
            }
        }

        self.scan_cycle().await;

        info!(
            "Detection service stopped: {} events, {} scans, {} alerts",
            self.events_received, self.scans, self.alerts_raised
        );

        ServiceReport {
            events_received: self.events_received,
            scans: self.scans,
            alerts_raised: self.alerts_raised,
            training_timeouts: self.training_timeouts,
            training_skips: self.training_skips,
            detector: self.detector,
        }
    }

    async fn scan_cycle(&mut self) {
        self.refresh_anomaly_model().await;

        let raised = self.detector.scan_with_current_model();
        self.scans += 1;
        self.pending = false;

        for alert in raised {
            self.alerts_raised += 1;
            if self.output.send(alert).await.is_err() {
                debug!("Alert receiver dropped, discarding alert");
            }
        }
    }

    /// Fit off the async workers, then swap the finished model in.
    ///
    /// Scans keep using the previous model while a fit runs. A fit that
    /// overruns the timeout is parked and harvested by a later scan.
    async fn refresh_anomaly_model(&mut self) {
        if !self.detector.anomaly_enabled() {
            return;
        }

        if let Some(training) = self.training.take() {
            if !training.handle.is_finished() {
                self.training_skips += 1;
                debug!("Anomaly training still running, scanning with current model");
                self.training = Some(training);
                return;
            }
            let samples = training.samples;
            let joined = training.handle.await;
            self.install_fit(joined, samples);
        }

        let population = self.detector.anomaly_population();
        let samples = population.len();
        let needed = self.detector.anomaly_min_samples();
        if samples < needed {
            self.detector.install_anomaly_model(
                Err(AnomalyError::InsufficientSamples {
                    needed,
                    available: samples,
                }),
                samples,
            );
            return;
        }

        let detector = self.detector.anomaly_detector();
        let mut handle = tokio::task::spawn_blocking(move || detector.fit(&population));

        match tokio::time::timeout(self.training_timeout, &mut handle).await {
            Ok(joined) => self.install_fit(joined, samples),
            Err(_) => {
                self.training_timeouts += 1;
                warn!(
                    "Anomaly training on {} samples exceeded {:?}, keeping current model",
                    samples, self.training_timeout
                );
                self.training = Some(Training { handle, samples });
            }
        }
    }

    fn install_fit(&mut self, joined: std::result::Result<FitOutcome, JoinError>, samples: usize) {
        let result = match joined {
            Ok(result) => result,
            Err(join_error) => Err(AnomalyError::Training(join_error.to_string())),
        };
        self.detector.install_anomaly_model(result, samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vigil_detector::DetectorConfig;

    fn service(config: &RunnerConfig) -> (DetectionService, mpsc::Sender<Value>, mpsc::Receiver<RaisedAlert>) {
        let detector = Detector::new(config.detector.clone()).unwrap();
        DetectionService::new(detector, config)
    }

    #[tokio::test]
    async fn test_closing_input_runs_final_scan() {
        let config = RunnerConfig::default();
        let (service, input, _alerts) = service(&config);
        let handle = service.spawn();

        input
            .send(json!({ "type": "order", "account": "A", "instrument": "XYZ" }))
            .await
            .unwrap();
        drop(input);

        let report = handle.await.unwrap();
        assert_eq!(report.events_received, 1);
        assert!(report.scans >= 1);
        assert_eq!(report.alerts_raised, 0);
        assert_eq!(report.detector.stats().orders, 1);
    }

    #[tokio::test]
    async fn test_rejected_events_do_not_stop_service() {
        let config = RunnerConfig::default();
        let (service, input, _alerts) = service(&config);
        let handle = service.spawn();

        input.send(json!("garbage")).await.unwrap();
        input.send(json!({ "type": "order", "account": "A" })).await.unwrap();
        drop(input);

        let report = handle.await.unwrap();
        assert_eq!(report.events_received, 2);
        assert_eq!(report.detector.stats().rejected, 1);
        assert_eq!(report.detector.stats().orders, 1);
    }

    #[tokio::test]
    async fn test_rule_only_detector_skips_training() {
        let config = RunnerConfig {
            detector: DetectorConfig::default().with_ml_weight(0.5),
            ..Default::default()
        };
        let (service, input, _alerts) = service(&config);
        let handle = service.spawn();
        drop(input);

        let report = handle.await.unwrap();
        assert_eq!(report.training_timeouts, 0);
        assert!(!report.detector.anomaly_enabled());
    }
}
