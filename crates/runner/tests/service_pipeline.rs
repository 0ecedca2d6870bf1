//! Service Pipeline Integration Test
//!
//! Tests the full flow:
//! 1. Events are read from a JSONL file
//! 2. The detection service ingests them over its input channel
//! 3. Raised alerts arrive on the output channel
//! 4. Evidence and alerts are persisted to disk

use chrono::{Duration, TimeZone, Utc};
use serde_json::{Value, json};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use vigil_clock::ManualClock;
use vigil_core::FeatureVector;
use vigil_detector::{AnomalyStatus, Detector, DetectorConfig, IsolationForestDetector};
use vigil_ports::{AnomalyDetector, AnomalyModel, AnomalyResult};
use vigil_runner::{
    AlertLog, AlertRecorder, DetectionService, FileEvidenceSink, RunnerConfig, read_events_from,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ts(secs: i64) -> String {
    (Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs))
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// Two accounts trading with each other and flashing orders
fn wash_events() -> Vec<Value> {
    let mut events = Vec::new();
    for round in 0..6 {
        let t = round * 10;
        events.push(json!({
            "type": "order", "ts": ts(t), "order_ref": format!("A-{round}"),
            "account": "A", "instrument": "XYZ", "side": "buy", "qty": 5
        }));
        events.push(json!({
            "type": "order", "ts": ts(t + 1), "order_ref": format!("B-{round}"),
            "account": "B", "instrument": "XYZ", "side": "sell", "qty": 5
        }));
        events.push(json!({
            "type": "trade", "ts": ts(t + 2), "instrument": "XYZ", "qty": 5,
            "meta": { "maker": "A", "taker": "B" }
        }));
        for (offset, account) in [(3, "A"), (5, "B")] {
            let order_ref = format!("{account}-flash-{round}");
            events.push(json!({
                "type": "order", "ts": ts(t + offset), "order_ref": order_ref,
                "account": account, "instrument": "XYZ"
            }));
            events.push(json!({
                "type": "cancel", "ts": ts(t + offset + 1), "order_ref": order_ref,
                "account": account
            }));
        }
    }
    events
}

fn clocked_detector(config: &RunnerConfig) -> Detector {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 5, 0).unwrap(),
    ));
    Detector::new(config.detector.clone())
        .unwrap()
        .with_clock(clock)
}

/// Test that a file of events ends up as alerts and evidence on disk
#[tokio::test]
async fn test_file_to_alert_log() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    // === Step 1: Write the event file, with one corrupt line ===
    let events_path = dir.path().join("events.jsonl");
    {
        let mut file = std::fs::File::create(&events_path).unwrap();
        for (i, event) in wash_events().iter().enumerate() {
            writeln!(file, "{}", event).unwrap();
            if i == 3 {
                writeln!(file, "{{ not json").unwrap();
            }
        }
    }
    let events = read_events_from(&events_path).unwrap();
    assert_eq!(events.len(), 42);

    // === Step 2: Run the service; only the closing scan fires ===
    let config = RunnerConfig {
        scan_interval_ms: 60_000,
        evidence_dir: dir.path().join("evidence"),
        alerts_path: dir.path().join("alerts.jsonl"),
        ..Default::default()
    };
    let (service, input, mut alerts) = DetectionService::new(clocked_detector(&config), &config);
    let handle = service.spawn();

    for event in events {
        input.send(event).await.unwrap();
    }
    drop(input);

    // === Step 3: Persist what comes out ===
    let mut recorder = AlertRecorder::new(
        FileEvidenceSink::new(&config.evidence_dir).unwrap(),
        AlertLog::open(&config.alerts_path).unwrap(),
    );
    let mut recorded = Vec::new();
    while let Some(raised) = alerts.recv().await {
        assert!(raised.alert.cluster_score >= 0.6);
        recorded.push(recorder.record(raised).unwrap());
    }

    let report = handle.await.unwrap();
    assert_eq!(report.events_received, 42);
    assert_eq!(report.alerts_raised as usize, recorded.len());
    assert!(!recorded.is_empty());

    // === Step 4: Check the files ===
    let first = &recorded[0];
    assert!(first.evidence_path.ends_with(".json"));
    let evidence: Value =
        serde_json::from_str(&std::fs::read_to_string(&first.evidence_path).unwrap()).unwrap();
    assert_eq!(evidence["accounts"], json!(["A", "B"]));
    assert_eq!(evidence["events"].as_array().unwrap().len(), 42);

    let log = std::fs::read_to_string(&config.alerts_path).unwrap();
    assert_eq!(log.lines().count(), recorded.len());
    let logged: Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(logged["cluster_seed"], first.cluster_seed.as_str());
    assert_eq!(logged["evidence_path"], first.evidence_path.as_str());
}

/// Test that the anomaly model is trained off-thread and used for scoring
#[tokio::test]
async fn test_service_trains_anomaly_model() {
    let config = RunnerConfig {
        detector: DetectorConfig::default().with_ml_weight(0.3),
        ..Default::default()
    };
    let detector = clocked_detector(&config)
        .with_anomaly_detector(Arc::new(IsolationForestDetector::new().with_seed(3)));
    let (service, input, mut alerts) = DetectionService::new(detector, &config);
    let handle = service.spawn();

    for event in wash_events() {
        input.send(event).await.unwrap();
    }
    for pair in 0..8 {
        input
            .send(json!({
                "type": "trade", "ts": ts(100 + pair), "instrument": format!("I{pair}"),
                "buy_account": format!("Q{pair}a"), "sell_account": format!("Q{pair}b")
            }))
            .await
            .unwrap();
    }
    drop(input);

    while alerts.recv().await.is_some() {}
    let report = handle.await.unwrap();

    assert_eq!(
        report.detector.anomaly_status(),
        &AnomalyStatus::Ready { samples: 18 }
    );
    assert_eq!(report.training_timeouts, 0);
    let score = report.detector.score_account("A");
    assert!(score.anomaly > 0.0);
    assert!((0.0..=1.0).contains(&score.final_score));
}

/// Detector whose training never finishes in time
struct SlowDetector;

struct ZeroModel;

impl AnomalyModel for ZeroModel {
    fn anomaly_score(&self, _sample: &FeatureVector) -> AnomalyResult<f64> {
        Ok(0.0)
    }
}

impl AnomalyDetector for SlowDetector {
    fn name(&self) -> &str {
        "slow"
    }

    fn min_samples(&self) -> usize {
        1
    }

    fn fit(&self, _samples: &[FeatureVector]) -> AnomalyResult<Arc<dyn AnomalyModel>> {
        std::thread::sleep(std::time::Duration::from_millis(300));
        Ok(Arc::new(ZeroModel))
    }
}

/// Test that a training timeout degrades to rule-only scoring
#[tokio::test]
async fn test_training_timeout_keeps_rule_only_scoring() {
    let config = RunnerConfig {
        detector: DetectorConfig {
            anomaly_min_samples: 1,
            ..DetectorConfig::default().with_ml_weight(0.5)
        },
        training_timeout_ms: 10,
        ..Default::default()
    };
    let detector = clocked_detector(&config).with_anomaly_detector(Arc::new(SlowDetector));
    let (service, input, _alerts) = DetectionService::new(detector, &config);
    let handle = service.spawn();

    input
        .send(json!({
            "type": "trade", "ts": ts(0), "instrument": "XYZ",
            "buy_account": "A", "sell_account": "B"
        }))
        .await
        .unwrap();
    drop(input);

    let report = handle.await.unwrap();
    assert!(report.training_timeouts >= 1);
    assert_eq!(report.detector.anomaly_status(), &AnomalyStatus::Disabled);

    let score = report.detector.score_account("A");
    assert_eq!(score.anomaly, 0.0);
    assert_eq!(score.final_score, 0.5 * score.rule);
}

/// Detector whose fits outlast the timeout, tracking how many overlap
#[derive(Default)]
struct CountingDetector {
    running: AtomicUsize,
    max_running: AtomicUsize,
    started: AtomicUsize,
}

impl AnomalyDetector for CountingDetector {
    fn name(&self) -> &str {
        "counting"
    }

    fn min_samples(&self) -> usize {
        1
    }

    fn fit(&self, _samples: &[FeatureVector]) -> AnomalyResult<Arc<dyn AnomalyModel>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(100));
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(Arc::new(ZeroModel))
    }
}

/// Test that an overrunning fit is never doubled up and is installed late
#[tokio::test]
async fn test_overrunning_training_runs_one_fit_at_a_time() {
    let config = RunnerConfig {
        detector: DetectorConfig {
            anomaly_min_samples: 1,
            ..DetectorConfig::default().with_ml_weight(0.5)
        },
        training_timeout_ms: 5,
        scan_interval_ms: 20,
        ..Default::default()
    };
    let counting = Arc::new(CountingDetector::default());
    let detector = clocked_detector(&config).with_anomaly_detector(counting.clone());
    let (service, input, _alerts) = DetectionService::new(detector, &config);
    let handle = service.spawn();

    for i in 0..15 {
        input
            .send(json!({
                "type": "trade", "ts": ts(i), "instrument": "XYZ",
                "buy_account": "A", "sell_account": "B"
            }))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    }
    drop(input);

    let report = handle.await.unwrap();
    assert_eq!(counting.max_running.load(Ordering::SeqCst), 1);
    assert!(report.training_skips >= 1);
    assert!(counting.started.load(Ordering::SeqCst) as u64 <= report.training_timeouts + 1);
    assert_eq!(
        report.detector.anomaly_status(),
        &AnomalyStatus::Ready { samples: 2 }
    );
}
