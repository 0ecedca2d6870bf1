//! Vigil Detector
//!
//! Flags clusters of accounts whose trading looks like market manipulation:
//! wash trading, layering, circular trading and beneficiary churn.
//!
//! ## Architecture
//!
//! ```text
//! events ──► EventIngestor ──┬──► SlidingWindow    (recent events)
//!                            ├──► AccountLedger    (counters, order index)
//!                            └──► RelationshipGraph (accounts ↔ instruments)
//!
//! scan ──► ClusterEvaluator ──► SignalComputer ──► Scorer ──► aggregate
//!                                                                │
//!                                   EvidenceBuilder ◄── ≥ threshold
//!                                          │
//!                                          ▼
//!                                   Alert + EvidencePack
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vigil_detector::{Detector, DetectorConfig};
//!
//! let mut detector = Detector::new(DetectorConfig::default())?;
//! for raw in events {
//!     detector.ingest_value(&raw)?;
//! }
//! for raised in detector.scan() {
//!     println!("{} {}", raised.alert.alert_id, raised.alert.cluster_score);
//! }
//! ```

pub mod anomaly;
pub mod cluster;
pub mod config;
pub mod detector;
pub mod error;
pub mod evidence;
pub mod ingest;
pub mod ledger;
pub mod narrative;
pub mod rules;
pub mod scorer;
pub mod signals;
pub mod window;

// Re-export main types
pub use anomaly::{IsolationForestDetector, NoopAnomalyDetector};
pub use cluster::{ClusterEvaluation, ClusterEvaluator, MemberScore, RaisedAlert, aggregate};
pub use config::DetectorConfig;
pub use detector::Detector;
pub use error::{DetectorError, Result};
pub use evidence::{EvidenceBuilder, select_events};
pub use ingest::{EventIngestor, IngestStats};
pub use ledger::{AccountLedger, AccountRegistry, OrderIndex};
pub use narrative::ChronologyNarrative;
pub use rules::RuleBook;
pub use scorer::{AnomalyStatus, RuleWeights, ScoreBreakdown, Scorer, clamp_unit};
pub use signals::{ClusterShape, SignalComputer};
pub use window::SlidingWindow;
