//! Runner configuration
//!
//! Wraps the detector tunables with the service and output settings.
//!
//! ```json
//! {
//!   "detector": { "window_seconds": 600, "ml_weight": 0.2 },
//!   "scan_interval_ms": 500,
//!   "evidence_dir": "out/evidence"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vigil_detector::DetectorConfig;

use crate::error::{Result, RunnerError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub detector: DetectorConfig,
    /// Scan cadence while events are flowing
    pub scan_interval_ms: u64,
    /// Anomaly training slower than this is abandoned for the cycle
    pub training_timeout_ms: u64,
    /// Capacity of the input and output queues
    pub channel_capacity: usize,
    pub evidence_dir: PathBuf,
    pub alerts_path: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            scan_interval_ms: 1_000,
            training_timeout_ms: 2_000,
            channel_capacity: 10_000,
            evidence_dir: PathBuf::from("results/evidence"),
            alerts_path: PathBuf::from("results/alerts.jsonl"),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| RunnerError::io(path.display().to_string(), e))?;
        serde_json::from_str(&content).map_err(|e| RunnerError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn training_timeout(&self) -> Duration {
        Duration::from_millis(self.training_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("scan_interval_ms", self.scan_interval_ms),
            ("training_timeout_ms", self.training_timeout_ms),
            ("channel_capacity", self.channel_capacity as u64),
        ] {
            if value == 0 {
                return Err(RunnerError::InvalidConfig {
                    field: field.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        self.detector.validate()?;
        Ok(())
    }
}
