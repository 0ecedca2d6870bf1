//! Vigil Runner - feeds, service loop and outputs around the detector
//!
//! - **Feed**: JSONL or JSON-array event files
//! - **Service**: async single-writer loop with interval scans and
//!   off-thread anomaly training
//! - **Sink**: evidence files and the append-only alert log
//!
//! ## Architecture
//!
//! ```text
//!   events.jsonl ──► feed ──► mpsc ──► DetectionService ──► mpsc ──► AlertRecorder
//!                                         (Detector)                 │        │
//!                                                                    ▼        ▼
//!                                                         evidence/*.json  alerts.jsonl
//! ```

pub mod config;
pub mod error;
pub mod feed;
pub mod service;
pub mod sink;

// Re-export main types
pub use config::RunnerConfig;
pub use error::{Result, RunnerError};
pub use feed::{read_events, read_events_from};
pub use service::{DetectionService, ServiceReport};
pub use sink::{AlertLog, AlertRecorder, FileEvidenceSink, write_subgraph};
