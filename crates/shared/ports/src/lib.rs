//! Vigil Ports
//!
//! Port definitions (traits) for the Vigil detector.
//! These define the boundaries between detection logic and the
//! collaborators it does not own: time, anomaly models, narrative
//! writing, and evidence storage.

mod anomaly;
mod clock;
mod error;
mod narrative;
mod sink;

pub use anomaly::{AnomalyDetector, AnomalyModel};
pub use clock::Clock;
pub use error::{AnomalyError, AnomalyResult, SinkError, SinkResult};
pub use narrative::{NarrativeComposer, NarrativeInput};
pub use sink::EvidenceSink;
