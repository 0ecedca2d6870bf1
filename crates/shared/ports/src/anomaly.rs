use std::sync::Arc;
use vigil_core::FeatureVector;

use crate::error::AnomalyResult;

/// Port for unsupervised anomaly detection over account feature vectors
///
/// Fitting never mutates a model in place: it returns a fresh model that the
/// caller swaps in once training is complete, so scoring can never observe a
/// half-trained state. Training may therefore run on a worker thread while
/// the previous model keeps serving.
pub trait AnomalyDetector: Send + Sync {
    /// Detector name for logs and status reporting
    fn name(&self) -> &str;

    /// Smallest population worth training on
    fn min_samples(&self) -> usize;

    /// Train a new model on the current account population
    fn fit(&self, samples: &[FeatureVector]) -> AnomalyResult<Arc<dyn AnomalyModel>>;
}

/// A trained, immutable anomaly model
pub trait AnomalyModel: Send + Sync {
    /// Normalized anomaly score in [0, 1]; higher means more anomalous
    fn anomaly_score(&self, sample: &FeatureVector) -> AnomalyResult<f64>;
}
