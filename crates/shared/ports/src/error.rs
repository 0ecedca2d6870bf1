use thiserror::Error;

/// Failures inside an anomaly detector.
///
/// None of these ever abort a scan: the scorer treats every variant as
/// "anomaly unavailable for this cycle".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnomalyError {
    #[error("Not enough samples to train: need {needed}, have {available}")]
    InsufficientSamples { needed: usize, available: usize },

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Model is not trained")]
    NotTrained,
}

pub type AnomalyResult<T> = std::result::Result<T, AnomalyError>;

/// Failures while handing evidence to external storage
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to serialize evidence {evidence_id}: {reason}")]
    Serialize { evidence_id: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;
