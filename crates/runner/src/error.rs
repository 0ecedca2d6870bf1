//! Runner errors

use thiserror::Error;
use vigil_detector::DetectorError;
use vigil_ports::SinkError;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error(transparent)]
    Detector(#[from] DetectorError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("Invalid runner config field '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Failed to read '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse '{path}': {reason}")]
    Parse { path: String, reason: String },

    #[error("Detection service stopped: {0}")]
    Service(String),
}

impl RunnerError {
    pub(crate) fn io(path: impl Into<String>, error: std::io::Error) -> Self {
        RunnerError::Io {
            path: path.into(),
            error: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;
