//! Error taxonomy for the monitoring core
//!
//! Per-sample malformed fields are repaired during deserialization and never
//! surface here. Everything else is an explicit variant so the orchestrator
//! can turn failures into result values instead of letting them escape.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Provider returned nothing usable
    #[error("no data available from provider")]
    DataUnavailable,

    /// Feature dimensionality mismatch or unrecoverable malformed batch
    #[error("invalid feature batch: {0}")]
    Validation(String),

    /// Scoring was attempted before any successful training
    #[error("model has not been trained")]
    NotTrained,

    /// Training batch below the minimum sample count
    #[error("insufficient training data: {got} samples, need at least {need}")]
    InsufficientData { got: usize, need: usize },

    /// Ensemble fit failed
    #[error("model training failed: {0}")]
    Training(String),

    /// Network or collaborator failure
    #[error("provider request failed: {0}")]
    Provider(String),

    /// Catch-all recorded at the cycle boundary
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        MonitorError::Provider(err.to_string())
    }
}
