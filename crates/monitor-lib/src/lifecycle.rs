//! Model lifecycle management
//!
//! Owns the active [`TrainedModel`] snapshot and the retrain schedule. A
//! retrain builds a complete new snapshot before the active reference is
//! replaced, so a failed retrain leaves the previous model serving. Each
//! detection reads the active reference exactly once.

use crate::detector::{AnomalyDetector, DetectorConfig, TrainedModel};
use crate::error::MonitorError;
use crate::models::{AnomalyReport, MetricSample};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default minimum wall-clock time between retrainings (24 hours)
pub const DEFAULT_RETRAIN_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct ModelLifecycle {
    detector: AnomalyDetector,
    current: Option<Arc<TrainedModel>>,
    last_trained_at: Option<DateTime<Utc>>,
    retrain_interval: Duration,
}

impl ModelLifecycle {
    pub fn new(config: DetectorConfig, retrain_interval: Duration) -> Self {
        Self {
            detector: AnomalyDetector::new(config),
            current: None,
            last_trained_at: None,
            retrain_interval,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.current.is_some()
    }

    pub fn last_trained_at(&self) -> Option<DateTime<Utc>> {
        self.last_trained_at
    }

    /// The active model snapshot. Callers hold the returned reference for
    /// the whole detection pass instead of re-reading it mid-computation.
    pub fn model(&self) -> Option<Arc<TrainedModel>> {
        self.current.clone()
    }

    /// True when no model has ever been trained, or the retrain interval
    /// has elapsed since the last successful training.
    pub fn should_retrain(&self, now: DateTime<Utc>) -> bool {
        match self.last_trained_at {
            None => true,
            Some(last) => (now - last).num_seconds() > self.retrain_interval.as_secs() as i64,
        }
    }

    /// Train a new snapshot and swap it in. On failure the previously
    /// active model (if any) keeps serving and `last_trained_at` is left
    /// untouched.
    pub fn retrain(
        &mut self,
        samples: &[MetricSample],
        now: DateTime<Utc>,
    ) -> Result<(), MonitorError> {
        let model = self.detector.train(samples, now)?;
        self.current = Some(Arc::new(model));
        self.last_trained_at = Some(now);
        info!(samples = samples.len(), "model snapshot replaced");
        Ok(())
    }

    /// Run detection with the active model. `NotTrained` until the first
    /// successful training.
    pub fn detect(
        &self,
        samples: &[MetricSample],
        now: DateTime<Utc>,
    ) -> Result<AnomalyReport, MonitorError> {
        let model = self.model().ok_or(MonitorError::NotTrained)?;
        Ok(model.detect(samples, now))
    }
}
