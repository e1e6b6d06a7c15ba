//! Anomaly detection engine
//!
//! Pipeline: feature extraction, standardization with training-time
//! statistics, isolation-forest scoring, then severity and recommendation
//! derivation. Training produces an immutable [`TrainedModel`] snapshot;
//! detection runs against a snapshot and never mutates it.

mod features;
mod forest;
mod recommend;
mod scaler;
mod severity;

pub use features::{FeatureExtractor, FeatureMatrix, CALENDAR_FEATURES, CANONICAL_FEATURES};
pub use forest::{ForestConfig, IsolationForest, DEFAULT_TREES, MIN_TRAINING_SAMPLES};
pub use recommend::{recommendations, NORMAL_OPERATION};
pub use scaler::{ScalerParams, StandardScaler};
pub use severity::classify;

use crate::error::MonitorError;
use crate::models::{AnomalyReport, DetectionStatus, MetricSample};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Configuration for training anomaly models
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Expected fraction of outliers in training data
    pub contamination: f64,
    /// Trees in the isolation ensemble
    pub trees: usize,
    /// RNG seed for reproducible training
    pub seed: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            trees: DEFAULT_TREES,
            seed: 42,
        }
    }
}

/// Trains anomaly models from raw sample batches
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: DetectorConfig,
    extractor: FeatureExtractor,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            extractor: FeatureExtractor::new(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Build a complete model snapshot from a training batch. Nothing is
    /// shared with previously trained models; the caller swaps the result
    /// in only on success.
    pub fn train(
        &self,
        samples: &[MetricSample],
        now: DateTime<Utc>,
    ) -> Result<TrainedModel, MonitorError> {
        if samples.len() < MIN_TRAINING_SAMPLES {
            return Err(MonitorError::InsufficientData {
                got: samples.len(),
                need: MIN_TRAINING_SAMPLES,
            });
        }

        let matrix = self.extractor.extract(samples);
        let scaler = StandardScaler::fit(&matrix)?;
        let scaled = scaler.transform(&matrix)?;
        let forest = IsolationForest::fit(
            &scaled,
            &ForestConfig {
                trees: self.config.trees,
                contamination: self.config.contamination,
                seed: self.config.seed,
            },
        )?;

        debug!(
            samples = samples.len(),
            features = matrix.width(),
            with_calendar = matrix.with_calendar,
            "model training completed"
        );

        Ok(TrainedModel {
            scaler,
            forest,
            with_calendar: matrix.with_calendar,
            contamination: self.config.contamination,
            trained_at: now,
        })
    }
}

/// Immutable trained model snapshot: scaler statistics, ensemble state, and
/// the contamination used to fix the decision threshold.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    scaler: ScalerParams,
    forest: IsolationForest,
    with_calendar: bool,
    contamination: f64,
    trained_at: DateTime<Utc>,
}

impl TrainedModel {
    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    /// Run detection over a batch. Never fails: an empty batch yields a
    /// `no_data` report and internal failures yield an `error` report with
    /// the failure message.
    pub fn detect(&self, samples: &[MetricSample], now: DateTime<Utc>) -> AnomalyReport {
        if samples.is_empty() {
            return AnomalyReport::no_data(now);
        }

        match self.score_batch(samples) {
            Ok(scores) => self.build_report(samples, &scores, now),
            Err(err) => AnomalyReport::error(now, err.to_string()),
        }
    }

    /// Score a batch, returning per-sample decision values and flags.
    /// A feature-width mismatch against the trained model is a hard error.
    pub fn score_batch(&self, samples: &[MetricSample]) -> Result<BatchScores, MonitorError> {
        let matrix = FeatureExtractor::new().extract(samples);
        if matrix.with_calendar != self.with_calendar {
            return Err(MonitorError::Validation(format!(
                "batch calendar mode ({}) does not match training mode ({})",
                matrix.with_calendar, self.with_calendar
            )));
        }

        let scaled = self.scaler.transform(&matrix)?;

        let mut decisions = Vec::with_capacity(scaled.len());
        let mut flags = Vec::with_capacity(scaled.len());
        for row in &scaled {
            decisions.push(self.forest.decision_function(row)?);
            flags.push(self.forest.predict(row)?);
        }

        Ok(BatchScores { decisions, flags })
    }

    fn build_report(
        &self,
        samples: &[MetricSample],
        scores: &BatchScores,
        now: DateTime<Utc>,
    ) -> AnomalyReport {
        let total_count = samples.len();
        let anomaly_count = scores.flags.iter().filter(|&&f| f == -1).count();
        let anomaly_percentage = round2(100.0 * anomaly_count as f64 / total_count as f64);

        let worst_score = scores
            .decisions
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);

        let anomalous_samples: Vec<MetricSample> = scores
            .flags
            .iter()
            .zip(samples)
            .filter(|(&flag, _)| flag == -1)
            .map(|(_, sample)| sample.clone())
            .collect();

        // With zero outliers every decision is non-negative, so this
        // resolves to Low without a special case.
        let severity = classify(anomaly_percentage, worst_score);

        AnomalyReport {
            status: if anomaly_count > 0 {
                DetectionStatus::Anomaly
            } else {
                DetectionStatus::Normal
            },
            message: None,
            timestamp: now,
            total_count,
            anomaly_count,
            anomaly_percentage,
            severity,
            recommendations: recommendations(&anomalous_samples),
            anomalous_samples,
        }
    }
}

/// Per-sample scoring output for one batch
#[derive(Debug, Clone)]
pub struct BatchScores {
    /// Threshold-shifted decision values; negative means outlier
    pub decisions: Vec<f64>,
    /// +1 inlier, -1 outlier
    pub flags: Vec<i8>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
