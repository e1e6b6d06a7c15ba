//! Deterministic synthetic sample generation
//!
//! Stands in for real history when none exists: bootstrap training uses
//! this batch, and the orchestrator can fall back to it on fetch failure
//! when that mode is explicitly enabled. The distribution mixes a majority
//! of nominal samples with a small tail of elevated ones so a freshly
//! trained model has outliers to calibrate its threshold against.

use crate::error::MonitorError;
use crate::models::{HealthCheckResult, HealthStatus, MetricSample};
use crate::provider::MetricsProvider;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_SEED: u64 = 42;

const NOMINAL_SAMPLES: usize = 100;
const ELEVATED_SAMPLES: usize = 10;

/// Generate the standard synthetic batch: 100 nominal samples followed by
/// 10 elevated ones, hourly timestamps walking back from now. Identical
/// seeds yield identical batches apart from the wall-clock timestamps.
pub fn sample_batch(seed: u64) -> Vec<MetricSample> {
    let mut rng = StdRng::seed_from_u64(seed);
    let now = Utc::now();
    let mut batch = Vec::with_capacity(NOMINAL_SAMPLES + ELEVATED_SAMPLES);

    for i in 0..NOMINAL_SAMPLES {
        batch.push(MetricSample {
            timestamp: Some((now - ChronoDuration::hours(i as i64)).to_rfc3339()),
            cpu_usage: normal(&mut rng, 50.0, 10.0),
            memory_usage: normal(&mut rng, 60.0, 8.0),
            disk_usage: normal(&mut rng, 70.0, 5.0),
            error_rate: normal(&mut rng, 2.0, 1.0),
            request_count: normal(&mut rng, 100.0, 20.0),
            response_time: normal(&mut rng, 0.5, 0.2),
        });
    }

    for i in 0..ELEVATED_SAMPLES {
        batch.push(MetricSample {
            timestamp: Some((now - ChronoDuration::hours(i as i64 * 5)).to_rfc3339()),
            cpu_usage: normal(&mut rng, 90.0, 5.0),
            memory_usage: normal(&mut rng, 85.0, 5.0),
            disk_usage: normal(&mut rng, 95.0, 2.0),
            error_rate: normal(&mut rng, 15.0, 3.0),
            request_count: normal(&mut rng, 200.0, 30.0),
            response_time: normal(&mut rng, 2.0, 0.5),
        });
    }

    batch
}

/// Draw from N(mean, std) via the Box-Muller transform.
fn normal(rng: &mut StdRng, mean: f64, std: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    mean + std * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Provider that serves the synthetic batch; useful for exercising the
/// full pipeline without a live application.
pub struct SyntheticProvider {
    seed: u64,
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

#[async_trait]
impl MetricsProvider for SyntheticProvider {
    async fn fetch_metrics(&self) -> Result<Vec<MetricSample>, MonitorError> {
        Ok(sample_batch(self.seed))
    }

    async fn fetch_health(&self) -> Result<HealthCheckResult, MonitorError> {
        Ok(HealthCheckResult {
            status: HealthStatus::Healthy,
            details: serde_json::json!({ "source": "synthetic" }),
            response_time: None,
        })
    }
}
