//! Metric and health providers
//!
//! The orchestrator consumes these capabilities through the
//! [`MetricsProvider`] trait so transports stay swappable. The HTTP
//! implementation talks to the monitored application's `/metrics` and
//! `/health` endpoints.

use crate::error::MonitorError;
use crate::models::{HealthCheckResult, HealthStatus, MetricSample};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

/// Timeout applied to every provider request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Fetch recent metric samples. May legitimately return an empty batch.
    async fn fetch_metrics(&self) -> Result<Vec<MetricSample>, MonitorError>;

    /// Probe the monitored application's health endpoint.
    async fn fetch_health(&self) -> Result<HealthCheckResult, MonitorError>;
}

/// HTTP provider against the monitored application
pub struct HttpMetricsProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMetricsProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self, MonitorError> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl MetricsProvider for HttpMetricsProvider {
    async fn fetch_metrics(&self) -> Result<Vec<MetricSample>, MonitorError> {
        let url = format!("{}/metrics", self.base_url);
        let payload: serde_json::Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let samples = parse_samples(payload)?;
        debug!(url = %url, samples = samples.len(), "fetched metrics");
        Ok(samples)
    }

    async fn fetch_health(&self) -> Result<HealthCheckResult, MonitorError> {
        let url = format!("{}/health", self.base_url);
        let started = Instant::now();
        let payload: serde_json::Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(health_from_payload(payload, started.elapsed()))
    }
}

/// Accept either one sample object or an array of them. Array entries that
/// are not objects are dropped rather than failing the batch.
fn parse_samples(payload: serde_json::Value) -> Result<Vec<MetricSample>, MonitorError> {
    match payload {
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()),
        value @ serde_json::Value::Object(_) => {
            let sample = serde_json::from_value(value)
                .map_err(|e| MonitorError::Validation(format!("malformed metrics payload: {e}")))?;
            Ok(vec![sample])
        }
        other => Err(MonitorError::Validation(format!(
            "metrics payload is not an object or array: {other}"
        ))),
    }
}

/// Classify a health payload: healthy iff its `status` field says so.
fn health_from_payload(payload: serde_json::Value, elapsed: Duration) -> HealthCheckResult {
    let status = if payload.get("status").and_then(|s| s.as_str()) == Some("healthy") {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };

    HealthCheckResult {
        status,
        details: payload,
        response_time: Some(elapsed.as_secs_f64()),
    }
}
