//! Core data models for the metric monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One raw metric sample from the monitored application.
///
/// Unknown fields in the wire payload are ignored; missing or non-numeric
/// fields deserialize to 0.0 so a single bad field never fails a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricSample {
    /// Sample timestamp as reported by the source (RFC 3339 or naive ISO 8601)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cpu_usage: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub memory_usage: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub disk_usage: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub error_rate: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub request_count: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub response_time: f64,
}

/// Accept numbers, numeric strings, or null; anything else coerces to 0.0.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// Outcome classification of one detection pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    NoData,
    Normal,
    Anomaly,
    Error,
}

/// Severity of a detected condition, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Result of one anomaly detection pass over a batch of samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub status: DetectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "total_data_points")]
    pub total_count: usize,
    pub anomaly_count: usize,
    /// 100 * anomaly_count / total_count, rounded to 2 decimals
    pub anomaly_percentage: f64,
    pub severity: Severity,
    /// The flagged samples, in input order, untransformed
    #[serde(rename = "anomalous_data", default, skip_serializing_if = "Vec::is_empty")]
    pub anomalous_samples: Vec<MetricSample>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

impl AnomalyReport {
    /// Report for an empty input batch
    pub fn no_data(timestamp: DateTime<Utc>) -> Self {
        Self {
            status: DetectionStatus::NoData,
            message: Some("No data to analyze".to_string()),
            timestamp,
            total_count: 0,
            anomaly_count: 0,
            anomaly_percentage: 0.0,
            severity: Severity::Low,
            anomalous_samples: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    /// Report for a detection pass that failed internally
    pub fn error(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            status: DetectionStatus::Error,
            message: Some(message.into()),
            timestamp,
            total_count: 0,
            anomaly_count: 0,
            anomaly_percentage: 0.0,
            severity: Severity::Low,
            anomalous_samples: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Health status of the monitored application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Result of one health probe against the monitored application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    /// Raw health payload (or error detail) from the probe
    pub details: serde_json::Value,
    /// Probe round-trip time in seconds, when the probe completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
}

impl HealthCheckResult {
    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            details: serde_json::json!({ "error": detail.into() }),
            response_time: None,
        }
    }
}

/// Kinds of alert actually dispatched during a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    #[serde(rename = "health_alert")]
    Health,
    #[serde(rename = "anomaly_alert")]
    Anomaly,
    #[serde(rename = "error_alert")]
    Error,
    #[serde(rename = "critical_error_alert")]
    CriticalError,
}

/// Record of one complete monitoring cycle, appended to the result log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleResult {
    pub timestamp: DateTime<Utc>,
    pub health_check: Option<HealthCheckResult>,
    /// Absent when the cycle never reached detection (empty fetch)
    pub anomaly_detection: Option<AnomalyReport>,
    pub alerts_sent: Vec<AlertKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CycleResult {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            health_check: None,
            anomaly_detection: None,
            alerts_sent: Vec::new(),
            error: None,
        }
    }
}
