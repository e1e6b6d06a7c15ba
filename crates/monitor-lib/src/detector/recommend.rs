//! Recommendation strings derived from flagged samples
//!
//! Means are computed only across the flagged outlier samples, never the
//! whole batch. Each rule fires independently; output order is fixed
//! (cpu, memory, error rate, latency) so reports are deterministic.

use crate::models::MetricSample;

const CPU_THRESHOLD: f64 = 80.0;
const MEMORY_THRESHOLD: f64 = 80.0;
const ERROR_RATE_THRESHOLD: f64 = 10.0;
const RESPONSE_TIME_THRESHOLD: f64 = 2.0;

pub const NORMAL_OPERATION: &str = "System appears to be operating normally.";

/// Build recommendations from the outlier samples of a detection pass.
/// Always returns at least one entry.
pub fn recommendations(outliers: &[MetricSample]) -> Vec<String> {
    let mut result = Vec::new();

    if !outliers.is_empty() {
        let n = outliers.len() as f64;
        let mean = |f: fn(&MetricSample) -> f64| outliers.iter().map(f).sum::<f64>() / n;

        if mean(|s| s.cpu_usage) > CPU_THRESHOLD {
            result.push(
                "High CPU usage detected. Consider scaling up or optimizing processes."
                    .to_string(),
            );
        }
        if mean(|s| s.memory_usage) > MEMORY_THRESHOLD {
            result.push(
                "High memory usage detected. Check for memory leaks or increase memory allocation."
                    .to_string(),
            );
        }
        if mean(|s| s.error_rate) > ERROR_RATE_THRESHOLD {
            result.push(
                "High error rate detected. Review application logs and fix critical issues."
                    .to_string(),
            );
        }
        if mean(|s| s.response_time) > RESPONSE_TIME_THRESHOLD {
            result.push(
                "Slow response times detected. Optimize database queries and API calls."
                    .to_string(),
            );
        }
    }

    if result.is_empty() {
        result.push(NORMAL_OPERATION.to_string());
    }

    result
}
