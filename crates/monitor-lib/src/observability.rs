//! Observability infrastructure
//!
//! Prometheus metrics for cycle progress and failure rates. Registration
//! happens once in a process-global registry; the public handle is a
//! cheap clone.

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;

/// Histogram buckets for cycle and detection durations (in seconds)
const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0];

static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    cycle_duration_seconds: Histogram,
    detection_duration_seconds: Histogram,
    cycles_completed: IntCounter,
    anomalies_detected: IntCounter,
    alerts_sent: IntCounter,
    provider_errors: IntCounter,
    model_trained_timestamp: IntGauge,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            cycle_duration_seconds: register_histogram!(
                "metric_monitor_cycle_duration_seconds",
                "Wall-clock time of one full monitoring cycle",
                DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            detection_duration_seconds: register_histogram!(
                "metric_monitor_detection_duration_seconds",
                "Time spent in the anomaly detection pipeline",
                DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register detection_duration_seconds"),

            cycles_completed: register_int_counter!(
                "metric_monitor_cycles_completed_total",
                "Total number of monitoring cycles completed"
            )
            .expect("Failed to register cycles_completed"),

            anomalies_detected: register_int_counter!(
                "metric_monitor_anomalies_detected_total",
                "Total number of samples flagged as anomalous"
            )
            .expect("Failed to register anomalies_detected"),

            alerts_sent: register_int_counter!(
                "metric_monitor_alerts_sent_total",
                "Total number of alerts successfully dispatched"
            )
            .expect("Failed to register alerts_sent"),

            provider_errors: register_int_counter!(
                "metric_monitor_provider_errors_total",
                "Total number of failed provider requests"
            )
            .expect("Failed to register provider_errors"),

            model_trained_timestamp: register_int_gauge!(
                "metric_monitor_model_trained_timestamp_seconds",
                "Unix timestamp of the last successful model training"
            )
            .expect("Failed to register model_trained_timestamp"),
        }
    }
}

/// Handle to the global monitor metrics
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_cycle_duration(&self, duration_secs: f64) {
        self.inner().cycle_duration_seconds.observe(duration_secs);
    }

    pub fn observe_detection_duration(&self, duration_secs: f64) {
        self.inner().detection_duration_seconds.observe(duration_secs);
    }

    pub fn inc_cycles_completed(&self) {
        self.inner().cycles_completed.inc();
    }

    pub fn add_anomalies_detected(&self, count: u64) {
        self.inner().anomalies_detected.inc_by(count);
    }

    pub fn inc_alerts_sent(&self) {
        self.inner().alerts_sent.inc();
    }

    pub fn inc_provider_errors(&self) {
        self.inner().provider_errors.inc();
    }

    pub fn set_model_trained_at(&self, unix_timestamp: i64) {
        self.inner().model_trained_timestamp.set(unix_timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handle_is_usable() {
        let metrics = MonitorMetrics::new();
        metrics.inc_cycles_completed();
        metrics.add_anomalies_detected(3);
        metrics.observe_cycle_duration(0.25);
        metrics.set_model_trained_at(1_700_000_000);

        // A second handle shares the same registry
        let other = MonitorMetrics::new();
        other.inc_alerts_sent();
    }
}
