//! Monitoring cycle orchestration
//!
//! Sequences one cycle (health check, fetch, detect, alert, retrain check,
//! persist) and runs it forever on a fixed inter-cycle sleep. Every step is
//! guarded so a failure in one never stops subsequent cycles; anything that
//! escapes the steps is recorded in the cycle result and surfaced through
//! one critical alert. Cancellation takes effect only at the inter-cycle
//! boundary.

use crate::alert::AlertSink;
use crate::detector::MIN_TRAINING_SAMPLES;
use crate::error::MonitorError;
use crate::lifecycle::ModelLifecycle;
use crate::models::{
    AlertKind, AnomalyReport, CycleResult, DetectionStatus, HealthCheckResult, HealthStatus,
    Severity,
};
use crate::observability::MonitorMetrics;
use crate::provider::MetricsProvider;
use crate::store::ResultStore;
use crate::synthetic;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Configuration for the monitoring loop
#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Sleep between cycle completions
    pub check_interval: Duration,
    /// Substitute the synthetic batch when a metrics fetch fails; when off,
    /// a failed fetch is recorded as an error-status detection result
    pub fallback_to_synthetic: bool,
    /// Seed for synthetic batches (bootstrap training and opt-in fallback)
    pub synthetic_seed: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(300),
            fallback_to_synthetic: false,
            synthetic_seed: synthetic::DEFAULT_SEED,
        }
    }
}

/// Runs monitoring cycles against injected collaborators
pub struct CycleOrchestrator {
    provider: Arc<dyn MetricsProvider>,
    sink: Arc<dyn AlertSink>,
    store: Arc<dyn ResultStore>,
    lifecycle: ModelLifecycle,
    config: CycleConfig,
    metrics: MonitorMetrics,
    latest: Arc<RwLock<Option<CycleResult>>>,
}

impl CycleOrchestrator {
    pub fn new(
        provider: Arc<dyn MetricsProvider>,
        sink: Arc<dyn AlertSink>,
        store: Arc<dyn ResultStore>,
        lifecycle: ModelLifecycle,
        config: CycleConfig,
    ) -> Self {
        Self {
            provider,
            sink,
            store,
            lifecycle,
            config,
            metrics: MonitorMetrics::new(),
            latest: Arc::new(RwLock::new(None)),
        }
    }

    /// Shared handle to the most recent cycle result, for status endpoints.
    pub fn latest_result(&self) -> Arc<RwLock<Option<CycleResult>>> {
        Arc::clone(&self.latest)
    }

    /// Bootstrap training before the first cycle. Uses provider history
    /// when enough of it exists, otherwise the synthetic batch; without a
    /// successful first training detection cannot run at all.
    pub async fn initialize(&mut self) -> Result<(), MonitorError> {
        info!("initializing anomaly detection model");
        let now = Utc::now();

        let history = match self.provider.fetch_metrics().await {
            Ok(samples) if samples.len() >= MIN_TRAINING_SAMPLES => samples,
            Ok(samples) => {
                warn!(
                    samples = samples.len(),
                    "history too small, training on synthetic batch"
                );
                synthetic::sample_batch(self.config.synthetic_seed)
            }
            Err(err) => {
                self.metrics.inc_provider_errors();
                warn!(error = %err, "history fetch failed, training on synthetic batch");
                synthetic::sample_batch(self.config.synthetic_seed)
            }
        };

        self.lifecycle.retrain(&history, now)?;
        self.metrics.set_model_trained_at(now.timestamp());
        info!("monitoring system initialized");
        Ok(())
    }

    /// Run one full cycle. Never fails: step failures become result values,
    /// and anything that escapes the steps is recorded with one critical
    /// alert. The result is persisted and published before returning.
    pub async fn run_cycle(&mut self) -> CycleResult {
        let started = Instant::now();
        let mut result = CycleResult::new(Utc::now());

        if let Err(err) = self.cycle_steps(&mut result).await {
            error!(error = %err, "monitoring cycle failed");
            result.error = Some(err.to_string());
            let message = format!("Monitoring cycle failed: {err}");
            if self.dispatch(&message, Severity::Critical, None).await {
                result.alerts_sent.push(AlertKind::CriticalError);
            }
        }

        if let Err(err) = self.store.append(&result).await {
            warn!(error = %err, "failed to persist cycle result");
        }

        *self.latest.write().await = Some(result.clone());
        self.metrics.inc_cycles_completed();
        self.metrics
            .observe_cycle_duration(started.elapsed().as_secs_f64());
        result
    }

    async fn cycle_steps(&mut self, result: &mut CycleResult) -> Result<(), MonitorError> {
        let now = result.timestamp;

        // 1. Health check
        let health = self.check_health().await;
        let unhealthy = health.status == HealthStatus::Unhealthy;
        let detail = health
            .details
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown health issue")
            .to_string();
        result.health_check = Some(health);

        if unhealthy {
            match self.sink.send_health_alert(&detail).await {
                Ok(true) => {
                    self.metrics.inc_alerts_sent();
                    result.alerts_sent.push(AlertKind::Health);
                }
                Ok(false) => {}
                Err(err) => warn!(error = %err, "health alert dispatch failed"),
            }
        }

        // 2. Fetch metrics
        let samples = match self.provider.fetch_metrics().await {
            Ok(samples) => samples,
            Err(err) if self.config.fallback_to_synthetic => {
                self.metrics.inc_provider_errors();
                warn!(error = %err, "metrics fetch failed, substituting synthetic batch");
                synthetic::sample_batch(self.config.synthetic_seed)
            }
            Err(err) => {
                self.metrics.inc_provider_errors();
                warn!(error = %err, "metrics fetch failed");
                result.anomaly_detection = Some(AnomalyReport::error(
                    now,
                    format!("metrics fetch failed: {err}"),
                ));
                return Ok(());
            }
        };
        if samples.is_empty() {
            warn!("no metrics data available");
            return Ok(());
        }

        // 3. Detect
        let detect_started = Instant::now();
        let report = match self.lifecycle.detect(&samples, now) {
            Ok(report) => report,
            Err(err) => AnomalyReport::error(now, err.to_string()),
        };
        self.metrics
            .observe_detection_duration(detect_started.elapsed().as_secs_f64());

        // 4. Alert dispatch: one attempt for anomaly-or-error, none for
        // normal or no_data
        match report.status {
            DetectionStatus::Anomaly => {
                warn!(
                    count = report.anomaly_count,
                    percentage = report.anomaly_percentage,
                    severity = %report.severity,
                    "anomalies detected"
                );
                self.metrics
                    .add_anomalies_detected(report.anomaly_count as u64);
                match self.sink.send_anomaly_alert(&report).await {
                    Ok(true) => {
                        self.metrics.inc_alerts_sent();
                        result.alerts_sent.push(AlertKind::Anomaly);
                    }
                    Ok(false) => {}
                    Err(err) => warn!(error = %err, "anomaly alert dispatch failed"),
                }
            }
            DetectionStatus::Error => {
                let message = report
                    .message
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string());
                error!(message = %message, "anomaly detection error");
                let alert = format!("Anomaly detection failed: {message}");
                if self.dispatch(&alert, Severity::High, None).await {
                    result.alerts_sent.push(AlertKind::Error);
                }
            }
            DetectionStatus::Normal | DetectionStatus::NoData => {
                info!("no anomalies detected");
            }
        }
        result.anomaly_detection = Some(report);

        // 5. Retrain check
        if self.lifecycle.should_retrain(now) {
            info!("retrain interval elapsed, retraining model");
            self.retrain().await;
        }

        Ok(())
    }

    async fn check_health(&self) -> HealthCheckResult {
        match self.provider.fetch_health().await {
            Ok(health) => health,
            Err(err) => {
                self.metrics.inc_provider_errors();
                warn!(error = %err, "health check failed");
                HealthCheckResult::unhealthy(err.to_string())
            }
        }
    }

    /// Retrain from freshly fetched history. Failures are logged and the
    /// current model keeps serving; the next elapsed interval tries again.
    async fn retrain(&mut self) {
        let now = Utc::now();
        let history = match self.provider.fetch_metrics().await {
            Ok(samples) if !samples.is_empty() => samples,
            Ok(_) => {
                warn!("no history available for retraining, keeping current model");
                return;
            }
            Err(err) => {
                self.metrics.inc_provider_errors();
                warn!(error = %err, "history fetch for retraining failed, keeping current model");
                return;
            }
        };

        match self.lifecycle.retrain(&history, now) {
            Ok(()) => self.metrics.set_model_trained_at(now.timestamp()),
            Err(err) => warn!(error = %err, "model retraining failed, keeping current model"),
        }
    }

    async fn dispatch(
        &self,
        message: &str,
        severity: Severity,
        report: Option<&AnomalyReport>,
    ) -> bool {
        match self.sink.send(message, severity, report).await {
            Ok(true) => {
                self.metrics.inc_alerts_sent();
                true
            }
            Ok(false) => false,
            Err(err) => {
                warn!(error = %err, "alert dispatch failed");
                false
            }
        }
    }

    /// Run cycles until the shutdown signal fires. The signal is honored
    /// only between cycles, so alert and persist effects are never torn.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), MonitorError> {
        if let Err(err) = self.initialize().await {
            error!(error = %err, "failed to initialize monitoring system");
            let message = format!("Monitoring system failed to initialize: {err}");
            let _ = self.sink.send(&message, Severity::Critical, None).await;
            return Err(err);
        }

        info!(
            interval_secs = self.config.check_interval.as_secs(),
            "starting continuous monitoring"
        );
        let _ = self
            .sink
            .send("Monitoring system started", Severity::Low, None)
            .await;

        loop {
            let cycle_started = Instant::now();
            let result = self.run_cycle().await;
            info!(
                elapsed_ms = cycle_started.elapsed().as_millis(),
                alerts = result.alerts_sent.len(),
                "monitoring cycle complete"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.config.check_interval) => {}
                _ = shutdown.recv() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        let _ = self
            .sink
            .send("Monitoring system stopped", Severity::Medium, None)
            .await;
        Ok(())
    }

    /// Initialize and run exactly one cycle, returning its result. Used by
    /// one-shot invocations and cron-style schedulers.
    pub async fn run_single_check(&mut self) -> Result<CycleResult, MonitorError> {
        self.initialize().await?;
        Ok(self.run_cycle().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectorConfig;
    use crate::lifecycle::DEFAULT_RETRAIN_INTERVAL;
    use crate::models::MetricSample;
    use std::sync::Mutex;

    struct MockProvider {
        samples: Vec<MetricSample>,
        fail_metrics: bool,
        healthy: bool,
    }

    impl MockProvider {
        fn healthy_with(samples: Vec<MetricSample>) -> Self {
            Self {
                samples,
                fail_metrics: false,
                healthy: true,
            }
        }
    }

    #[async_trait::async_trait]
    impl MetricsProvider for MockProvider {
        async fn fetch_metrics(&self) -> Result<Vec<MetricSample>, MonitorError> {
            if self.fail_metrics {
                Err(MonitorError::Provider("connection refused".to_string()))
            } else {
                Ok(self.samples.clone())
            }
        }

        async fn fetch_health(&self) -> Result<HealthCheckResult, MonitorError> {
            if self.healthy {
                Ok(HealthCheckResult {
                    status: HealthStatus::Healthy,
                    details: serde_json::json!({"status": "healthy"}),
                    response_time: Some(0.01),
                })
            } else {
                Ok(HealthCheckResult {
                    status: HealthStatus::Unhealthy,
                    details: serde_json::json!({"error": "database unreachable"}),
                    response_time: Some(0.01),
                })
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, Severity)>>,
    }

    #[async_trait::async_trait]
    impl AlertSink for RecordingSink {
        async fn send(
            &self,
            message: &str,
            severity: Severity,
            _report: Option<&AnomalyReport>,
        ) -> Result<bool, MonitorError> {
            self.sent
                .lock()
                .unwrap()
                .push((message.to_string(), severity));
            Ok(true)
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        appended: Mutex<Vec<CycleResult>>,
    }

    #[async_trait::async_trait]
    impl ResultStore for RecordingStore {
        async fn append(&self, result: &CycleResult) -> Result<(), MonitorError> {
            self.appended.lock().unwrap().push(result.clone());
            Ok(())
        }
    }

    fn normal_sample(i: usize) -> MetricSample {
        MetricSample {
            cpu_usage: 48.0 + (i % 10) as f64,
            memory_usage: 58.0 + (i % 6) as f64,
            disk_usage: 70.0,
            error_rate: 2.0,
            request_count: 100.0 + i as f64,
            response_time: 0.5,
            ..Default::default()
        }
    }

    fn trained_lifecycle() -> ModelLifecycle {
        let mut lifecycle =
            ModelLifecycle::new(DetectorConfig::default(), DEFAULT_RETRAIN_INTERVAL);
        let batch: Vec<MetricSample> = (0..60).map(normal_sample).collect();
        lifecycle.retrain(&batch, Utc::now()).unwrap();
        lifecycle
    }

    fn orchestrator(
        provider: MockProvider,
        lifecycle: ModelLifecycle,
    ) -> (CycleOrchestrator, Arc<RecordingSink>, Arc<RecordingStore>) {
        let sink = Arc::new(RecordingSink::default());
        let store = Arc::new(RecordingStore::default());
        let orchestrator = CycleOrchestrator::new(
            Arc::new(provider),
            sink.clone(),
            store.clone(),
            lifecycle,
            CycleConfig::default(),
        );
        (orchestrator, sink, store)
    }

    #[tokio::test]
    async fn test_empty_fetch_skips_detection_and_still_persists() {
        let provider = MockProvider::healthy_with(Vec::new());
        let (mut orchestrator, sink, store) = orchestrator(provider, trained_lifecycle());

        let result = orchestrator.run_cycle().await;

        assert!(result.anomaly_detection.is_none());
        assert!(result.alerts_sent.is_empty());
        assert!(result.error.is_none());
        assert_eq!(
            result.health_check.as_ref().unwrap().status,
            HealthStatus::Healthy
        );
        assert!(sink.sent.lock().unwrap().is_empty());
        assert_eq!(store.appended.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unhealthy_app_dispatches_health_alert() {
        let provider = MockProvider {
            samples: Vec::new(),
            fail_metrics: false,
            healthy: false,
        };
        let (mut orchestrator, sink, _store) = orchestrator(provider, trained_lifecycle());

        let result = orchestrator.run_cycle().await;

        assert_eq!(result.alerts_sent, vec![AlertKind::Health]);
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.contains("database unreachable"));
        assert_eq!(sent[0].1, Severity::Critical);
    }

    #[tokio::test]
    async fn test_fetch_failure_records_error_without_alerting() {
        let provider = MockProvider {
            samples: Vec::new(),
            fail_metrics: true,
            healthy: true,
        };
        let (mut orchestrator, sink, store) = orchestrator(provider, trained_lifecycle());

        let result = orchestrator.run_cycle().await;

        let report = result.anomaly_detection.unwrap();
        assert_eq!(report.status, DetectionStatus::Error);
        assert!(report.message.unwrap().contains("metrics fetch failed"));
        assert!(result.alerts_sent.is_empty());
        assert!(sink.sent.lock().unwrap().is_empty());
        assert_eq!(store.appended.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_with_fallback_runs_detection() {
        let provider = MockProvider {
            samples: Vec::new(),
            fail_metrics: true,
            healthy: true,
        };
        let sink = Arc::new(RecordingSink::default());
        let store = Arc::new(RecordingStore::default());
        let mut lifecycle =
            ModelLifecycle::new(DetectorConfig::default(), DEFAULT_RETRAIN_INTERVAL);
        lifecycle
            .retrain(&synthetic::sample_batch(synthetic::DEFAULT_SEED), Utc::now())
            .unwrap();

        let mut orchestrator = CycleOrchestrator::new(
            Arc::new(provider),
            sink,
            store,
            lifecycle,
            CycleConfig {
                fallback_to_synthetic: true,
                ..Default::default()
            },
        );

        let result = orchestrator.run_cycle().await;
        let report = result.anomaly_detection.unwrap();
        assert_ne!(report.status, DetectionStatus::Error);
        assert_eq!(report.total_count, 110);
    }

    #[tokio::test]
    async fn test_untrained_model_yields_error_report_and_alert() {
        let batch: Vec<MetricSample> = (0..20).map(normal_sample).collect();
        let provider = MockProvider::healthy_with(batch);
        let untrained = ModelLifecycle::new(DetectorConfig::default(), DEFAULT_RETRAIN_INTERVAL);
        let (mut orchestrator, sink, _store) = orchestrator(provider, untrained);

        let result = orchestrator.run_cycle().await;

        let report = result.anomaly_detection.unwrap();
        assert_eq!(report.status, DetectionStatus::Error);
        assert!(result.alerts_sent.contains(&AlertKind::Error));
        let sent = sink.sent.lock().unwrap();
        assert!(sent
            .iter()
            .any(|(m, s)| m.contains("Anomaly detection failed") && *s == Severity::High));
    }

    #[tokio::test]
    async fn test_anomalous_batch_dispatches_anomaly_alert() {
        let mut batch: Vec<MetricSample> = (0..15).map(normal_sample).collect();
        batch.push(MetricSample {
            cpu_usage: 500.0,
            memory_usage: 500.0,
            disk_usage: 400.0,
            error_rate: 90.0,
            request_count: 5000.0,
            response_time: 30.0,
            ..Default::default()
        });
        let provider = MockProvider::healthy_with(batch);
        let (mut orchestrator, sink, _store) = orchestrator(provider, trained_lifecycle());

        let result = orchestrator.run_cycle().await;

        let report = result.anomaly_detection.unwrap();
        assert_eq!(report.status, DetectionStatus::Anomaly);
        assert!(report.anomaly_count >= 1);
        assert!(report.anomaly_count <= report.total_count);
        assert!(result.alerts_sent.contains(&AlertKind::Anomaly));
        assert!(!sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_falls_back_to_synthetic_history() {
        let provider = MockProvider {
            samples: Vec::new(),
            fail_metrics: true,
            healthy: true,
        };
        let untrained = ModelLifecycle::new(DetectorConfig::default(), DEFAULT_RETRAIN_INTERVAL);
        let (mut orchestrator, _sink, _store) = orchestrator(provider, untrained);

        orchestrator.initialize().await.unwrap();
        assert!(orchestrator.lifecycle.is_trained());
    }

    #[tokio::test]
    async fn test_single_check_returns_complete_result() {
        let batch: Vec<MetricSample> = (0..30).map(normal_sample).collect();
        let provider = MockProvider::healthy_with(batch);
        let untrained = ModelLifecycle::new(DetectorConfig::default(), DEFAULT_RETRAIN_INTERVAL);
        let (mut orchestrator, _sink, store) = orchestrator(provider, untrained);

        let result = orchestrator.run_single_check().await.unwrap();

        assert!(result.health_check.is_some());
        let report = result.anomaly_detection.unwrap();
        assert_ne!(report.status, DetectionStatus::Error);
        assert_eq!(store.appended.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_loop_stops_on_shutdown_signal() {
        let provider = MockProvider::healthy_with((0..30).map(normal_sample).collect());
        let sink = Arc::new(RecordingSink::default());
        let store = Arc::new(RecordingStore::default());
        let untrained = ModelLifecycle::new(DetectorConfig::default(), DEFAULT_RETRAIN_INTERVAL);
        let orchestrator = CycleOrchestrator::new(
            Arc::new(provider),
            sink.clone(),
            store.clone(),
            untrained,
            CycleConfig {
                check_interval: Duration::from_millis(5),
                ..Default::default()
            },
        );

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(orchestrator.run(shutdown_rx));

        // Let at least one cycle land, then cancel
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop did not stop")
            .unwrap()
            .unwrap();

        assert!(!store.appended.lock().unwrap().is_empty());
        let sent = sink.sent.lock().unwrap();
        assert!(sent.iter().any(|(m, s)| m.contains("started") && *s == Severity::Low));
        assert!(sent.iter().any(|(m, s)| m.contains("stopped") && *s == Severity::Medium));
    }

    #[tokio::test]
    async fn test_latest_result_is_published() {
        let provider = MockProvider::healthy_with(Vec::new());
        let (mut orchestrator, _sink, _store) = orchestrator(provider, trained_lifecycle());
        let latest = orchestrator.latest_result();

        assert!(latest.read().await.is_none());
        orchestrator.run_cycle().await;
        assert!(latest.read().await.is_some());
    }
}
