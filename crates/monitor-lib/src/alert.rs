//! Alert dispatch
//!
//! The orchestrator pushes alerts through the [`AlertSink`] seam. Delivery
//! failure is reported as `Ok(false)` and logged, never escalated: a broken
//! webhook must not take the monitoring loop down with it.

use crate::error::MonitorError;
use crate::models::{AnomalyReport, DetectionStatus, MetricSample, Severity};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Dispatch one alert. The returned flag records whether the alert was
    /// actually delivered (or intentionally log-only).
    async fn send(
        &self,
        message: &str,
        severity: Severity,
        report: Option<&AnomalyReport>,
    ) -> Result<bool, MonitorError>;

    /// One health alert for an unhealthy probe result.
    async fn send_health_alert(&self, detail: &str) -> Result<bool, MonitorError> {
        let message = format!("Application health alert: UNHEALTHY\nDetails: {detail}");
        self.send(&message, Severity::Critical, None).await
    }

    /// One anomaly alert carrying the report as structured payload. Only
    /// anomaly-status reports dispatch; anything else is a no-op.
    async fn send_anomaly_alert(&self, report: &AnomalyReport) -> Result<bool, MonitorError> {
        if report.status != DetectionStatus::Anomaly {
            return Ok(false);
        }
        let message = format!(
            "Detected {} anomalies ({}% of data points)",
            report.anomaly_count, report.anomaly_percentage
        );
        self.send(&message, report.severity, Some(report)).await
    }
}

/// Slack incoming-webhook sink. Without a configured webhook every alert is
/// logged locally and treated as delivered.
pub struct SlackSink {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl SlackSink {
    pub fn new(webhook_url: Option<String>) -> Result<Self, MonitorError> {
        if webhook_url.is_none() {
            warn!("no webhook URL configured, alerts will be logged only");
        }
        let client = reqwest::Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

#[async_trait]
impl AlertSink for SlackSink {
    async fn send(
        &self,
        message: &str,
        severity: Severity,
        report: Option<&AnomalyReport>,
    ) -> Result<bool, MonitorError> {
        info!(severity = %severity, message = %message, "alert");

        let Some(url) = &self.webhook_url else {
            return Ok(true);
        };

        let payload = build_payload(message, severity, report);
        match self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status())
        {
            Ok(_) => Ok(true),
            Err(err) => {
                warn!(error = %err, "failed to deliver alert");
                Ok(false)
            }
        }
    }
}

/// Build the webhook payload: one color-coded attachment, with report
/// fields attached when a structured payload is supplied.
pub fn build_payload(
    message: &str,
    severity: Severity,
    report: Option<&AnomalyReport>,
) -> serde_json::Value {
    let color = match severity {
        Severity::Low => "#36a64f",
        Severity::Medium => "#ff9500",
        Severity::High => "#ff6b35",
        Severity::Critical => "#ff0000",
    };

    let mut attachment = json!({
        "color": color,
        "title": format!("Metric Monitor Alert - {}", severity.to_string().to_uppercase()),
        "text": message,
        "ts": Utc::now().timestamp(),
        "footer": "Metric Monitor",
    });

    if let Some(report) = report {
        let mut fields = vec![
            json!({
                "title": "Anomalies Detected",
                "value": format!(
                    "{} out of {} data points",
                    report.anomaly_count, report.total_count
                ),
                "short": true,
            }),
            json!({
                "title": "Anomaly Rate",
                "value": format!("{}%", report.anomaly_percentage),
                "short": true,
            }),
        ];

        if !report.recommendations.is_empty() {
            let text = report
                .recommendations
                .iter()
                .map(|r| format!("- {r}"))
                .collect::<Vec<_>>()
                .join("\n");
            fields.push(json!({ "title": "Recommendations", "value": text, "short": false }));
        }

        if let Some(first) = report.anomalous_samples.first() {
            fields.push(json!({
                "title": "Anomalous Metrics",
                "value": format_sample(first),
                "short": true,
            }));
        }

        attachment["fields"] = json!(fields);
    }

    json!({
        "username": "Metric Monitor",
        "attachments": [attachment],
    })
}

fn format_sample(sample: &MetricSample) -> String {
    format!(
        "- CPU Usage: {:.2}\n- Memory Usage: {:.2}\n- Disk Usage: {:.2}\n- Error Rate: {:.2}\n- Request Count: {:.2}\n- Response Time: {:.2}",
        sample.cpu_usage,
        sample.memory_usage,
        sample.disk_usage,
        sample.error_rate,
        sample.request_count,
        sample.response_time,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anomaly_report() -> AnomalyReport {
        AnomalyReport {
            status: DetectionStatus::Anomaly,
            message: None,
            timestamp: Utc::now(),
            total_count: 20,
            anomaly_count: 3,
            anomaly_percentage: 15.0,
            severity: Severity::High,
            anomalous_samples: vec![MetricSample {
                cpu_usage: 95.2,
                memory_usage: 88.5,
                ..Default::default()
            }],
            recommendations: vec!["High CPU usage detected.".to_string()],
        }
    }

    #[test]
    fn test_payload_color_follows_severity() {
        for (severity, color) in [
            (Severity::Low, "#36a64f"),
            (Severity::Medium, "#ff9500"),
            (Severity::High, "#ff6b35"),
            (Severity::Critical, "#ff0000"),
        ] {
            let payload = build_payload("test", severity, None);
            assert_eq!(payload["attachments"][0]["color"], color);
        }
    }

    #[test]
    fn test_payload_includes_report_fields() {
        let report = anomaly_report();
        let payload = build_payload("anomalies", Severity::High, Some(&report));

        let fields = payload["attachments"][0]["fields"].as_array().unwrap();
        assert_eq!(fields[0]["value"], "3 out of 20 data points");
        assert_eq!(fields[1]["value"], "15%");
        assert!(fields[2]["value"].as_str().unwrap().contains("High CPU"));
        assert!(fields[3]["value"].as_str().unwrap().contains("95.20"));
    }

    #[test]
    fn test_payload_without_report_has_no_fields() {
        let payload = build_payload("plain", Severity::Low, None);
        assert!(payload["attachments"][0].get("fields").is_none());
    }

    #[tokio::test]
    async fn test_log_only_sink_reports_delivered() {
        let sink = SlackSink::new(None).unwrap();
        let delivered = sink.send("test", Severity::Low, None).await.unwrap();
        assert!(delivered);
    }

    #[tokio::test]
    async fn test_anomaly_alert_skips_non_anomaly_reports() {
        let sink = SlackSink::new(None).unwrap();

        let mut report = anomaly_report();
        report.status = DetectionStatus::Normal;
        assert!(!sink.send_anomaly_alert(&report).await.unwrap());

        report.status = DetectionStatus::Anomaly;
        assert!(sink.send_anomaly_alert(&report).await.unwrap());
    }
}
