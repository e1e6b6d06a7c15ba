//! Monitor configuration

use anyhow::Result;
use serde::Deserialize;

/// Monitor configuration, loaded from MONITOR_-prefixed environment
/// variables. CLI flags override individual fields after loading.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Base URL of the application to monitor
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// Slack webhook URL for alerts; alerts are logged only when unset
    #[serde(default)]
    pub slack_webhook: Option<String>,

    /// Monitoring interval in seconds
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Minimum time between model retrainings in seconds
    #[serde(default = "default_retrain_interval")]
    pub retrain_interval_secs: u64,

    /// Expected outlier fraction used when training the model
    #[serde(default = "default_contamination")]
    pub contamination: f64,

    /// Path of the append-only cycle result log
    #[serde(default = "default_results_path")]
    pub results_path: String,

    /// Port for the status/metrics HTTP endpoint
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Substitute synthetic samples when a metrics fetch fails
    #[serde(default)]
    pub fallback_to_synthetic: bool,
}

fn default_app_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_check_interval() -> u64 {
    300
}

fn default_retrain_interval() -> u64 {
    24 * 60 * 60
}

fn default_contamination() -> f64 {
    0.1
}

fn default_results_path() -> String {
    "monitoring_results.jsonl".to_string()
}

fn default_api_port() -> u16 {
    8080
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            app_url: default_app_url(),
            slack_webhook: None,
            check_interval_secs: default_check_interval(),
            retrain_interval_secs: default_retrain_interval(),
            contamination: default_contamination(),
            results_path: default_results_path(),
            api_port: default_api_port(),
            fallback_to_synthetic: false,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("MONITOR"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.app_url, "http://localhost:5000");
        assert_eq!(config.check_interval_secs, 300);
        assert_eq!(config.retrain_interval_secs, 86400);
        assert_eq!(config.contamination, 0.1);
        assert_eq!(config.api_port, 8080);
        assert!(config.slack_webhook.is_none());
        assert!(!config.fallback_to_synthetic);
    }
}
