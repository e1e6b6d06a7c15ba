//! Core library for the metric monitoring agent
//!
//! This crate provides:
//! - Anomaly detection over operational metric samples
//! - Model lifecycle management with scheduled retraining
//! - The monitoring cycle orchestrator and continuous loop
//! - Provider, alert-sink, and result-store collaborator seams
//! - Prometheus observability

pub mod alert;
pub mod cycle;
pub mod detector;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod provider;
pub mod store;
pub mod synthetic;

pub use alert::{AlertSink, SlackSink};
pub use cycle::{CycleConfig, CycleOrchestrator};
pub use detector::{AnomalyDetector, DetectorConfig, TrainedModel};
pub use error::MonitorError;
pub use lifecycle::{ModelLifecycle, DEFAULT_RETRAIN_INTERVAL};
pub use models::*;
pub use observability::MonitorMetrics;
pub use provider::{HttpMetricsProvider, MetricsProvider};
pub use store::{JsonlResultStore, ResultStore};
