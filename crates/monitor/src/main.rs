//! Metric Monitor - anomaly-detecting monitoring agent
//!
//! Watches an application's metrics endpoint, maintains an unsupervised
//! model of normal behavior, and dispatches alerts when samples deviate.
//! Runs either continuously or as a one-shot check.

use anyhow::Result;
use clap::Parser;
use monitor_lib::{
    CycleConfig, CycleOrchestrator, DetectorConfig, HttpMetricsProvider, JsonlResultStore,
    ModelLifecycle, SlackSink,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

#[derive(Parser, Debug)]
#[command(name = "metric-monitor", about = "Anomaly-detecting metrics monitoring agent")]
struct Args {
    /// URL of the application to monitor
    #[arg(long)]
    app_url: Option<String>,

    /// Slack webhook URL for alerts
    #[arg(long)]
    slack_webhook: Option<String>,

    /// Monitoring interval in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// Run a single check instead of continuous monitoring
    #[arg(long)]
    single_check: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().json())
        .init();

    // Environment configuration, with CLI flags taking precedence
    let mut config = config::MonitorConfig::load()?;
    if let Some(url) = args.app_url {
        config.app_url = url;
    }
    if let Some(webhook) = args.slack_webhook {
        config.slack_webhook = Some(webhook);
    }
    if let Some(interval) = args.interval {
        config.check_interval_secs = interval;
    }

    info!(app_url = %config.app_url, "starting metric-monitor");

    let provider = Arc::new(HttpMetricsProvider::new(config.app_url.clone())?);
    let sink = Arc::new(SlackSink::new(config.slack_webhook.clone())?);
    let store = Arc::new(JsonlResultStore::new(config.results_path.clone()));
    let lifecycle = ModelLifecycle::new(
        DetectorConfig {
            contamination: config.contamination,
            ..Default::default()
        },
        Duration::from_secs(config.retrain_interval_secs),
    );
    let cycle_config = CycleConfig {
        check_interval: Duration::from_secs(config.check_interval_secs),
        fallback_to_synthetic: config.fallback_to_synthetic,
        ..Default::default()
    };

    let mut orchestrator = CycleOrchestrator::new(provider, sink, store, lifecycle, cycle_config);

    if args.single_check {
        info!("running single monitoring check");
        let result = orchestrator.run_single_check().await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    // Status and metrics endpoint for observers
    let state = Arc::new(api::AppState::new(orchestrator.latest_result()));
    tokio::spawn(api::serve(config.api_port, state));

    // Ctrl-C stops the loop at the next inter-cycle boundary
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("SIGINT received, stopping after current cycle");
            let _ = shutdown_tx.send(());
        }
    });

    orchestrator.run(shutdown_rx).await?;
    info!("metric-monitor stopped");

    Ok(())
}
