//! GPU Monitor - per-container GPU metrics exporter
//!
//! Runs as a DaemonSet on each Kubernetes node. Every Prometheus scrape joins
//! the kubelet's device assignments with live NVML telemetry.

use anyhow::{Context, Result};
use clap::Parser;
use gpu_monitor::{
    api,
    config::{CliArgs, ExporterConfig, LogFormat},
};
use monitor_lib::{
    health::{components, HealthRegistry},
    observability::{ExporterMetrics, StructuredLogger},
    GpuCollectorBuilder, KubeletInventory, MetricSchema, NvmlTelemetry, TelemetrySource,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config = ExporterConfig::from_args(&args)?;

    init_tracing(config.log_format);
    info!(node_name = %config.node_name, "Starting gpu-monitor");

    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(VERSION, &config.socket, config.port);

    let telemetry = Arc::new(NvmlTelemetry::new());
    logger.log_telemetry_backend(telemetry.is_available(), telemetry.device_count());

    let inventory = KubeletInventory::connect_lazy(&config.socket, config.inventory_timeout())
        .with_context(|| format!("Failed to create kubelet client for {}", config.socket))?;

    let collector = GpuCollectorBuilder::new()
        .inventory(Arc::new(inventory))
        .telemetry(telemetry.clone())
        .resource_name(config.resource_name.clone())
        .inventory_timeout(config.inventory_timeout())
        .telemetry_timeout(config.telemetry_timeout())
        .build()?;

    let health_registry = HealthRegistry::new();
    health_registry.register(components::INVENTORY).await;
    health_registry.register(components::TELEMETRY).await;
    health_registry
        .set_telemetry_available(telemetry.is_available())
        .await;

    let app_state = Arc::new(api::AppState::new(
        Arc::new(collector),
        MetricSchema::new(&config.metric_prefix),
        health_registry.clone(),
        ExporterMetrics::new(),
        logger.clone(),
    ));

    health_registry.set_ready(true).await;

    let server = tokio::spawn(api::serve(
        config.port,
        config.metrics_path.clone(),
        app_state,
    ));

    let outcome = tokio::select! {
        result = server => match result {
            Ok(Ok(())) => {
                logger.log_shutdown("API server exited");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "API server failed");
                Err(e)
            }
            Err(e) => Err(e).context("API server task failed"),
        },
        signal = tokio::signal::ctrl_c() => {
            logger.log_shutdown("SIGINT received");
            signal.context("Failed to listen for SIGINT")
        }
    };

    telemetry.stop();
    health_registry.set_telemetry_stopped().await;
    info!("Shutting down");

    outcome
}
