//! HTTP API for Prometheus scrapes and health checks

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use monitor_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::{ExporterMetrics, StructuredLogger},
    GpuCollector, MetricSchema,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<GpuCollector>,
    pub schema: MetricSchema,
    pub health_registry: HealthRegistry,
    pub metrics: ExporterMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        collector: Arc<GpuCollector>,
        schema: MetricSchema,
        health_registry: HealthRegistry,
        metrics: ExporterMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            collector,
            schema,
            health_registry,
            metrics,
            logger,
        }
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still serving metrics
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint; every request runs one scrape
///
/// Scrape failures never fail the response: whatever could be collected is
/// served alongside the exporter's own metrics.
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let start = Instant::now();
    let report = state.collector.collect().await;
    let elapsed = start.elapsed();

    state.metrics.record_scrape(&report, elapsed);
    state.health_registry.record_scrape(&report).await;
    state.logger.log_scrape(&report, elapsed);

    let mut families = state.schema.families(&report.samples).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to build GPU metric families");
        Vec::new()
    });
    families.extend(prometheus::gather());

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>, metrics_path: &str) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(metrics_path, get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, metrics_path: String, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state, &metrics_path);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, metrics_path = %metrics_path, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
