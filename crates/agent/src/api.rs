//! HTTP API for health checks, Prometheus metrics and profiler introspection

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use memprof_lib::{
    health::{ComponentStatus, HealthRegistry},
    MemoryProfiler,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub profiler: Arc<MemoryProfiler>,
    pub health_registry: HealthRegistry,
    pub registry: Registry,
}

impl AppState {
    pub fn new(
        profiler: Arc<MemoryProfiler>,
        health_registry: HealthRegistry,
        registry: Registry,
    ) -> Self {
        Self {
            profiler,
            health_registry,
            registry,
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// 200 while operational (degraded included), 503 when unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    (
        StatusCode::OK,
        [("content-type", encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// Latest sample in MB; 404 until the first sample lands
async fn stats(State(state): State<Arc<AppState>>) -> Response {
    match state.profiler.get_current_stats().await {
        Some(stats) => Json(stats).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "no samples collected yet"),
    }
}

async fn samples(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.profiler.get_samples().await)
}

async fn leaks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.profiler.get_leak_history().await)
}

async fn growth(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.profiler.recent_growth().await)
}

async fn analyze(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.profiler.force_analysis().await)
}

async fn gc(State(state): State<Arc<AppState>>) -> Response {
    match state.profiler.force_collection().await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            warn!(error = %format!("{:#}", e), "Forced collection failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/stats", get(stats))
        .route("/samples", get(samples))
        .route("/leaks", get(leaks))
        .route("/growth", get(growth))
        .route("/analyze", post(analyze))
        .route("/gc", post(gc))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
