//! Integration tests for the agent API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use memprof_agent::api::{create_router, AppState};
use memprof_lib::{
    health::{components, HealthRegistry},
    source::{async_trait, SampleSource},
    FanoutSink, MemoryProfiler, MemorySample, ProfilerConfig, ProfilerMetrics, MB,
};
use prometheus::Registry;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Replays a fixed list of samples, optionally supporting reclaim
struct ReplaySource {
    samples: Mutex<VecDeque<MemorySample>>,
    reclaim: bool,
}

impl ReplaySource {
    fn new(samples: Vec<MemorySample>, reclaim: bool) -> Self {
        Self {
            samples: Mutex::new(samples.into()),
            reclaim,
        }
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    async fn collect(&self) -> anyhow::Result<MemorySample> {
        self.samples
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no more samples"))
    }

    fn supports_reclaim(&self) -> bool {
        self.reclaim
    }

    async fn reclaim(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

fn linear_growth(count: i64) -> Vec<MemorySample> {
    (0..count)
        .map(|i| {
            let heap = 10 * MB + i as u64 * MB;
            MemorySample::new(i * 1000, heap, heap * 2, heap + 5 * MB, 0)
        })
        .collect()
}

async fn setup_test_app(source: ReplaySource) -> (Router, Arc<AppState>) {
    let registry = Registry::new();
    let metrics = ProfilerMetrics::register(&registry).unwrap();
    let health_registry = HealthRegistry::new();
    for name in components::ALL {
        health_registry.register(name).await;
    }

    let profiler = MemoryProfiler::new(
        ProfilerConfig::default(),
        Arc::new(source),
        Arc::new(FanoutSink::new()),
    )
    .unwrap()
    .with_metrics(metrics)
    .with_health(health_registry.clone());

    let state = Arc::new(AppState::new(Arc::new(profiler), health_registry, registry));
    let router = create_router(state.clone());

    (router, state)
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };

    (status, json)
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app(ReplaySource::new(vec![], false)).await;

    let (status, health) = send(app, "GET", "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert!(health["components"][components::SAMPLER].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app(ReplaySource::new(vec![], false)).await;

    // A failed read degrades the sampler without making it unhealthy
    assert!(state.profiler.sample_once().await.is_none());

    let (status, health) = send(app, "GET", "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["sampler"]["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app(ReplaySource::new(vec![], false)).await;

    state
        .health_registry
        .set_unhealthy(components::SAMPLER, "proc filesystem missing")
        .await;

    let (status, health) = send(app, "GET", "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_profiler_lifecycle() {
    let (app, state) = setup_test_app(ReplaySource::new(vec![], false)).await;

    let (status, readiness) = send(app.clone(), "GET", "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);

    state.profiler.start().await;
    let (status, readiness) = send(app.clone(), "GET", "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);

    state.profiler.stop().await;
    let (status, _) = send(app, "GET", "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_serves_profiler_registry() {
    let (app, state) = setup_test_app(ReplaySource::new(linear_growth(1), false)).await;
    state.profiler.sample_once().await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("memprof_samples_collected_total 1"));
}

#[tokio::test]
async fn test_stats_not_found_before_first_sample() {
    let (app, _state) = setup_test_app(ReplaySource::new(vec![], false)).await;

    let (status, body) = send(app, "GET", "/stats").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_stats_and_samples_after_sampling() {
    let (app, state) = setup_test_app(ReplaySource::new(linear_growth(3), false)).await;
    for _ in 0..3 {
        state.profiler.sample_once().await.unwrap();
    }

    let (status, stats) = send(app.clone(), "GET", "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["timestamp"], 2000);
    assert_eq!(stats["heapUsedMb"], 12.0);

    let (status, samples) = send(app, "GET", "/samples").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(samples.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_analyze_then_leaks() {
    let (app, state) = setup_test_app(ReplaySource::new(linear_growth(20), false)).await;
    for _ in 0..20 {
        state.profiler.sample_once().await.unwrap();
    }

    let (status, analysis) = send(app.clone(), "POST", "/analyze").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analysis["samplesAnalyzed"], 20);
    assert_eq!(analysis["event"]["type"], "consistent_growth");
    assert_eq!(analysis["event"]["totalGrowthMB"], 19);
    assert!(analysis["detectors"]["periodicSpike"].is_object());

    let (status, leaks) = send(app, "GET", "/leaks").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(leaks.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_analyze_requires_post() {
    let (app, _state) = setup_test_app(ReplaySource::new(vec![], false)).await;

    let (status, _) = send(app, "GET", "/analyze").await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_growth_reports_insufficient_data() {
    let (app, _state) = setup_test_app(ReplaySource::new(vec![], false)).await;

    let (status, growth) = send(app, "GET", "/growth").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(growth["status"], "insufficient_data");
}

#[tokio::test]
async fn test_gc_unavailable_without_reclaim() {
    let (app, _state) = setup_test_app(ReplaySource::new(vec![], false)).await;

    let (status, outcome) = send(app, "POST", "/gc").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "unavailable");
}

#[tokio::test]
async fn test_gc_reports_bytes_freed() {
    let before = MemorySample::new(0, 40 * MB, 80 * MB, 60 * MB, 0);
    let after = MemorySample::new(100, 25 * MB, 80 * MB, 50 * MB, 0);
    let (app, _state) = setup_test_app(ReplaySource::new(vec![before, after], true)).await;

    let (status, outcome) = send(app, "POST", "/gc").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "completed");
    assert_eq!(outcome["bytesFreed"], 15 * MB);
}

#[tokio::test]
async fn test_gc_failure_is_server_error() {
    // Only the "before" sample is available
    let before = MemorySample::new(0, 40 * MB, 80 * MB, 60 * MB, 0);
    let (app, _state) = setup_test_app(ReplaySource::new(vec![before], true)).await;

    let (status, body) = send(app, "POST", "/gc").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("after reclaim"));
}
