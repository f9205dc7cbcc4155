//! memprof - process memory profiler
//!
//! Samples one process through `/proc`, classifies its memory growth and
//! exposes health, metrics and leak history over HTTP.

use anyhow::Result;
use memprof_agent::{api, config::AgentConfig};
use memprof_lib::{
    FanoutSink, HealthRegistry, LoggingSink, MemoryProfiler, ProcfsSampleSource,
    ProfilerMetrics, StructuredLogger,
};
use prometheus::Registry;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = AGENT_VERSION, "Starting memprof");

    let config = AgentConfig::load()?;
    let pid = config.target_pid();
    let label = config.process_label();
    info!(
        pid = pid,
        process = %label,
        proc_root = %config.proc_root.display(),
        "Agent configured"
    );

    let registry = Registry::new();
    let metrics = ProfilerMetrics::register(&registry)?;
    let health_registry = HealthRegistry::new();
    let logger = StructuredLogger::new(label);

    let source = Arc::new(ProcfsSampleSource::with_proc_root(&config.proc_root, pid));
    let sink = Arc::new(FanoutSink::new().with(LoggingSink::new(logger.clone())));

    let profiler = Arc::new(
        MemoryProfiler::new(config.profiler.clone(), source, sink)?
            .with_metrics(metrics)
            .with_health(health_registry.clone())
            .with_logger(logger),
    );
    profiler.start().await;

    let app_state = Arc::new(api::AppState::new(
        profiler.clone(),
        health_registry,
        registry,
    ));
    let mut api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("SIGINT received, shutting down");
        }
        served = &mut api_handle => {
            match served {
                Ok(Ok(())) => info!("API server exited"),
                Ok(Err(e)) => error!(error = %format!("{:#}", e), "API server failed"),
                Err(e) => error!(error = %e, "API server task aborted"),
            }
        }
    }

    profiler.stop().await;
    api_handle.abort();

    Ok(())
}
