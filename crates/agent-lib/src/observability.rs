//! Observability infrastructure for the memory profiler
//!
//! Provides:
//! - Prometheus metrics (sampling, analysis latency, leak events, alerts)
//! - Structured logging with tracing
//!
//! Metrics register into a caller-supplied registry so that several profilers
//! in one process keep separate counters.

use crate::anomaly::{AlertEvent, AlertType, LeakEvent, LeakSeverity};
use crate::models::MemorySample;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use tracing::{info, warn};

/// Default histogram buckets for analysis latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5,
];

/// Prometheus metrics for one profiler instance
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct ProfilerMetrics {
    samples_collected: IntCounter,
    sample_errors: IntCounter,
    heap_used_bytes: IntGauge,
    rss_bytes: IntGauge,
    analysis_latency_seconds: Histogram,
    leak_events: IntCounterVec,
    alerts: IntCounterVec,
    sink_errors: IntCounter,
}

impl ProfilerMetrics {
    /// Create metrics that are not exposed through any registry
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            samples_collected: IntCounter::new(
                "memprof_samples_collected_total",
                "Total number of memory samples collected",
            )?,
            sample_errors: IntCounter::new(
                "memprof_sample_errors_total",
                "Total number of failed sampling ticks",
            )?,
            heap_used_bytes: IntGauge::new(
                "memprof_heap_used_bytes",
                "Heap bytes in use at the latest sample",
            )?,
            rss_bytes: IntGauge::new(
                "memprof_rss_bytes",
                "Resident set size at the latest sample",
            )?,
            analysis_latency_seconds: Histogram::with_opts(
                HistogramOpts::new(
                    "memprof_analysis_latency_seconds",
                    "Time spent classifying the leak window",
                )
                .buckets(LATENCY_BUCKETS.to_vec()),
            )?,
            leak_events: IntCounterVec::new(
                Opts::new("memprof_leak_events_total", "Total number of leak events"),
                &["type"],
            )?,
            alerts: IntCounterVec::new(
                Opts::new("memprof_alerts_total", "Total number of memory alerts"),
                &["alert_type"],
            )?,
            sink_errors: IntCounter::new(
                "memprof_sink_errors_total",
                "Total number of failed event deliveries",
            )?,
        })
    }

    /// Create metrics and register them into `registry`
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let metrics = Self::new()?;
        registry.register(Box::new(metrics.samples_collected.clone()))?;
        registry.register(Box::new(metrics.sample_errors.clone()))?;
        registry.register(Box::new(metrics.heap_used_bytes.clone()))?;
        registry.register(Box::new(metrics.rss_bytes.clone()))?;
        registry.register(Box::new(metrics.analysis_latency_seconds.clone()))?;
        registry.register(Box::new(metrics.leak_events.clone()))?;
        registry.register(Box::new(metrics.alerts.clone()))?;
        registry.register(Box::new(metrics.sink_errors.clone()))?;
        Ok(metrics)
    }

    /// Record a successful sample
    pub fn observe_sample(&self, sample: &MemorySample) {
        self.samples_collected.inc();
        self.heap_used_bytes
            .set(i64::try_from(sample.heap_used).unwrap_or(i64::MAX));
        self.rss_bytes.set(i64::try_from(sample.rss).unwrap_or(i64::MAX));
    }

    pub fn inc_sample_errors(&self) {
        self.sample_errors.inc();
    }

    pub fn observe_analysis_latency(&self, duration_secs: f64) {
        self.analysis_latency_seconds.observe(duration_secs);
    }

    pub fn inc_leak_events(&self, event: &LeakEvent) {
        self.leak_events
            .with_label_values(&[event.leak_type.as_str()])
            .inc();
    }

    pub fn inc_alerts(&self, alert_type: AlertType) {
        self.alerts
            .with_label_values(&[&alert_type.to_string()])
            .inc();
    }

    pub fn inc_sink_errors(&self) {
        self.sink_errors.inc();
    }

    pub fn samples_collected(&self) -> u64 {
        self.samples_collected.get()
    }

    pub fn sample_errors(&self) -> u64 {
        self.sample_errors.get()
    }

    pub fn sink_errors(&self) -> u64 {
        self.sink_errors.get()
    }
}

/// Structured logger for profiler events
///
/// Provides consistent logging for leak events, alerts, and lifecycle
/// transitions.
#[derive(Clone)]
pub struct StructuredLogger {
    process: String,
}

impl StructuredLogger {
    pub fn new(process: impl Into<String>) -> Self {
        Self {
            process: process.into(),
        }
    }

    pub fn process(&self) -> &str {
        &self.process
    }

    /// Log a leak classification
    pub fn log_leak(&self, event: &LeakEvent) {
        if event.severity >= LeakSeverity::High {
            warn!(
                event = "leak_detected",
                process = %self.process,
                leak_id = event.id,
                leak_type = %event.leak_type,
                severity = %event.severity,
                growth_rate_kbps = event.growth_rate_kbps,
                total_growth_mb = event.total_growth_mb,
                duration_sec = event.duration_sec,
                confidence = event.confidence_percent,
                "Memory leak detected"
            );
        } else {
            info!(
                event = "leak_detected",
                process = %self.process,
                leak_id = event.id,
                leak_type = %event.leak_type,
                severity = %event.severity,
                growth_rate_kbps = event.growth_rate_kbps,
                total_growth_mb = event.total_growth_mb,
                duration_sec = event.duration_sec,
                confidence = event.confidence_percent,
                "Possible memory leak detected"
            );
        }
    }

    /// Log a threshold alert
    pub fn log_alert(&self, alert: &AlertEvent) {
        warn!(
            event = "memory_alert",
            process = %self.process,
            alert_type = %alert.alert_type,
            heap_used_mb = alert.stats.heap_used_mb,
            rss_mb = alert.stats.rss_mb,
            growth_rate_bytes_per_sec = ?alert.growth_rate_bytes_per_sec,
            "Memory alert raised"
        );
    }

    /// Log a skipped sampling tick
    pub fn log_sample_failure(&self, error: &anyhow::Error) {
        warn!(
            event = "sample_failed",
            process = %self.process,
            error = %format!("{:#}", error),
            "Failed to collect memory sample, skipping tick"
        );
    }

    /// Log a sink that rejected an event
    pub fn log_sink_failure(&self, event_kind: &str, error: &str) {
        warn!(
            event = "sink_failed",
            process = %self.process,
            event_kind = %event_kind,
            error = %error,
            "Event sink failed, continuing"
        );
    }

    /// Log profiler startup
    pub fn log_startup(&self, sampling_interval_ms: u64, analysis_interval_ms: u64) {
        info!(
            event = "profiler_started",
            process = %self.process,
            sampling_interval_ms = sampling_interval_ms,
            analysis_interval_ms = analysis_interval_ms,
            "Memory profiler started"
        );
    }

    /// Log profiler shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "profiler_stopped",
            process = %self.process,
            reason = %reason,
            "Memory profiler stopped"
        );
    }
}
