//! Memory profiler
//!
//! Owns the two sample windows, the alert hysteresis state and the leak
//! history for one sampled process. Sampling and analysis can be driven by
//! the built-in scheduler (`start`/`stop`) or called directly.

mod scheduler;


use crate::anomaly::{
    AlertPolicy, AlertState, GrowthRateCheck, LeakAnalysis, LeakClassifier, LeakEvent,
    RecentGrowthReport,
};
use crate::config::{ConfigError, ProfilerConfig};
use crate::health::{components, HealthRegistry};
use crate::models::{MemorySample, MemoryStats};
use crate::observability::{ProfilerMetrics, StructuredLogger};
use crate::sink::EventSink;
use crate::source::SampleSource;
use crate::window::RollingWindow;
use anyhow::{Context, Result};
use scheduler::SchedulerHandle;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::debug;

/// Result of a forced reclaim pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CollectionOutcome {
    /// The sample source cannot ask its runtime to reclaim memory
    Unavailable,
    #[serde(rename_all = "camelCase")]
    Completed {
        before: MemorySample,
        after: MemorySample,
        /// `before.heap_used - after.heap_used`; negative if the heap grew
        bytes_freed: i64,
    },
}

impl CollectionOutcome {
    pub fn bytes_freed(&self) -> i64 {
        match self {
            CollectionOutcome::Unavailable => 0,
            CollectionOutcome::Completed { bytes_freed, .. } => *bytes_freed,
        }
    }
}

/// Mutable state shared by sampling and analysis
#[derive(Debug)]
struct ProfilerState {
    monitor_window: RollingWindow,
    leak_window: RollingWindow,
    alert_state: AlertState,
    leak_history: Vec<LeakEvent>,
}

/// Samples one process and classifies its memory growth
pub struct MemoryProfiler {
    config: ProfilerConfig,
    source: Arc<dyn SampleSource>,
    sink: Arc<dyn EventSink>,
    classifier: LeakClassifier,
    alert_policy: AlertPolicy,
    growth_check: GrowthRateCheck,
    state: Mutex<ProfilerState>,
    /// Held for a whole analysis cycle so two cycles never overlap
    analysis_lock: Mutex<()>,
    scheduler: Mutex<Option<SchedulerHandle>>,
    metrics: Option<ProfilerMetrics>,
    health: Option<HealthRegistry>,
    logger: StructuredLogger,
}

impl MemoryProfiler {
    /// Create a stopped profiler; invalid configuration is rejected here
    pub fn new(
        config: ProfilerConfig,
        source: Arc<dyn SampleSource>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let state = ProfilerState {
            monitor_window: RollingWindow::new(config.sample_window_capacity)?,
            leak_window: RollingWindow::new(config.leak_window_capacity)?,
            alert_state: AlertState::default(),
            leak_history: Vec::new(),
        };

        Ok(Self {
            classifier: LeakClassifier::new(config.leak_threshold_bytes),
            alert_policy: AlertPolicy::from_config(&config),
            growth_check: GrowthRateCheck::default(),
            config,
            source,
            sink,
            state: Mutex::new(state),
            analysis_lock: Mutex::new(()),
            scheduler: Mutex::new(None),
            metrics: None,
            health: None,
            logger: StructuredLogger::new("memprof"),
        })
    }

    pub fn with_metrics(mut self, metrics: ProfilerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Run one sampling tick
    ///
    /// Collects a sample, pushes it into both windows and evaluates the
    /// alert policy. Returns `None` when the tick was skipped because the
    /// source failed or the sample is older than the newest one held.
    pub async fn sample_once(&self) -> Option<MemorySample> {
        let sample = match self.source.collect().await {
            Ok(sample) => sample,
            Err(e) => {
                self.logger.log_sample_failure(&e);
                if let Some(metrics) = &self.metrics {
                    metrics.inc_sample_errors();
                }
                if let Some(health) = &self.health {
                    health
                        .set_degraded(components::SAMPLER, format!("{:#}", e))
                        .await;
                }
                return None;
            }
        };

        if sample.is_inconsistent() {
            debug!(
                heap_used = sample.heap_used,
                heap_total = sample.heap_total,
                "Sample reports more heap used than allocated"
            );
        }

        let alerts = {
            let mut state = self.state.lock().await;
            let previous = state.monitor_window.latest().copied();

            if previous.is_some_and(|p| sample.timestamp < p.timestamp) {
                debug!(timestamp = sample.timestamp, "Dropping stale sample");
                return None;
            }

            state.monitor_window.push(sample);
            state.leak_window.push(sample);
            self.alert_policy
                .evaluate(&sample, previous.as_ref(), &mut state.alert_state)
        };

        if let Some(metrics) = &self.metrics {
            metrics.observe_sample(&sample);
        }
        if let Some(health) = &self.health {
            health.set_healthy(components::SAMPLER).await;
        }

        for alert in &alerts {
            if let Some(metrics) = &self.metrics {
                metrics.inc_alerts(alert.alert_type);
            }
            self.deliver("alert", |sink| sink.on_alert(alert)).await;
        }

        Some(sample)
    }

    /// Run one leak-classification cycle on the current leak window
    ///
    /// Waits for any cycle already in progress. A detected event is
    /// appended to the history and delivered to the sink before returning.
    pub async fn force_analysis(&self) -> LeakAnalysis {
        let _cycle = self.analysis_lock.lock().await;

        let window = self.state.lock().await.leak_window.snapshot();

        let started = Instant::now();
        let analysis = self.classifier.analyze(&window);
        if let Some(metrics) = &self.metrics {
            metrics.observe_analysis_latency(started.elapsed().as_secs_f64());
        }

        debug!(
            samples = analysis.samples_analyzed,
            slope = analysis.trend.slope,
            r_squared = analysis.trend.r_squared,
            periodic_spike = analysis.detectors.periodic_spike.detected,
            "Leak analysis complete"
        );

        if let Some(event) = &analysis.event {
            self.state.lock().await.leak_history.push(event.clone());
            if let Some(metrics) = &self.metrics {
                metrics.inc_leak_events(event);
            }
            self.deliver("leak", |sink| sink.on_leak_detected(event)).await;
        }

        if let Some(health) = &self.health {
            health.set_healthy(components::ANALYZER).await;
        }

        analysis
    }

    /// Ask the source to reclaim memory and measure the heap delta
    ///
    /// Sources that cannot reclaim yield `Unavailable` rather than an
    /// error. The before and after samples are not added to the windows.
    pub async fn force_collection(&self) -> Result<CollectionOutcome> {
        if !self.source.supports_reclaim() {
            return Ok(CollectionOutcome::Unavailable);
        }

        let before = self
            .source
            .collect()
            .await
            .context("Failed to sample before reclaim")?;
        self.source.reclaim().await.context("Reclaim pass failed")?;
        let after = self
            .source
            .collect()
            .await
            .context("Failed to sample after reclaim")?;

        let bytes_freed = before.heap_used as i64 - after.heap_used as i64;
        debug!(bytes_freed = bytes_freed, "Reclaim pass complete");

        Ok(CollectionOutcome::Completed {
            before,
            after,
            bytes_freed,
        })
    }

    /// Growth-rate check over the latest samples of the monitor window
    pub async fn recent_growth(&self) -> RecentGrowthReport {
        let samples = self.state.lock().await.monitor_window.snapshot();
        self.growth_check.check(&samples)
    }

    /// Monitor window contents, oldest first
    pub async fn get_samples(&self) -> Vec<MemoryStats> {
        self.state
            .lock()
            .await
            .monitor_window
            .iter()
            .map(MemoryStats::from)
            .collect()
    }

    /// Every leak event emitted so far, oldest first
    pub async fn get_leak_history(&self) -> Vec<LeakEvent> {
        self.state.lock().await.leak_history.clone()
    }

    /// Latest sample in MB, or `None` before the first sample
    pub async fn get_current_stats(&self) -> Option<MemoryStats> {
        self.state
            .lock()
            .await
            .monitor_window
            .latest()
            .map(MemoryStats::from)
    }

    /// Hand an event to the sink, containing any error or panic
    async fn deliver(&self, kind: &str, send: impl FnOnce(&dyn EventSink) -> Result<()>) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| send(self.sink.as_ref())));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{:#}", e)),
            Err(payload) => Some(panic_message(&*payload)),
        };

        match failure {
            None => {
                if let Some(health) = &self.health {
                    health.set_healthy(components::SINK).await;
                }
            }
            Some(error) => {
                self.logger.log_sink_failure(kind, &error);
                if let Some(metrics) = &self.metrics {
                    metrics.inc_sink_errors();
                }
                if let Some(health) = &self.health {
                    health.set_degraded(components::SINK, error).await;
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("sink panicked: {}", detail)
}
