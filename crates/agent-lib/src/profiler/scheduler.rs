//! Periodic sampling and analysis
//!
//! Two independent tasks drive the profiler: a sampling task on
//! `sampling_interval_ms` and an analysis task on `leak_analysis_interval_ms`.
//! Both hold only a weak reference, so dropping the last `Arc` to the
//! profiler also winds the tasks down.

use super::MemoryProfiler;
use crate::health::components;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Sample ticks allowed to be in flight at once
///
/// A source that hangs longer than this many intervals starts costing
/// ticks instead of piling up tasks.
const MAX_IN_FLIGHT_SAMPLES: usize = 4;

/// Handles for the running tick tasks
pub(super) struct SchedulerHandle {
    shutdown_tx: broadcast::Sender<()>,
    sampling: JoinHandle<()>,
    analysis: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal both tasks and wait until they have exited
    async fn shutdown(self) {
        // Receivers may already be gone if the profiler was dropped
        let _ = self.shutdown_tx.send(());

        for (name, handle) in [("sampling", self.sampling), ("analysis", self.analysis)] {
            if let Err(e) = handle.await {
                warn!(task = name, error = %e, "Scheduler task ended abnormally");
            }
        }
    }
}

impl MemoryProfiler {
    /// Start periodic sampling and analysis
    ///
    /// Does nothing if the scheduler is already running.
    pub async fn start(self: &Arc<Self>) {
        let mut slot = self.scheduler.lock().await;
        if slot.is_some() {
            debug!("Profiler already running");
            return;
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        let sampling = tokio::spawn(run_sampling(
            Arc::downgrade(self),
            self.config.sampling_interval(),
            shutdown_tx.subscribe(),
        ));
        let analysis = tokio::spawn(run_analysis(
            Arc::downgrade(self),
            self.config.analysis_interval(),
            shutdown_tx.subscribe(),
        ));

        *slot = Some(SchedulerHandle {
            shutdown_tx,
            sampling,
            analysis,
        });

        if let Some(health) = &self.health {
            for name in components::ALL {
                health.register(name).await;
            }
            health.set_ready(true).await;
        }

        self.logger.log_startup(
            self.config.sampling_interval_ms,
            self.config.leak_analysis_interval_ms,
        );
    }

    /// Stop both timers
    ///
    /// Safe to call in any state. When this returns no tick is running and
    /// none will fire.
    pub async fn stop(&self) {
        let mut slot = self.scheduler.lock().await;
        let Some(handle) = slot.take() else {
            return;
        };

        handle.shutdown().await;

        if let Some(health) = &self.health {
            health.set_ready(false).await;
        }
        self.logger.log_shutdown("stop requested");
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }
}

/// Sampling loop
///
/// Each tick runs in its own task so a slow source delays only its own
/// tick. In-flight ticks are cancelled on shutdown.
async fn run_sampling(
    profiler: Weak<MemoryProfiler>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!(interval_ms = period.as_millis() as u64, "Starting sampling loop");

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                info!("Shutting down sampling loop");
                break;
            }
            Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = result {
                    if e.is_panic() {
                        warn!(error = %e, "Sampling tick panicked");
                    }
                }
            }
            _ = ticker.tick() => {
                let Some(profiler) = profiler.upgrade() else {
                    debug!("Profiler dropped, ending sampling loop");
                    break;
                };

                if in_flight.len() >= MAX_IN_FLIGHT_SAMPLES {
                    warn!(
                        in_flight = in_flight.len(),
                        "Sample source is not keeping up, skipping tick"
                    );
                    continue;
                }

                in_flight.spawn(async move {
                    profiler.sample_once().await;
                });
            }
        }
    }

    in_flight.shutdown().await;
}

/// Analysis loop
///
/// Cycles run inline, so a slow cycle delays the next tick rather than
/// overlapping it.
async fn run_analysis(
    profiler: Weak<MemoryProfiler>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!(interval_ms = period.as_millis() as u64, "Starting analysis loop");

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                info!("Shutting down analysis loop");
                break;
            }
            _ = ticker.tick() => {
                let Some(profiler) = profiler.upgrade() else {
                    debug!("Profiler dropped, ending analysis loop");
                    break;
                };
                profiler.force_analysis().await;
            }
        }
    }
}
