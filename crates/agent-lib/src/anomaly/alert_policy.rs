//! Per-sample threshold alerts
//!
//! Evaluated on every sampling tick, independently of leak classification:
//! - HIGH_MEMORY once heap usage stays above the threshold for N consecutive samples
//! - RAPID_GROWTH whenever the instantaneous growth rate exceeds its threshold

use crate::config::ProfilerConfig;
use crate::models::{MemorySample, MemoryStats};
use serde::{Deserialize, Serialize};

/// Alert type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    HighMemory,
    RapidGrowth,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::HighMemory => write!(f, "HIGH_MEMORY"),
            AlertType::RapidGrowth => write!(f, "RAPID_GROWTH"),
        }
    }
}

/// An immediate threshold-crossing notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    /// Snapshot of the triggering sample
    pub stats: MemoryStats,
    /// Bytes per second; set for RAPID_GROWTH
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_rate_bytes_per_sec: Option<f64>,
}

/// Hysteresis state carried between evaluations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertState {
    pub consecutive_high_memory: u32,
}

/// Threshold and hysteresis rules for simple memory alerts
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    pub alert_threshold_bytes: u64,
    pub max_consecutive_alerts: u32,
    pub rapid_growth_threshold_bytes_per_sec: u64,
}

impl AlertPolicy {
    pub fn from_config(config: &ProfilerConfig) -> Self {
        Self {
            alert_threshold_bytes: config.alert_threshold_bytes,
            max_consecutive_alerts: config.max_consecutive_alerts.max(1),
            rapid_growth_threshold_bytes_per_sec: config.rapid_growth_threshold_bytes_per_sec,
        }
    }

    /// Evaluate one sample against the previous one
    ///
    /// RAPID_GROWTH needs a previous sample; on the first tick only
    /// HIGH_MEMORY can fire.
    pub fn evaluate(
        &self,
        current: &MemorySample,
        previous: Option<&MemorySample>,
        state: &mut AlertState,
    ) -> Vec<AlertEvent> {
        let mut alerts = Vec::new();

        if self.high_memory_should_alert(current, state) {
            alerts.push(AlertEvent {
                alert_type: AlertType::HighMemory,
                stats: MemoryStats::from(current),
                growth_rate_bytes_per_sec: None,
            });
        }

        if let Some(rate) = previous.and_then(|prev| instantaneous_growth_rate(prev, current)) {
            if rate > self.rapid_growth_threshold_bytes_per_sec as f64 {
                alerts.push(AlertEvent {
                    alert_type: AlertType::RapidGrowth,
                    stats: MemoryStats::from(current),
                    growth_rate_bytes_per_sec: Some(rate),
                });
            }
        }

        alerts
    }

    fn high_memory_should_alert(&self, current: &MemorySample, state: &mut AlertState) -> bool {
        if current.heap_used <= self.alert_threshold_bytes {
            state.consecutive_high_memory = 0;
            return false;
        }

        state.consecutive_high_memory += 1;
        if state.consecutive_high_memory >= self.max_consecutive_alerts {
            state.consecutive_high_memory = 0;
            return true;
        }

        false
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::from_config(&ProfilerConfig::default())
    }
}

/// Heap growth in bytes per second between two samples
///
/// `None` when the samples share a timestamp or arrive out of order.
pub fn instantaneous_growth_rate(previous: &MemorySample, current: &MemorySample) -> Option<f64> {
    let elapsed_ms = current.timestamp - previous.timestamp;
    if elapsed_ms <= 0 {
        return None;
    }

    let delta = current.heap_used as f64 - previous.heap_used as f64;
    Some(delta / elapsed_ms as f64 * 1000.0)
}
