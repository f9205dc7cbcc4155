//! Profiler configuration
//!
//! All options have defaults; `validate` rejects values that would make the
//! profiler meaningless so that misconfiguration fails at construction time.

use crate::models::MB;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Invalid profiler configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("sample_window_capacity must be greater than zero")]
    ZeroSampleWindow,

    #[error("leak_window_capacity must be greater than zero")]
    ZeroLeakWindow,

    #[error("sampling_interval_ms must be greater than zero")]
    ZeroSamplingInterval,

    #[error("leak_analysis_interval_ms must be greater than zero")]
    ZeroAnalysisInterval,

    #[error("max_consecutive_alerts must be at least 1")]
    ZeroConsecutiveAlerts,

    #[error("rolling window capacity must be greater than zero")]
    ZeroWindowCapacity,
}

/// Construction-time configuration for a `MemoryProfiler`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfilerConfig {
    /// Capacity of the short-horizon monitor window
    #[serde(default = "default_sample_window_capacity")]
    pub sample_window_capacity: usize,

    /// Capacity of the leak-analysis window
    #[serde(default = "default_leak_window_capacity")]
    pub leak_window_capacity: usize,

    /// Interval between leak-classification cycles
    #[serde(default = "default_leak_analysis_interval_ms")]
    pub leak_analysis_interval_ms: u64,

    /// Interval between memory samples
    #[serde(default = "default_sampling_interval_ms")]
    pub sampling_interval_ms: u64,

    /// Minimum total window growth for a consistent-growth leak
    #[serde(default = "default_leak_threshold_bytes")]
    pub leak_threshold_bytes: u64,

    /// Heap usage above which HIGH_MEMORY starts counting
    #[serde(default = "default_alert_threshold_bytes")]
    pub alert_threshold_bytes: u64,

    /// Consecutive over-threshold samples before HIGH_MEMORY fires
    #[serde(default = "default_max_consecutive_alerts")]
    pub max_consecutive_alerts: u32,

    /// Instantaneous growth rate that raises RAPID_GROWTH
    #[serde(default = "default_rapid_growth_threshold")]
    pub rapid_growth_threshold_bytes_per_sec: u64,
}

fn default_sample_window_capacity() -> usize {
    100
}

fn default_leak_window_capacity() -> usize {
    20
}

fn default_leak_analysis_interval_ms() -> u64 {
    60_000
}

fn default_sampling_interval_ms() -> u64 {
    10_000
}

fn default_leak_threshold_bytes() -> u64 {
    5 * MB
}

fn default_alert_threshold_bytes() -> u64 {
    500 * MB
}

fn default_max_consecutive_alerts() -> u32 {
    3
}

fn default_rapid_growth_threshold() -> u64 {
    MB
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            sample_window_capacity: default_sample_window_capacity(),
            leak_window_capacity: default_leak_window_capacity(),
            leak_analysis_interval_ms: default_leak_analysis_interval_ms(),
            sampling_interval_ms: default_sampling_interval_ms(),
            leak_threshold_bytes: default_leak_threshold_bytes(),
            alert_threshold_bytes: default_alert_threshold_bytes(),
            max_consecutive_alerts: default_max_consecutive_alerts(),
            rapid_growth_threshold_bytes_per_sec: default_rapid_growth_threshold(),
        }
    }
}

impl ProfilerConfig {
    /// Check every option, returning the first violation found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_window_capacity == 0 {
            return Err(ConfigError::ZeroSampleWindow);
        }
        if self.leak_window_capacity == 0 {
            return Err(ConfigError::ZeroLeakWindow);
        }
        if self.sampling_interval_ms == 0 {
            return Err(ConfigError::ZeroSamplingInterval);
        }
        if self.leak_analysis_interval_ms == 0 {
            return Err(ConfigError::ZeroAnalysisInterval);
        }
        if self.max_consecutive_alerts == 0 {
            return Err(ConfigError::ZeroConsecutiveAlerts);
        }
        Ok(())
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    pub fn analysis_interval(&self) -> Duration {
        Duration::from_millis(self.leak_analysis_interval_ms)
    }
}
