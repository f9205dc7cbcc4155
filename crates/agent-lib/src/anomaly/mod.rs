//! Memory anomaly detection
//!
//! This module provides:
//! - Linear trend estimation over a sample window
//! - Four leak pattern detectors and the classifier that resolves them
//! - A recent growth-rate check over the last few samples
//! - Per-sample high-memory and rapid-growth alerts

mod alert_policy;
mod classifier;
mod detectors;
mod growth_rate;
mod trend;

pub use alert_policy::{instantaneous_growth_rate, AlertEvent, AlertPolicy, AlertState, AlertType};
pub use classifier::{
    LeakAnalysis, LeakClassifier, LeakEvent, LeakLocation, LeakSeverity, LeakType,
};
pub use detectors::{
    growth_factor, ConsistentGrowthDetector, DetectorReport, DetectorResult,
    ExponentialGrowthDetector, PatternDetectors, PeriodicSpikeDetector, SuddenSpikeDetector,
};
pub use growth_rate::{GrowthRateCheck, RecentGrowthReport, RECENT_SAMPLES};
pub use trend::{Metric, TrendEstimator, TrendResult};
