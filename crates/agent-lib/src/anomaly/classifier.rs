//! Leak classification
//!
//! Runs the trend fit once, evaluates every pattern detector, and resolves
//! the outcomes into at most one `LeakEvent` using a fixed precedence:
//! consistent growth, then exponential growth, then sudden spike. Periodic
//! spikes are reported in the analysis but never raise an event on their own.

use super::detectors::{DetectorReport, PatternDetectors};
use super::trend::{TrendEstimator, TrendResult};
use crate::models::{MemorySample, KB, MB};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Total growth above which consistent growth is rated high severity
const HIGH_SEVERITY_GROWTH_BYTES: i128 = 50 * MB as i128;

/// Leak pattern classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeakType {
    ConsistentGrowth,
    ExponentialGrowth,
    SuddenSpike,
    Periodic,
    None,
}

impl LeakType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeakType::ConsistentGrowth => "consistent_growth",
            LeakType::ExponentialGrowth => "exponential_growth",
            LeakType::SuddenSpike => "sudden_spike",
            LeakType::Periodic => "periodic",
            LeakType::None => "none",
        }
    }
}

impl std::fmt::Display for LeakType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leak severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for LeakSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeakSeverity::Low => write!(f, "low"),
            LeakSeverity::Medium => write!(f, "medium"),
            LeakSeverity::High => write!(f, "high"),
            LeakSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Best-effort source location attached by a reporting layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakLocation {
    pub file: String,
    pub line: u32,
    pub function: String,
}

/// A classified, scored leak verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeakEvent {
    /// Monotonic per classifier
    pub id: u64,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub leak_type: LeakType,
    pub severity: LeakSeverity,
    #[serde(rename = "growthRateKBps")]
    pub growth_rate_kbps: i64,
    #[serde(rename = "totalGrowthMB")]
    pub total_growth_mb: i64,
    pub duration_sec: i64,
    pub confidence_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LeakLocation>,
}

impl LeakEvent {
    /// Copy of this event with reporting-layer location metadata attached
    pub fn with_location(mut self, location: LeakLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// Everything one classification cycle computed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeakAnalysis {
    pub samples_analyzed: usize,
    pub trend: TrendResult,
    pub detectors: DetectorReport,
    pub event: Option<LeakEvent>,
}

/// Growth figures over a window, first sample to last
#[derive(Debug, Clone, Copy, PartialEq)]
struct WindowGrowth {
    growth_bytes: i128,
    duration_ms: i64,
}

impl WindowGrowth {
    fn of(samples: &[MemorySample]) -> Option<Self> {
        let (first, last) = (samples.first()?, samples.last()?);
        Some(Self {
            growth_bytes: last.heap_used as i128 - first.heap_used as i128,
            duration_ms: last.timestamp - first.timestamp,
        })
    }

    fn rate_kbps(&self) -> i64 {
        if self.duration_ms <= 0 {
            return 0;
        }
        (self.growth_bytes as f64 / self.duration_ms as f64 * 1000.0 / KB as f64).round() as i64
    }

    fn total_mb(&self) -> i64 {
        (self.growth_bytes as f64 / MB as f64).round() as i64
    }

    fn duration_sec(&self) -> i64 {
        (self.duration_ms as f64 / 1000.0).round() as i64
    }
}

/// Turns a window into at most one leak event
#[derive(Debug)]
pub struct LeakClassifier {
    /// Total window growth required before consistent growth counts as a leak
    leak_threshold_bytes: u64,
    estimator: TrendEstimator,
    detectors: PatternDetectors,
    next_id: AtomicU64,
}

impl LeakClassifier {
    pub fn new(leak_threshold_bytes: u64) -> Self {
        Self {
            leak_threshold_bytes,
            estimator: TrendEstimator::default(),
            detectors: PatternDetectors::default(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Classify a window, oldest sample first
    ///
    /// Windows too small for any detector yield no event; this is the
    /// normal warm-up state.
    pub fn analyze(&self, samples: &[MemorySample]) -> LeakAnalysis {
        let trend = self.estimator.estimate(samples);
        let detectors = self.detectors.run_all(samples, &trend);

        let event = WindowGrowth::of(samples)
            .and_then(|growth| self.resolve(&detectors, growth));

        LeakAnalysis {
            samples_analyzed: samples.len(),
            trend,
            detectors,
            event,
        }
    }

    fn resolve(&self, detectors: &DetectorReport, growth: WindowGrowth) -> Option<LeakEvent> {
        let (leak_type, severity, confidence) = if detectors.consistent_growth.detected
            && growth.growth_bytes > self.leak_threshold_bytes as i128
        {
            let severity = if growth.growth_bytes > HIGH_SEVERITY_GROWTH_BYTES {
                LeakSeverity::High
            } else {
                LeakSeverity::Medium
            };
            (
                LeakType::ConsistentGrowth,
                severity,
                detectors.consistent_growth.confidence,
            )
        } else if detectors.exponential_growth.detected {
            (
                LeakType::ExponentialGrowth,
                LeakSeverity::High,
                detectors.exponential_growth.confidence,
            )
        } else if detectors.sudden_spike.detected {
            (
                LeakType::SuddenSpike,
                LeakSeverity::Medium,
                detectors.sudden_spike.confidence,
            )
        } else {
            return None;
        };

        Some(LeakEvent {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            timestamp: chrono::Utc::now().timestamp_millis(),
            leak_type,
            severity,
            growth_rate_kbps: growth.rate_kbps(),
            total_growth_mb: growth.total_mb(),
            duration_sec: growth.duration_sec(),
            confidence_percent: confidence,
            location: None,
        })
    }
}

impl Default for LeakClassifier {
    fn default() -> Self {
        Self::new(5 * MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[u64]) -> Vec<MemorySample> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MemorySample::new(i as i64 * 1000, *v, *v * 2, *v * 2, 0))
            .collect()
    }

    #[test]
    fn test_monotonic_growth_is_consistent_growth() {
        let values: Vec<u64> = (0..20).map(|i| 10 * MB + i * MB).collect();
        let analysis = LeakClassifier::default().analyze(&series(&values));

        assert!(analysis.detectors.consistent_growth.detected);
        assert!(analysis.detectors.consistent_growth.confidence > 90.0);

        let event = analysis.event.unwrap();
        assert_eq!(event.leak_type, LeakType::ConsistentGrowth);
        assert_eq!(event.severity, LeakSeverity::Medium);
        assert_eq!(event.total_growth_mb, 19);
        assert_eq!(event.duration_sec, 19);
        assert_eq!(event.growth_rate_kbps, 1024);
        assert_eq!(event.confidence_percent, 95.0);
    }

    #[test]
    fn test_large_consistent_growth_is_high_severity() {
        let values: Vec<u64> = (0..20).map(|i| 10 * MB + i * 3 * MB).collect();
        let event = LeakClassifier::default()
            .analyze(&series(&values))
            .event
            .unwrap();

        assert_eq!(event.leak_type, LeakType::ConsistentGrowth);
        assert_eq!(event.total_growth_mb, 57);
        assert_eq!(event.severity, LeakSeverity::High);
    }

    #[test]
    fn test_consistent_growth_below_leak_threshold_is_ignored() {
        // 200KB per sample over 20 samples: slope fires but total is ~3.7MB
        let values: Vec<u64> = (0..20).map(|i| 100 * MB + i * 200 * KB).collect();
        let analysis = LeakClassifier::default().analyze(&series(&values));

        assert!(analysis.detectors.consistent_growth.detected);
        assert!(analysis.event.is_none());
    }

    #[test]
    fn test_exponential_growth_is_high_regardless_of_magnitude() {
        let values = [1000, 1000, 1000, 1000, 1000, 2000, 2000, 2000, 2000, 2000];
        let analysis = LeakClassifier::default().analyze(&series(&values));

        let event = analysis.event.unwrap();
        assert_eq!(event.leak_type, LeakType::ExponentialGrowth);
        assert_eq!(event.severity, LeakSeverity::High);
        assert_eq!(event.confidence_percent, 90.0);
        assert_eq!(event.total_growth_mb, 0);
    }

    #[test]
    fn test_spike_isolation() {
        let mut values = vec![10 * MB; 19];
        values.push(25 * MB);
        let analysis = LeakClassifier::default().analyze(&series(&values));

        assert!(analysis.detectors.sudden_spike.detected);
        assert!(!analysis.detectors.consistent_growth.detected);
        assert!(analysis.trend.r_squared < 0.7);

        let event = analysis.event.unwrap();
        assert_eq!(event.leak_type, LeakType::SuddenSpike);
        assert_eq!(event.severity, LeakSeverity::Medium);
        assert_eq!(event.confidence_percent, 75.0);
        assert_eq!(event.total_growth_mb, 15);
    }

    #[test]
    fn test_three_sample_spike_reads_as_consistent_growth() {
        // A fit over three points explains most shapes
        let analysis = LeakClassifier::default().analyze(&series(&[10 * MB, 10 * MB, 25 * MB]));

        assert!((analysis.trend.r_squared - 0.75).abs() < 1e-9);
        assert!(analysis.detectors.sudden_spike.detected);
        assert!(analysis.detectors.consistent_growth.detected);

        let event = analysis.event.unwrap();
        assert_eq!(event.leak_type, LeakType::ConsistentGrowth);
        assert_eq!(event.total_growth_mb, 15);
    }

    #[test]
    fn test_consistent_growth_takes_precedence_over_exponential() {
        let values: Vec<u64> = (1..=10).map(|i| i * MB).collect();
        let analysis = LeakClassifier::default().analyze(&series(&values));

        assert!(analysis.detectors.consistent_growth.detected);
        assert!(analysis.detectors.exponential_growth.detected);
        assert_eq!(
            analysis.event.unwrap().leak_type,
            LeakType::ConsistentGrowth
        );
    }

    #[test]
    fn test_periodic_spikes_never_raise_an_event() {
        let values = [
            10 * MB,
            20 * MB,
            10 * MB,
            20 * MB,
            10 * MB,
            20 * MB,
            10 * MB,
            20 * MB,
            10 * MB,
            20 * MB,
            10 * MB,
        ];
        let analysis = LeakClassifier::default().analyze(&series(&values));

        assert!(analysis.detectors.periodic_spike.detected);
        assert!(analysis.event.is_none());
    }

    #[test]
    fn test_flat_window_yields_nothing() {
        let analysis = LeakClassifier::default().analyze(&series(&[10 * MB; 20]));

        assert_eq!(analysis.trend.r_squared, 0.0);
        assert!(!analysis.detectors.consistent_growth.detected);
        assert!(analysis.event.is_none());
    }

    #[test]
    fn test_small_windows_yield_nothing() {
        let classifier = LeakClassifier::default();

        let empty = classifier.analyze(&[]);
        assert_eq!(empty.samples_analyzed, 0);
        assert!(empty.event.is_none());

        let single = classifier.analyze(&series(&[900 * MB]));
        assert!(single.event.is_none());
        assert_eq!(single.detectors, DetectorReport::default());
    }

    #[test]
    fn test_event_ids_are_monotonic() {
        let classifier = LeakClassifier::default();
        let values = [10 * MB, 30 * MB];

        let first = classifier.analyze(&series(&values)).event.unwrap();
        let second = classifier.analyze(&series(&values)).event.unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn test_zero_duration_window_has_zero_rate() {
        let samples = vec![
            MemorySample::new(5_000, 10 * MB, 0, 0, 0),
            MemorySample::new(5_000, 30 * MB, 0, 0, 0),
        ];
        let event = LeakClassifier::default().analyze(&samples).event.unwrap();

        assert_eq!(event.growth_rate_kbps, 0);
        assert_eq!(event.duration_sec, 0);
        assert_eq!(event.total_growth_mb, 20);
    }

    #[test]
    fn test_event_serializes_with_wire_names() {
        let event = LeakClassifier::default()
            .analyze(&series(&[10 * MB, 30 * MB]))
            .event
            .unwrap()
            .with_location(LeakLocation {
                file: "cache.rs".to_string(),
                line: 42,
                function: "insert".to_string(),
            });
        let json = serde_json::to_value(&event).unwrap();

        // Two points fit a line perfectly, so consistent growth wins
        assert_eq!(json["type"], "consistent_growth");
        assert_eq!(json["severity"], "medium");
        assert_eq!(json["totalGrowthMB"], 20);
        assert_eq!(json["location"]["line"], 42);
    }
}
