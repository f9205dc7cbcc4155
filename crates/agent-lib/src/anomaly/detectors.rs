//! Leak pattern detectors
//!
//! Four independent detectors run against the same window every analysis
//! cycle:
//! - Consistent growth (steep, well-fitting linear trend)
//! - Exponential growth (recent half of the last 10 samples outgrowing the earlier half)
//! - Sudden spike (large jump between the last two samples)
//! - Periodic spikes (repeated local peaks above both neighbours)
//!
//! Detectors never fail: windows too small for a detector report "not detected".

use super::trend::TrendResult;
use crate::models::{MemorySample, KB, MB};
use serde::Serialize;

/// Samples the exponential detector inspects
const EXPONENTIAL_WINDOW: usize = 10;

/// Outcome of a single detector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DetectorResult {
    pub detected: bool,
    /// Heuristic match strength in 0..=100
    pub confidence: f64,
}

impl DetectorResult {
    pub fn fired(confidence: f64) -> Self {
        Self {
            detected: true,
            confidence: confidence.clamp(0.0, 100.0),
        }
    }

    pub fn not_detected() -> Self {
        Self::default()
    }
}

/// Steady linear growth: slope and fit both above threshold
#[derive(Debug, Clone)]
pub struct ConsistentGrowthDetector {
    /// Bytes per sample-index unit
    pub min_slope: f64,
    pub min_r_squared: f64,
    pub max_confidence: f64,
}

impl Default for ConsistentGrowthDetector {
    fn default() -> Self {
        Self {
            min_slope: (100 * KB) as f64,
            min_r_squared: 0.7,
            max_confidence: 95.0,
        }
    }
}

impl ConsistentGrowthDetector {
    pub fn detect(&self, trend: &TrendResult) -> DetectorResult {
        if trend.slope > self.min_slope && trend.r_squared > self.min_r_squared {
            DetectorResult::fired((trend.r_squared * 100.0).min(self.max_confidence))
        } else {
            DetectorResult::not_detected()
        }
    }
}

/// Accelerating growth across the last 10 samples
#[derive(Debug, Clone)]
pub struct ExponentialGrowthDetector {
    /// Ratio of recent to earlier mean heap usage that counts as exponential
    pub min_growth_factor: f64,
    pub max_confidence: f64,
}

impl Default for ExponentialGrowthDetector {
    fn default() -> Self {
        Self {
            min_growth_factor: 1.5,
            max_confidence: 90.0,
        }
    }
}

impl ExponentialGrowthDetector {
    pub fn detect(&self, samples: &[MemorySample]) -> DetectorResult {
        match growth_factor(samples) {
            Some(factor) if factor > self.min_growth_factor => {
                DetectorResult::fired(((factor - 1.0) * 100.0).min(self.max_confidence))
            }
            _ => DetectorResult::not_detected(),
        }
    }
}

/// Mean heap of the last 5 samples over the mean of the 5 before them
///
/// `None` with fewer than 10 samples or when the earlier mean is zero.
pub fn growth_factor(samples: &[MemorySample]) -> Option<f64> {
    if samples.len() < EXPONENTIAL_WINDOW {
        return None;
    }

    let recent_ten = &samples[samples.len() - EXPONENTIAL_WINDOW..];
    let (earlier, recent) = recent_ten.split_at(EXPONENTIAL_WINDOW / 2);

    let earlier_mean = mean_heap_used(earlier);
    if earlier_mean <= 0.0 {
        return None;
    }

    Some(mean_heap_used(recent) / earlier_mean)
}

fn mean_heap_used(samples: &[MemorySample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.heap_used as f64).sum::<f64>() / samples.len() as f64
}

/// Large jump between the two most recent samples
#[derive(Debug, Clone)]
pub struct SuddenSpikeDetector {
    pub min_delta_bytes: u64,
    pub confidence: f64,
}

impl Default for SuddenSpikeDetector {
    fn default() -> Self {
        Self {
            min_delta_bytes: 10 * MB,
            confidence: 75.0,
        }
    }
}

impl SuddenSpikeDetector {
    pub fn detect(&self, samples: &[MemorySample]) -> DetectorResult {
        let [.., second_last, last] = samples else {
            return DetectorResult::not_detected();
        };

        let delta = last.heap_used as i128 - second_last.heap_used as i128;
        if delta > self.min_delta_bytes as i128 {
            DetectorResult::fired(self.confidence)
        } else {
            DetectorResult::not_detected()
        }
    }
}

/// Repeated local peaks, e.g. a cache that fills and flushes
#[derive(Debug, Clone)]
pub struct PeriodicSpikeDetector {
    /// How far a peak must exceed both neighbours
    pub peak_factor: f64,
    /// Peaks needed before the pattern counts
    pub min_spikes: usize,
    pub confidence_per_spike: f64,
    pub max_confidence: f64,
}

impl Default for PeriodicSpikeDetector {
    fn default() -> Self {
        Self {
            peak_factor: 1.2,
            min_spikes: 3,
            confidence_per_spike: 20.0,
            max_confidence: 80.0,
        }
    }
}

impl PeriodicSpikeDetector {
    pub fn detect(&self, samples: &[MemorySample]) -> DetectorResult {
        let spikes = self.count_spikes(samples);
        if spikes > self.min_spikes {
            DetectorResult::fired((spikes as f64 * self.confidence_per_spike).min(self.max_confidence))
        } else {
            DetectorResult::not_detected()
        }
    }

    /// Interior samples exceeding both neighbours by `peak_factor`
    pub fn count_spikes(&self, samples: &[MemorySample]) -> usize {
        samples
            .windows(3)
            .filter(|w| {
                let prev = w[0].heap_used as f64;
                let current = w[1].heap_used as f64;
                let next = w[2].heap_used as f64;
                current > prev * self.peak_factor && current > next * self.peak_factor
            })
            .count()
    }
}

/// Every detector's outcome for one window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorReport {
    pub consistent_growth: DetectorResult,
    pub exponential_growth: DetectorResult,
    pub sudden_spike: DetectorResult,
    pub periodic_spike: DetectorResult,
}

/// The full detector set, evaluated together without short-circuiting
#[derive(Debug, Clone, Default)]
pub struct PatternDetectors {
    pub consistent_growth: ConsistentGrowthDetector,
    pub exponential_growth: ExponentialGrowthDetector,
    pub sudden_spike: SuddenSpikeDetector,
    pub periodic_spike: PeriodicSpikeDetector,
}

impl PatternDetectors {
    pub fn run_all(&self, samples: &[MemorySample], trend: &TrendResult) -> DetectorReport {
        DetectorReport {
            consistent_growth: self.consistent_growth.detect(trend),
            exponential_growth: self.exponential_growth.detect(samples),
            sudden_spike: self.sudden_spike.detect(samples),
            periodic_spike: self.periodic_spike.detect(samples),
        }
    }
}
