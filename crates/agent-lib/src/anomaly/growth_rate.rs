//! Recent growth-rate check
//!
//! A fast leak heuristic over the last few samples: resident memory growing
//! faster than 1 MB/s is flagged immediately, without waiting for the leak
//! window to fill.

use crate::models::{MemorySample, MB};
use serde::Serialize;

/// Samples the check looks back over
pub const RECENT_SAMPLES: usize = 5;

/// Growth-rate check outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecentGrowthReport {
    InsufficientData,
    #[serde(rename_all = "camelCase")]
    Analyzed {
        is_leak_detected: bool,
        growth_rate_mb_per_sec: f64,
        total_growth_mb: f64,
        duration_seconds: f64,
        confidence: f64,
    },
}

impl RecentGrowthReport {
    pub fn is_leak_detected(&self) -> bool {
        matches!(
            self,
            RecentGrowthReport::Analyzed {
                is_leak_detected: true,
                ..
            }
        )
    }
}

/// RSS growth-rate check over the most recent samples
#[derive(Debug, Clone)]
pub struct GrowthRateCheck {
    /// Bytes per second treated as a leak
    pub threshold_bytes_per_sec: f64,
}

impl Default for GrowthRateCheck {
    fn default() -> Self {
        Self {
            threshold_bytes_per_sec: MB as f64,
        }
    }
}

impl GrowthRateCheck {
    pub fn check(&self, samples: &[MemorySample]) -> RecentGrowthReport {
        if samples.len() < RECENT_SAMPLES {
            return RecentGrowthReport::InsufficientData;
        }

        let recent = &samples[samples.len() - RECENT_SAMPLES..];
        let (first, last) = (recent[0], recent[RECENT_SAMPLES - 1]);

        let duration_seconds = (last.timestamp - first.timestamp) as f64 / 1000.0;
        let growth = last.rss as f64 - first.rss as f64;
        let rate = if duration_seconds > 0.0 {
            growth / duration_seconds
        } else {
            0.0
        };

        RecentGrowthReport::Analyzed {
            is_leak_detected: rate > self.threshold_bytes_per_sec,
            growth_rate_mb_per_sec: rate / MB as f64,
            total_growth_mb: growth / MB as f64,
            duration_seconds,
            confidence: (rate.abs() / MB as f64 * 100.0).min(100.0),
        }
    }
}
