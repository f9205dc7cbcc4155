//! Core data models for the memory profiler

use serde::{Deserialize, Serialize};

/// Bytes in one kibibyte
pub const KB: u64 = 1024;

/// Bytes in one mebibyte
pub const MB: u64 = 1024 * 1024;

/// One timestamped reading of a process's memory usage
///
/// `heap_total >= heap_used` is expected but not enforced; a violation is a
/// data-quality signal from the sample source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySample {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub heap_used: u64,
    pub heap_total: u64,
    pub rss: u64,
    pub external: u64,
}

impl MemorySample {
    pub fn new(timestamp: i64, heap_used: u64, heap_total: u64, rss: u64, external: u64) -> Self {
        Self {
            timestamp,
            heap_used,
            heap_total,
            rss,
            external,
        }
    }

    /// Build a sample stamped with the current wall-clock time
    pub fn now(heap_used: u64, heap_total: u64, rss: u64, external: u64) -> Self {
        Self::new(
            chrono::Utc::now().timestamp_millis(),
            heap_used,
            heap_total,
            rss,
            external,
        )
    }

    /// Whether the source reported more used heap than allocated heap
    pub fn is_inconsistent(&self) -> bool {
        self.heap_used > self.heap_total
    }
}

/// Sample summary with every byte count converted to MB
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub timestamp: i64,
    pub heap_used_mb: f64,
    pub heap_total_mb: f64,
    pub rss_mb: f64,
    pub external_mb: f64,
}

impl From<&MemorySample> for MemoryStats {
    fn from(sample: &MemorySample) -> Self {
        Self {
            timestamp: sample.timestamp,
            heap_used_mb: bytes_to_mb(sample.heap_used),
            heap_total_mb: bytes_to_mb(sample.heap_total),
            rss_mb: bytes_to_mb(sample.rss),
            external_mb: bytes_to_mb(sample.external),
        }
    }
}

/// Convert bytes to MB rounded to two decimal places
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / MB as f64 * 100.0).round() / 100.0
}
