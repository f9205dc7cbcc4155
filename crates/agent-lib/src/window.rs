//! Fixed-capacity rolling window of memory samples
//!
//! Samples are kept oldest to newest; pushing past capacity evicts the
//! oldest entry so the window always holds the last `capacity` samples.

use crate::config::ConfigError;
use crate::models::MemorySample;
use std::collections::VecDeque;

/// Bounded FIFO buffer of samples used as the unit of analysis
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<MemorySample>,
    capacity: usize,
}

impl RollingWindow {
    /// Create an empty window; a zero capacity is a configuration error
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroWindowCapacity);
        }

        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append a sample, evicting the oldest when over capacity
    pub fn push(&mut self, sample: MemorySample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Copy of the current contents, oldest first
    ///
    /// Analysis runs on this copy so a concurrent push cannot change the
    /// data mid-cycle.
    pub fn snapshot(&self) -> Vec<MemorySample> {
        self.samples.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemorySample> {
        self.samples.iter()
    }

    /// Most recently pushed sample
    pub fn latest(&self) -> Option<&MemorySample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }
}
