//! Memory sample sources
//!
//! The profiler pulls samples through the `SampleSource` trait and never
//! cares how a concrete source reads them. This module ships one adapter,
//! `ProcfsSampleSource`, which reads `/proc/<pid>/status` on Linux.

mod procfs;


pub use procfs::ProcfsSampleSource;

use crate::models::MemorySample;
use anyhow::Result;

pub use async_trait::async_trait;

/// Trait for memory sampling implementations
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Take one sample; an error skips the current tick
    async fn collect(&self) -> Result<MemorySample>;

    /// Whether `reclaim` can ask the runtime for a collection pass
    fn supports_reclaim(&self) -> bool {
        false
    }

    /// Ask the sampled runtime to reclaim garbage or free pages
    async fn reclaim(&self) -> Result<()> {
        anyhow::bail!("reclaim is not supported by this sample source")
    }
}
