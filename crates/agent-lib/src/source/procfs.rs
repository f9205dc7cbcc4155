//! procfs memory sampling
//!
//! Reads `<proc_root>/<pid>/status` and maps its kB counters onto a sample:
//! - VmRSS for resident set size
//! - RssAnon for heap used
//! - VmData for heap total
//! - RssFile + RssShmem for external memory

use super::SampleSource;
use crate::models::{MemorySample, KB};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;

/// Sample source backed by the Linux proc filesystem
pub struct ProcfsSampleSource {
    proc_root: PathBuf,
    pid: u32,
}

impl ProcfsSampleSource {
    /// Create a source for `pid` under `/proc`
    pub fn new(pid: u32) -> Self {
        Self::with_proc_root("/proc", pid)
    }

    /// Create a source for the calling process
    pub fn current_process() -> Self {
        Self::new(std::process::id())
    }

    /// Create source with custom proc root (for testing)
    pub fn with_proc_root(proc_root: impl Into<PathBuf>, pid: u32) -> Self {
        Self {
            proc_root: proc_root.into(),
            pid,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Parse `status` file contents
    /// Returns HashMap of field name to value in bytes, for `kB` fields only.
    /// Values too large to express in bytes are skipped.
    pub fn parse_status(content: &str) -> HashMap<String, u64> {
        let mut fields = HashMap::new();

        for line in content.lines() {
            let Some((name, rest)) = line.split_once(':') else {
                continue;
            };
            let parts: Vec<&str> = rest.split_whitespace().collect();
            if parts.len() == 2 && parts[1] == "kB" {
                let bytes = parts[0]
                    .parse::<u64>()
                    .ok()
                    .and_then(|value| value.checked_mul(KB));
                if let Some(bytes) = bytes {
                    fields.insert(name.trim().to_string(), bytes);
                }
            }
        }

        fields
    }

    /// Build a sample from parsed status fields
    pub fn sample_from_status(fields: &HashMap<String, u64>, timestamp: i64) -> Result<MemorySample> {
        let rss = *fields.get("VmRSS").context("VmRSS missing from status")?;
        let field = |name: &str| fields.get(name).copied().unwrap_or(0);

        Ok(MemorySample::new(
            timestamp,
            field("RssAnon"),
            field("VmData"),
            rss,
            field("RssFile") + field("RssShmem"),
        ))
    }
}

#[async_trait]
impl SampleSource for ProcfsSampleSource {
    async fn collect(&self) -> Result<MemorySample> {
        let status_path = self.proc_root.join(self.pid.to_string()).join("status");
        let content = fs::read_to_string(&status_path)
            .await
            .with_context(|| format!("Failed to read {}", status_path.display()))?;

        let fields = Self::parse_status(&content);
        Self::sample_from_status(&fields, chrono::Utc::now().timestamp_millis())
            .with_context(|| format!("Failed to parse {}", status_path.display()))
    }
}
