//! Agent configuration
//!
//! Everything is read from `MEMPROF_*` environment variables. Agent options
//! and profiler options share one namespace, e.g. `MEMPROF_API_PORT` and
//! `MEMPROF_SAMPLING_INTERVAL_MS`.

use anyhow::{Context, Result};
use memprof_lib::ProfilerConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Label attached to every log record; defaults to `pid-<pid>`
    #[serde(default)]
    pub process_label: Option<String>,

    /// API server port for health, metrics and introspection
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Process to sample; defaults to the agent itself
    #[serde(default)]
    pub pid: Option<u32>,

    /// Mount point of the proc filesystem
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,

    #[serde(skip)]
    pub profiler: ProfilerConfig,
}

fn default_api_port() -> u16 {
    8080
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_env(config::Environment::with_prefix("MEMPROF").try_parsing(true))
    }

    /// Load from a prepared environment source
    ///
    /// Fails on unparsable values and on profiler options that do not
    /// validate.
    pub fn from_env(env: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(env)
            .build()
            .context("Failed to read configuration")?;

        let mut agent: AgentConfig = settings
            .clone()
            .try_deserialize()
            .context("Invalid agent configuration")?;
        agent.profiler = settings
            .try_deserialize()
            .context("Invalid profiler configuration")?;
        agent.profiler.validate()?;

        Ok(agent)
    }

    pub fn target_pid(&self) -> u32 {
        self.pid.unwrap_or_else(std::process::id)
    }

    pub fn process_label(&self) -> String {
        self.process_label
            .clone()
            .unwrap_or_else(|| format!("pid-{}", self.target_pid()))
    }
}
