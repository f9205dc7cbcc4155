//! Memory profiling library
//!
//! This crate provides the core functionality for:
//! - Sampling a process's memory footprint through a pluggable source
//! - Rolling sample windows and linear trend estimation
//! - Leak classification and per-sample memory alerts
//! - Event delivery, health checks and observability

pub mod anomaly;
pub mod config;
pub mod health;
pub mod models;
pub mod observability;
pub mod profiler;
pub mod sink;
pub mod source;
pub mod window;

pub use config::{ConfigError, ProfilerConfig};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ProfilerMetrics, StructuredLogger};
pub use profiler::{CollectionOutcome, MemoryProfiler};
pub use sink::{ChannelSink, EventSink, FanoutSink, LoggingSink, ProfilerEvent};
pub use source::{ProcfsSampleSource, SampleSource};
pub use window::RollingWindow;
