//! Memory profiler agent
//!
//! Wires a `MemoryProfiler` to the local proc filesystem and serves its
//! state over HTTP.

pub mod api;
pub mod config;
