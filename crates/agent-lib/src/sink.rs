//! Event delivery
//!
//! Classified leak events and threshold alerts leave the profiler through an
//! `EventSink`. Sinks are called synchronously from the tick that produced
//! the event, so implementations should hand work off rather than block.

use crate::anomaly::{AlertEvent, LeakEvent};
use crate::observability::StructuredLogger;
use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::mpsc;

/// Receiver of profiler events
pub trait EventSink: Send + Sync {
    fn on_leak_detected(&self, event: &LeakEvent) -> Result<()>;

    fn on_alert(&self, alert: &AlertEvent) -> Result<()>;
}

/// Any event the profiler can emit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum ProfilerEvent {
    Leak(LeakEvent),
    Alert(AlertEvent),
}

/// Sink that forwards events into a bounded channel
///
/// A full or closed channel is reported as a delivery error.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ProfilerEvent>,
}

impl ChannelSink {
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<ProfilerEvent>) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        (Self { tx }, rx)
    }

    fn send(&self, event: ProfilerEvent) -> Result<()> {
        self.tx
            .try_send(event)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .context("Failed to forward profiler event")
    }
}

impl EventSink for ChannelSink {
    fn on_leak_detected(&self, event: &LeakEvent) -> Result<()> {
        self.send(ProfilerEvent::Leak(event.clone()))
    }

    fn on_alert(&self, alert: &AlertEvent) -> Result<()> {
        self.send(ProfilerEvent::Alert(alert.clone()))
    }
}

/// Sink that writes every event as a structured log record
#[derive(Clone)]
pub struct LoggingSink {
    logger: StructuredLogger,
}

impl LoggingSink {
    pub fn new(logger: StructuredLogger) -> Self {
        Self { logger }
    }
}

impl EventSink for LoggingSink {
    fn on_leak_detected(&self, event: &LeakEvent) -> Result<()> {
        self.logger.log_leak(event);
        Ok(())
    }

    fn on_alert(&self, alert: &AlertEvent) -> Result<()> {
        self.logger.log_alert(alert);
        Ok(())
    }
}

/// Sink that delivers to several sinks in order
///
/// Every sink is attempted; the first error is returned.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    fn deliver(&self, mut f: impl FnMut(&dyn EventSink) -> Result<()>) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = f(sink.as_ref()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl EventSink for FanoutSink {
    fn on_leak_detected(&self, event: &LeakEvent) -> Result<()> {
        self.deliver(|sink| sink.on_leak_detected(event))
    }

    fn on_alert(&self, alert: &AlertEvent) -> Result<()> {
        self.deliver(|sink| sink.on_alert(alert))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{AlertType, LeakSeverity, LeakType};
    use crate::models::{MemorySample, MemoryStats, MB};

    fn leak_event() -> LeakEvent {
        LeakEvent {
            id: 1,
            timestamp: 0,
            leak_type: LeakType::SuddenSpike,
            severity: LeakSeverity::Medium,
            growth_rate_kbps: 100,
            total_growth_mb: 15,
            duration_sec: 20,
            confidence_percent: 75.0,
            location: None,
        }
    }

    fn alert_event() -> AlertEvent {
        AlertEvent {
            alert_type: AlertType::HighMemory,
            stats: MemoryStats::from(&MemorySample::new(0, 600 * MB, 700 * MB, 800 * MB, 0)),
            growth_rate_bytes_per_sec: None,
        }
    }

    struct FailingSink;

    impl EventSink for FailingSink {
        fn on_leak_detected(&self, _event: &LeakEvent) -> Result<()> {
            anyhow::bail!("leak sink down")
        }

        fn on_alert(&self, _alert: &AlertEvent) -> Result<()> {
            anyhow::bail!("alert sink down")
        }
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_events() {
        let (sink, mut rx) = ChannelSink::new(8);

        sink.on_leak_detected(&leak_event()).unwrap();
        sink.on_alert(&alert_event()).unwrap();

        assert_eq!(rx.recv().await, Some(ProfilerEvent::Leak(leak_event())));
        assert_eq!(rx.recv().await, Some(ProfilerEvent::Alert(alert_event())));
    }

    #[test]
    fn test_channel_sink_full_is_an_error() {
        let (sink, _rx) = ChannelSink::new(1);

        sink.on_leak_detected(&leak_event()).unwrap();
        assert!(sink.on_leak_detected(&leak_event()).is_err());
    }

    #[test]
    fn test_channel_sink_closed_is_an_error() {
        let (sink, rx) = ChannelSink::new(4);
        drop(rx);

        assert!(sink.on_alert(&alert_event()).is_err());
    }

    #[test]
    fn test_fanout_attempts_every_sink() {
        let (channel, mut rx) = ChannelSink::new(4);
        let fanout = FanoutSink::new().with(FailingSink).with(channel);

        let err = fanout.on_leak_detected(&leak_event()).unwrap_err();
        assert!(err.to_string().contains("leak sink down"));
        assert_eq!(rx.try_recv().unwrap(), ProfilerEvent::Leak(leak_event()));
    }

    #[test]
    fn test_logging_sink_never_fails() {
        let sink = LoggingSink::new(StructuredLogger::new("test-process"));

        assert!(sink.on_leak_detected(&leak_event()).is_ok());
        assert!(sink.on_alert(&alert_event()).is_ok());
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(ProfilerEvent::Leak(leak_event())).unwrap();
        assert_eq!(json["kind"], "leak");
        assert_eq!(json["event"]["type"], "sudden_spike");
    }
}
