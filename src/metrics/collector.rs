//! Metrics collection and registry.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of capture manager counters for metrics update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Sessions successfully acquired.
    pub acquired: u64,
    /// Requests rejected by the host.
    pub denied: u64,
    /// Requests made where capture was not available.
    pub unavailable: u64,
    /// Sessions whose display surface failed to play.
    pub attachment_failures: u64,
    /// Requests rejected because a session was already active.
    pub busy: u64,
    /// Sessions released.
    pub released: u64,
    /// Tracks stopped across all releases.
    pub tracks_stopped: u64,
    /// Sessions currently holding hardware (0 or 1).
    pub active_sessions: u64,
}

/// Prometheus metrics registry for capture monitoring.
pub struct MetricsRegistry {
    registry: Registry,

    // Acquisition outcomes
    acquired_total: IntCounter,
    denied_total: IntCounter,
    unavailable_total: IntCounter,
    attachment_failures_total: IntCounter,
    busy_total: IntCounter,

    // Release
    released_total: IntCounter,
    tracks_stopped_total: IntCounter,
    active_sessions: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all capture metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let acquired_total = IntCounter::new(
            "camera_probe_sessions_acquired_total",
            "Capture sessions successfully acquired",
        )?;
        let denied_total = IntCounter::new(
            "camera_probe_capture_denied_total",
            "Capture requests rejected by the host",
        )?;
        let unavailable_total = IntCounter::new(
            "camera_probe_capture_unavailable_total",
            "Capture attempts where the capability was absent",
        )?;
        let attachment_failures_total = IntCounter::new(
            "camera_probe_attachment_failures_total",
            "Sessions whose display surface failed to start playback",
        )?;
        let busy_total = IntCounter::new(
            "camera_probe_capture_busy_total",
            "Capture requests rejected because a session was active",
        )?;
        let released_total = IntCounter::new(
            "camera_probe_sessions_released_total",
            "Capture sessions released",
        )?;
        let tracks_stopped_total = IntCounter::new(
            "camera_probe_tracks_stopped_total",
            "Media tracks stopped on release",
        )?;
        let active_sessions = IntGauge::new(
            "camera_probe_active_sessions",
            "Capture sessions currently holding camera hardware",
        )?;

        registry.register(Box::new(acquired_total.clone()))?;
        registry.register(Box::new(denied_total.clone()))?;
        registry.register(Box::new(unavailable_total.clone()))?;
        registry.register(Box::new(attachment_failures_total.clone()))?;
        registry.register(Box::new(busy_total.clone()))?;
        registry.register(Box::new(released_total.clone()))?;
        registry.register(Box::new(tracks_stopped_total.clone()))?;
        registry.register(Box::new(active_sessions.clone()))?;

        Ok(Self {
            registry,
            acquired_total,
            denied_total,
            unavailable_total,
            attachment_failures_total,
            busy_total,
            released_total,
            tracks_stopped_total,
            active_sessions,
        })
    }

    /// Updates all metrics from a snapshot of manager state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        // Counters only move forward by the difference
        advance(&self.acquired_total, snapshot.acquired);
        advance(&self.denied_total, snapshot.denied);
        advance(&self.unavailable_total, snapshot.unavailable);
        advance(&self.attachment_failures_total, snapshot.attachment_failures);
        advance(&self.busy_total, snapshot.busy);
        advance(&self.released_total, snapshot.released);
        advance(&self.tracks_stopped_total, snapshot.tracks_stopped);

        self.active_sessions.set(snapshot.active_sessions as i64);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            acquired: 3,
            denied: 1,
            released: 2,
            tracks_stopped: 2,
            active_sessions: 1,
            ..Default::default()
        };

        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("camera_probe_sessions_acquired_total 3"));
        assert!(output.contains("camera_probe_capture_denied_total 1"));
        assert!(output.contains("camera_probe_active_sessions 1"));
    }

    #[test]
    fn test_counters_never_decrease() {
        let registry = MetricsRegistry::new().unwrap();

        registry.update(&MetricsSnapshot {
            released: 4,
            ..Default::default()
        });
        registry.update(&MetricsSnapshot {
            released: 2,
            ..Default::default()
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("camera_probe_sessions_released_total 4"));
        assert!(output.contains("camera_probe_active_sessions 0"));
    }
}
