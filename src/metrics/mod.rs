//! Prometheus metrics for capture monitoring.
//!
//! # Metrics Exposed
//!
//! ## Acquisition
//! - `camera_probe_sessions_acquired_total` - Sessions successfully acquired
//! - `camera_probe_capture_denied_total` - Requests rejected by the host
//! - `camera_probe_capture_unavailable_total` - Attempts without capture capability
//! - `camera_probe_attachment_failures_total` - Display surfaces that failed to play
//! - `camera_probe_capture_busy_total` - Requests rejected while a session was active
//!
//! ## Release
//! - `camera_probe_sessions_released_total` - Sessions released
//! - `camera_probe_tracks_stopped_total` - Tracks stopped on release
//! - `camera_probe_active_sessions` - Sessions currently holding hardware
//!
//! # Example
//!
//! ```no_run
//! use camera_probe::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let snapshot = MetricsSnapshot {
//!     acquired: 1,
//!     released: 1,
//!     tracks_stopped: 1,
//!     ..Default::default()
//! };
//!
//! registry.update(&snapshot);
//! println!("{}", registry.encode().unwrap());
//! ```

mod collector;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
