//! Camera Probe Library
//!
//! A camera capture diagnostic. Checks whether a display element exists,
//! whether the host exposes camera capture, whether it is a secure
//! context, and whether a capture session can be acquired, rendered and
//! released again.
//!
//! # Architecture
//!
//! ```text
//! host (capability, location, elements)
//!     ↓
//! capture manager → session → lease (timed release)
//!     ↓
//! diagnostics (report)      metrics (counters)
//! ```
//!
//! # Design Principles
//!
//! - **Bounded hardware ownership**: every session is released by its
//!   lease, by an explicit release, or when dropped
//! - **Single session**: a manager rejects new requests while one is held
//! - **No escaping failures**: every outcome is a value, never a panic
//! - **Observation never gates**: secure-context checks are reported only
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use camera_probe::{
//!     capture::{CaptureConstraints, CaptureManager},
//!     host::MockEnvironment,
//! };
//!
//! # async fn run() {
//! let env = Arc::new(MockEnvironment::new());
//! let manager = CaptureManager::new(env);
//!
//! match manager.acquire_leased(&CaptureConstraints::default(), None).await {
//!     Ok(mut lease) => {
//!         // Released automatically after 5 seconds
//!         let record = lease.released().await;
//!         println!("released: {:?}", record);
//!     }
//!     Err(e) => eprintln!("camera test failed: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod diagnostics;
pub mod host;
pub mod metrics;

// Re-export commonly used types at crate root
pub use capture::{
    CaptureConstraints, CaptureError, CaptureManager, CaptureSession, FileConfig, SessionLease,
};
pub use diagnostics::{Diagnostic, DiagnosticReport, DiagnosticRun};
pub use host::{DisplaySurface, HostEnvironment, MockEnvironment};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
