//! Camera capture sessions.
//!
//! This module owns the only stateful part of the diagnostic: acquiring
//! a camera capture session from the host, binding it to a display
//! surface, and making sure the hardware is released again.

mod config;
mod error;
mod lease;
mod manager;
mod session;
mod track;

pub use config::{
    AttachmentPolicy, CaptureConstraints, ConfigError, DisplayConfig, FacingMode, FileConfig,
    LeaseConfig, PolicyConfig,
};
pub use error::{CaptureError, FailureKind, Rejection, RejectionKind};
pub use lease::{LeaseState, ReleaseReason, ReleaseRecord, SessionLease};
pub use manager::{CaptureManager, DEFAULT_LEASE};
pub use session::{CaptureSession, SessionState};
pub use track::{MediaTrack, TrackInfo, TrackKind, TrackState, TrackStop};
