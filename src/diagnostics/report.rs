//! Diagnostic report.

use crate::capture::{CaptureConstraints, CaptureError, FailureKind, TrackInfo, TrackKind};
use crate::host::{CapabilityProbe, ElementInfo};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Result of the acquisition step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        session_id: u64,
        tracks: Vec<TrackInfo>,
        /// Element now rendering the stream.
        attached_to: Option<String>,
        /// Playback error when the session was kept after a failed attach.
        attachment_error: Option<String>,
    },
    Failure {
        kind: FailureKind,
        message: String,
    },
}

impl Outcome {
    pub fn failure(error: &CaptureError) -> Self {
        Outcome::Failure {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Everything the diagnostic observed.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub started_at: DateTime<Utc>,
    pub element_id: String,
    pub element_found: bool,
    pub element: Option<ElementInfo>,
    pub capability: CapabilityProbe,
    pub protocol: String,
    pub secure_context: bool,
    pub constraints: CaptureConstraints,
    pub outcome: Outcome,
    /// Set when a release timer was armed.
    pub release_after_ms: Option<u64>,
    pub video_elements: Vec<ElementInfo>,
    pub elements_with_id: usize,
}

impl DiagnosticReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            Outcome::Failure { kind, .. } => Some(*kind),
            Outcome::Success { .. } => None,
        }
    }

    pub fn video_track_count(&self) -> usize {
        match &self.outcome {
            Outcome::Success { tracks, .. } => {
                tracks.iter().filter(|t| t.kind == TrackKind::Video).count()
            }
            Outcome::Failure { .. } => 0,
        }
    }

    /// Whether a display surface was handed to the acquisition.
    pub fn attachment_attempted(&self) -> bool {
        match &self.outcome {
            Outcome::Success {
                attached_to,
                attachment_error,
                ..
            } => attached_to.is_some() || attachment_error.is_some(),
            Outcome::Failure { kind, .. } => *kind == FailureKind::AttachmentFailure,
        }
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Camera Diagnostic ({}) ===", self.started_at.to_rfc3339())?;
        writeln!(f, "Video element '{}' found: {}", self.element_id, self.element_found)?;
        if let Some(element) = &self.element {
            writeln!(
                f,
                "  size {}x{}, autoplay: {}, muted: {}",
                element.width, element.height, element.autoplay, element.muted
            )?;
        }
        writeln!(
            f,
            "Capture support: media devices: {}, getUserMedia: {}",
            self.capability.media_devices, self.capability.get_user_media
        )?;
        writeln!(f, "Protocol: {} (secure: {})", self.protocol, self.secure_context)?;

        match &self.outcome {
            Outcome::Success {
                session_id,
                tracks,
                attached_to,
                attachment_error,
            } => {
                writeln!(f, "Camera test successful (session {session_id})")?;
                for track in tracks {
                    writeln!(
                        f,
                        "  {} track '{}' [{}] enabled: {}",
                        track.kind, track.label, track.id, track.enabled
                    )?;
                }
                if let Some(surface) = attached_to {
                    writeln!(f, "Playing on '{surface}'")?;
                }
                if let Some(error) = attachment_error {
                    writeln!(f, "Playback failed: {error}")?;
                }
                if let Some(ms) = self.release_after_ms {
                    writeln!(f, "Camera will stop in {ms}ms")?;
                }
            }
            Outcome::Failure { message, .. } => {
                writeln!(f, "Camera test failed: {message}")?;
            }
        }

        writeln!(f, "Video elements on page: {}", self.video_elements.len())?;
        write!(f, "Elements with id '{}': {}", self.element_id, self.elements_with_id)
    }
}
