//! Capture failure taxonomy.

use super::config::ConfigError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why the host refused a capture request.
///
/// Mirrors the rejection names browsing environments report
/// for camera requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// Permission was denied by the user or policy.
    NotAllowed,
    /// No device matches the request.
    NotFound,
    /// The device exists but is busy or failed to start.
    NotReadable,
    /// The constraints cannot be satisfied.
    Overconstrained,
    /// The page is not a secure context.
    Security,
    /// The request was interrupted.
    Aborted,
    /// Anything the host did not classify.
    Other,
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectionKind::NotAllowed => "NotAllowedError",
            RejectionKind::NotFound => "NotFoundError",
            RejectionKind::NotReadable => "NotReadableError",
            RejectionKind::Overconstrained => "OverconstrainedError",
            RejectionKind::Security => "SecurityError",
            RejectionKind::Aborted => "AbortError",
            RejectionKind::Other => "Error",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for RejectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "not_allowed" | "denied" => Ok(RejectionKind::NotAllowed),
            "not_found" => Ok(RejectionKind::NotFound),
            "not_readable" | "busy" => Ok(RejectionKind::NotReadable),
            "overconstrained" => Ok(RejectionKind::Overconstrained),
            "security" | "insecure" => Ok(RejectionKind::Security),
            "aborted" => Ok(RejectionKind::Aborted),
            "other" => Ok(RejectionKind::Other),
            other => Err(format!("unknown rejection kind '{other}'")),
        }
    }
}

/// A rejected capture request as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{kind}: {message}")]
pub struct Rejection {
    pub kind: RejectionKind,
    pub message: String,
}

impl Rejection {
    pub fn new(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors returned by [`CaptureManager`](super::CaptureManager).
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera capture is not available in this environment")]
    Unavailable,
    #[error("camera capture denied: {0}")]
    Denied(#[source] Rejection),
    #[error("failed to play stream on '{surface}': {reason}")]
    Attachment {
        surface: String,
        reason: String,
        /// Tracks released because of the failure.
        tracks_stopped: usize,
    },
    #[error("a capture session is already active")]
    Busy,
    #[error("invalid constraints: {0}")]
    InvalidConstraints(#[from] ConfigError),
}

/// Coarse failure category used in reports and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CaptureUnavailable,
    CaptureDenied,
    AttachmentFailure,
    CaptureBusy,
    InvalidConstraints,
}

impl CaptureError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CaptureError::Unavailable => FailureKind::CaptureUnavailable,
            CaptureError::Denied(_) => FailureKind::CaptureDenied,
            CaptureError::Attachment { .. } => FailureKind::AttachmentFailure,
            CaptureError::Busy => FailureKind::CaptureBusy,
            CaptureError::InvalidConstraints(_) => FailureKind::InvalidConstraints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_display_uses_host_names() {
        let rejection = Rejection::new(RejectionKind::NotAllowed, "Permission denied");
        assert_eq!(rejection.to_string(), "NotAllowedError: Permission denied");
    }

    #[test]
    fn test_rejection_kind_parsing() {
        assert_eq!("busy".parse::<RejectionKind>().unwrap(), RejectionKind::NotReadable);
        assert_eq!(
            "not-allowed".parse::<RejectionKind>().unwrap(),
            RejectionKind::NotAllowed
        );
        assert!("teapot".parse::<RejectionKind>().is_err());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(CaptureError::Unavailable.kind(), FailureKind::CaptureUnavailable);
        let denied = CaptureError::Denied(Rejection::new(RejectionKind::Security, "insecure"));
        assert_eq!(denied.kind(), FailureKind::CaptureDenied);
        assert_eq!(CaptureError::Busy.kind(), FailureKind::CaptureBusy);
    }
}
