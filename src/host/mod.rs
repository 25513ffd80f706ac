//! Host environment abstraction.
//!
//! Everything the diagnostic observes about its surroundings goes
//! through [`HostEnvironment`]: whether camera capture exists, the page
//! location, display elements, and the capture request itself. The
//! request is the only operation that suspends.

mod mock;
#[cfg(feature = "camera")]
mod native;
mod surface;

pub use mock::{MockElement, MockEnvironment};
#[cfg(feature = "camera")]
pub use native::NativeEnvironment;
pub use surface::{AttachError, DisplaySurface, ElementInfo, SurfaceReset};

use crate::capture::{CaptureConstraints, MediaTrack, Rejection};
use async_trait::async_trait;
use serde::Serialize;

/// Result of probing for camera capture support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityProbe {
    /// The media devices interface exists.
    pub media_devices: bool,
    /// The capture request operation exists.
    pub get_user_media: bool,
}

impl CapabilityProbe {
    pub fn available() -> Self {
        Self {
            media_devices: true,
            get_user_media: true,
        }
    }

    pub fn absent() -> Self {
        Self {
            media_devices: false,
            get_user_media: false,
        }
    }

    /// Whether a capture request can be issued at all.
    pub fn is_available(&self) -> bool {
        self.media_devices && self.get_user_media
    }
}

/// Where the diagnostic is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLocation {
    /// Scheme including the trailing colon, e.g. `https:`.
    pub protocol: String,
    pub host: String,
}

impl PageLocation {
    pub fn new(protocol: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
        }
    }

    /// Secure transport, or a loopback/native origin treated as secure.
    pub fn is_secure(&self) -> bool {
        match self.protocol.as_str() {
            "https:" | "wss:" | "native:" => true,
            _ => matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "[::1]"),
        }
    }
}

/// The environment a capture diagnostic runs in.
#[async_trait]
pub trait HostEnvironment: Send + Sync {
    /// Probes for camera capture support.
    fn capability(&self) -> CapabilityProbe;

    /// Requests camera capture. May suspend while the user or OS
    /// negotiates access.
    async fn request_capture(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Vec<MediaTrack>, Rejection>;

    /// Location the diagnostic was loaded from.
    fn location(&self) -> PageLocation;

    /// Looks up a display surface by element id.
    fn find_element(&self, id: &str) -> Option<Box<dyn DisplaySurface>>;

    /// All video-capable elements, for reporting.
    fn video_elements(&self) -> Vec<ElementInfo>;

    /// Number of elements of any kind carrying `id`.
    fn count_elements(&self, id: &str) -> usize {
        usize::from(self.find_element(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_requires_both_flags() {
        assert!(CapabilityProbe::available().is_available());
        assert!(!CapabilityProbe::absent().is_available());
        let partial = CapabilityProbe {
            media_devices: true,
            get_user_media: false,
        };
        assert!(!partial.is_available());
    }

    #[test]
    fn test_secure_locations() {
        assert!(PageLocation::new("https:", "mirror.local").is_secure());
        assert!(PageLocation::new("http:", "localhost").is_secure());
        assert!(PageLocation::new("native:", "").is_secure());
        assert!(!PageLocation::new("http:", "192.168.1.20").is_secure());
    }
}
