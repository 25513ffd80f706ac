//! Media tracks handed out by the host when a capture is granted.

use serde::Serialize;
use std::fmt;

/// Kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Video => f.write_str("video"),
            TrackKind::Audio => f.write_str("audio"),
        }
    }
}

/// Whether a track still holds its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    Live,
    Ended,
}

/// Releases the hardware behind a track.
///
/// Called at most once per track.
pub trait TrackStop: Send + Sync {
    fn stop(&mut self);
}

impl<F> TrackStop for F
where
    F: FnMut() + Send + Sync,
{
    fn stop(&mut self) {
        self()
    }
}

/// A single hardware-sourced media track.
pub struct MediaTrack {
    id: String,
    label: String,
    kind: TrackKind,
    enabled: bool,
    state: TrackState,
    stopper: Option<Box<dyn TrackStop>>,
}

impl MediaTrack {
    /// Creates a live, enabled track with no stop hook.
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            enabled: true,
            state: TrackState::Live,
            stopper: None,
        }
    }

    /// Attaches the hook invoked when the track is stopped.
    pub fn with_stopper(mut self, stopper: impl TrackStop + 'static) -> Self {
        self.stopper = Some(Box::new(stopper));
        self
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable device label.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables the track without releasing its source.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[inline]
    pub fn state(&self) -> TrackState {
        self.state
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.state == TrackState::Live
    }

    /// Stops the track. Returns `false` if it had already ended.
    pub fn stop(&mut self) -> bool {
        if self.state == TrackState::Ended {
            return false;
        }
        if let Some(mut stopper) = self.stopper.take() {
            stopper.stop();
        }
        self.state = TrackState::Ended;
        tracing::debug!(track = %self.id, kind = %self.kind, "Track stopped");
        true
    }

    /// Serializable snapshot of the track.
    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            id: self.id.clone(),
            label: self.label.clone(),
            kind: self.kind,
            enabled: self.enabled,
            state: self.state,
        }
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("state", &self.state)
            .finish()
    }
}

/// Track snapshot used in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub id: String,
    pub label: String,
    pub kind: TrackKind,
    pub enabled: bool,
    pub state: TrackState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_new_track_is_live() {
        let track = MediaTrack::new("v0", "FaceTime HD Camera", TrackKind::Video);
        assert!(track.is_live());
        assert!(track.is_enabled());
        assert_eq!(track.label(), "FaceTime HD Camera");
    }

    #[test]
    fn test_stop_runs_hook_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut track = MediaTrack::new("v0", "cam", TrackKind::Video).with_stopper(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(track.stop());
        assert!(!track.stop());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(track.state(), TrackState::Ended);
    }

    #[test]
    fn test_disable_keeps_track_live() {
        let mut track = MediaTrack::new("v0", "cam", TrackKind::Video);
        track.set_enabled(false);
        assert!(track.is_live());
        assert!(!track.info().enabled);
    }
}
