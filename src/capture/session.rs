//! Capture session ownership and release.

use super::track::{MediaTrack, TrackInfo, TrackKind};
use crate::host::SurfaceReset;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

/// Lifecycle of the manager's single session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// No session held, nothing in flight.
    Idle = 0,
    /// A capture request is pending on the host.
    Acquiring = 1,
    /// A session holds camera hardware.
    Active = 2,
}

impl SessionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Acquiring,
            2 => SessionState::Active,
            _ => SessionState::Idle,
        }
    }
}

/// Counters shared between a manager and the sessions it created.
#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    pub acquired: AtomicU64,
    pub denied: AtomicU64,
    pub unavailable: AtomicU64,
    pub attachment_failures: AtomicU64,
    pub busy: AtomicU64,
    pub released: AtomicU64,
    pub tracks_stopped: AtomicU64,
}

/// Claim on the manager's slot. Returns it to `Idle` when dropped.
pub(crate) struct SlotGuard {
    state: Arc<AtomicU8>,
    counters: Arc<SessionCounters>,
}

impl SlotGuard {
    /// Moves the slot from `Idle` to `Acquiring`.
    pub(crate) fn claim(state: &Arc<AtomicU8>, counters: &Arc<SessionCounters>) -> Option<Self> {
        state
            .compare_exchange(
                SessionState::Idle as u8,
                SessionState::Acquiring as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| Self {
                state: Arc::clone(state),
                counters: Arc::clone(counters),
            })
    }

    pub(crate) fn activate(&self) {
        self.state
            .store(SessionState::Active as u8, Ordering::Release);
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.state.store(SessionState::Idle as u8, Ordering::Release);
    }
}

/// An active camera acquisition.
///
/// Owned exclusively by whoever holds it. All tracks are stopped on
/// [`release`](Self::release) or when the session is dropped.
pub struct CaptureSession {
    id: u64,
    tracks: Vec<MediaTrack>,
    surface: Option<String>,
    surface_reset: Option<SurfaceReset>,
    attachment_error: Option<String>,
    acquired_at: Instant,
    released: bool,
    slot: Option<SlotGuard>,
}

impl CaptureSession {
    /// Creates a detached session, not bound to any manager slot.
    pub fn new(id: u64, tracks: Vec<MediaTrack>) -> Self {
        Self {
            id,
            tracks,
            surface: None,
            surface_reset: None,
            attachment_error: None,
            acquired_at: Instant::now(),
            released: false,
            slot: None,
        }
    }

    pub(crate) fn with_slot(mut self, slot: SlotGuard) -> Self {
        slot.activate();
        self.slot = Some(slot);
        self
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn tracks_mut(&mut self) -> &mut [MediaTrack] {
        &mut self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    /// Number of tracks still holding their source.
    pub fn live_track_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }

    /// Identifier of the surface rendering this session, if any.
    pub fn surface(&self) -> Option<&str> {
        self.surface.as_deref()
    }

    /// Playback error recorded when the session was kept after a failed attach.
    pub fn attachment_error(&self) -> Option<&str> {
        self.attachment_error.as_deref()
    }

    pub(crate) fn set_surface(&mut self, surface: impl Into<String>, reset: Option<SurfaceReset>) {
        self.surface = Some(surface.into());
        self.surface_reset = reset;
    }

    pub(crate) fn set_attachment_error(&mut self, error: impl Into<String>) {
        self.attachment_error = Some(error.into());
    }

    #[inline]
    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Stops every track, stops playback on the bound surface and frees
    /// the manager slot.
    ///
    /// Idempotent. Returns the number of tracks stopped by this call.
    pub fn release(&mut self) -> usize {
        if self.released {
            return 0;
        }
        let stopped = self
            .tracks
            .iter_mut()
            .map(MediaTrack::stop)
            .filter(|s| *s)
            .count();
        self.released = true;
        self.surface = None;
        if let Some(reset) = self.surface_reset.take() {
            reset();
        }

        if let Some(slot) = self.slot.take() {
            slot.counters.released.fetch_add(1, Ordering::Relaxed);
            slot.counters
                .tracks_stopped
                .fetch_add(stopped as u64, Ordering::Relaxed);
        }

        tracing::info!(session = self.id, tracks = stopped, "Camera stopped");
        stopped
    }

    pub fn track_infos(&self) -> Vec<TrackInfo> {
        self.tracks.iter().map(MediaTrack::info).collect()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("tracks", &self.tracks)
            .field("surface", &self.surface)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;

    fn counted_track(id: &str, kind: TrackKind, calls: &Arc<AtomicUsize>) -> MediaTrack {
        let calls = Arc::clone(calls);
        MediaTrack::new(id, "cam", kind).with_stopper(move || {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut session = CaptureSession::new(
            1,
            vec![
                counted_track("v0", TrackKind::Video, &calls),
                counted_track("a0", TrackKind::Audio, &calls),
            ],
        );

        assert_eq!(session.live_track_count(), 2);
        assert_eq!(session.release(), 2);
        assert_eq!(session.release(), 0);
        assert!(session.is_released());
        assert_eq!(session.live_track_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_drop_releases_tracks() {
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let _session =
                CaptureSession::new(1, vec![counted_track("v0", TrackKind::Video, &calls)]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_frees_slot() {
        let state = Arc::new(AtomicU8::new(SessionState::Idle as u8));
        let counters = Arc::new(SessionCounters::default());

        let guard = SlotGuard::claim(&state, &counters).unwrap();
        assert!(SlotGuard::claim(&state, &counters).is_none());

        let mut session = CaptureSession::new(7, vec![]).with_slot(guard);
        assert_eq!(
            SessionState::from_u8(state.load(Ordering::Acquire)),
            SessionState::Active
        );

        session.release();
        assert_eq!(
            SessionState::from_u8(state.load(Ordering::Acquire)),
            SessionState::Idle
        );
        assert_eq!(counters.released.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_release_runs_surface_reset_once() {
        let resets = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&resets);
        let mut session = CaptureSession::new(1, vec![]);
        session.set_surface(
            "camera-feed",
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );

        session.release();
        session.release();
        drop(session);
        assert_eq!(resets.load(Ordering::SeqCst), 1);
    }

    proptest! {
        #[test]
        fn prop_repeated_release_matches_single(
            video in 1usize..4,
            audio in 0usize..3,
            repeats in 1usize..5,
        ) {
            let calls = Arc::new(AtomicUsize::new(0));
            let mut tracks = Vec::new();
            for i in 0..video {
                tracks.push(counted_track(&format!("v{i}"), TrackKind::Video, &calls));
            }
            for i in 0..audio {
                tracks.push(counted_track(&format!("a{i}"), TrackKind::Audio, &calls));
            }
            let mut session = CaptureSession::new(1, tracks);

            let first = session.release();
            for _ in 0..repeats {
                prop_assert_eq!(session.release(), 0);
            }
            prop_assert_eq!(first, video + audio);
            prop_assert_eq!(calls.load(Ordering::SeqCst), video + audio);
            prop_assert!(session.tracks().iter().all(|t| !t.is_live()));
        }
    }
}
