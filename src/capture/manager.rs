//! Capture session manager.
//!
//! Acquires at most one session at a time, binds it to a display
//! surface when one is given, and hands it out either directly or
//! under a release timer.

use super::config::{AttachmentPolicy, CaptureConstraints, FileConfig};
use super::error::{CaptureError, Rejection, RejectionKind};
use super::lease::SessionLease;
use super::session::{CaptureSession, SessionCounters, SessionState, SlotGuard};
use crate::host::{DisplaySurface, HostEnvironment};
use crate::metrics::MetricsSnapshot;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default time a session is held before automatic release.
pub const DEFAULT_LEASE: Duration = Duration::from_millis(5000);

/// Acquires and releases camera capture sessions.
pub struct CaptureManager {
    env: Arc<dyn HostEnvironment>,
    attachment_policy: AttachmentPolicy,
    lease_duration: Duration,
    state: Arc<AtomicU8>,
    counters: Arc<SessionCounters>,
    next_id: AtomicU64,
}

impl CaptureManager {
    /// Creates a manager with the default policies.
    pub fn new(env: Arc<dyn HostEnvironment>) -> Self {
        Self {
            env,
            attachment_policy: AttachmentPolicy::default(),
            lease_duration: DEFAULT_LEASE,
            state: Arc::new(AtomicU8::new(SessionState::Idle as u8)),
            counters: Arc::new(SessionCounters::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a manager using the lease and policy sections of `config`.
    pub fn from_config(env: Arc<dyn HostEnvironment>, config: &FileConfig) -> Self {
        Self::new(env)
            .with_lease_duration(config.lease.duration())
            .with_attachment_policy(config.policy.on_attachment_failure)
    }

    pub fn with_lease_duration(mut self, duration: Duration) -> Self {
        self.lease_duration = duration;
        self
    }

    pub fn with_attachment_policy(mut self, policy: AttachmentPolicy) -> Self {
        self.attachment_policy = policy;
        self
    }

    pub fn environment(&self) -> &Arc<dyn HostEnvironment> {
        &self.env
    }

    #[inline]
    pub fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Acquires a capture session.
    ///
    /// The host request is skipped entirely when the capability is
    /// missing or another session is in flight. When `surface` is given,
    /// playback has started by the time this returns `Ok`.
    pub async fn acquire_session(
        &self,
        constraints: &CaptureConstraints,
        surface: Option<&mut dyn DisplaySurface>,
    ) -> Result<CaptureSession, CaptureError> {
        constraints.validate()?;

        let Some(slot) = SlotGuard::claim(&self.state, &self.counters) else {
            self.counters.busy.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Capture requested while another session is active");
            return Err(CaptureError::Busy);
        };

        let capability = self.env.capability();
        if !capability.is_available() {
            self.counters.unavailable.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                media_devices = capability.media_devices,
                get_user_media = capability.get_user_media,
                "Camera capture is not available"
            );
            return Err(CaptureError::Unavailable);
        }

        tracing::info!(
            width = constraints.width,
            height = constraints.height,
            facing_mode = %constraints.facing_mode,
            audio = constraints.audio,
            "Testing camera access"
        );

        let tracks = match self.env.request_capture(constraints).await {
            Ok(tracks) => tracks,
            Err(rejection) => {
                self.counters.denied.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %rejection, "Camera test failed");
                return Err(CaptureError::Denied(rejection));
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut session = CaptureSession::new(id, tracks).with_slot(slot);

        if session.video_tracks().next().is_none() {
            session.release();
            self.counters.denied.fetch_add(1, Ordering::Relaxed);
            let rejection = Rejection::new(RejectionKind::NotFound, "host returned no video track");
            tracing::error!(error = %rejection, "Camera test failed");
            return Err(CaptureError::Denied(rejection));
        }

        self.counters.acquired.fetch_add(1, Ordering::Relaxed);
        for track in session.tracks() {
            tracing::info!(
                session = id,
                track = track.id(),
                label = track.label(),
                kind = %track.kind(),
                enabled = track.is_enabled(),
                "Camera stream obtained"
            );
        }

        if let Some(surface) = surface {
            let surface_id = surface.info().id;
            match surface.attach(&session).await {
                Ok(()) => {
                    session.set_surface(surface_id.clone(), surface.reset_hook());
                    tracing::info!(
                        session = id,
                        surface = %surface_id,
                        "Video playing successfully"
                    );
                }
                Err(e) => {
                    self.counters
                        .attachment_failures
                        .fetch_add(1, Ordering::Relaxed);
                    match self.attachment_policy {
                        AttachmentPolicy::Release => {
                            surface.detach();
                            let tracks_stopped = session.release();
                            tracing::error!(
                                session = id,
                                surface = %surface_id,
                                error = %e,
                                "Playback failed; session released"
                            );
                            return Err(CaptureError::Attachment {
                                surface: surface_id,
                                reason: e.to_string(),
                                tracks_stopped,
                            });
                        }
                        AttachmentPolicy::Keep => {
                            tracing::warn!(
                                session = id,
                                surface = %surface_id,
                                error = %e,
                                "Playback failed; keeping session"
                            );
                            session.set_attachment_error(e.to_string());
                        }
                    }
                }
            }
        }

        Ok(session)
    }

    /// Releases a session. Idempotent; returns the tracks stopped by this call.
    pub fn release_session(&self, session: &mut CaptureSession) -> usize {
        session.release()
    }

    /// Acquires a session and puts it under a release timer.
    ///
    /// The timer is armed only after acquisition and attachment succeed.
    pub async fn acquire_leased(
        &self,
        constraints: &CaptureConstraints,
        surface: Option<&mut dyn DisplaySurface>,
    ) -> Result<SessionLease, CaptureError> {
        let session = self.acquire_session(constraints, surface).await?;
        Ok(self.lease(session))
    }

    /// Puts an acquired session under this manager's release timer.
    pub fn lease(&self, session: CaptureSession) -> SessionLease {
        SessionLease::arm(session, self.lease_duration)
    }

    /// Counter snapshot for metrics export.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            acquired: load(&self.counters.acquired),
            denied: load(&self.counters.denied),
            unavailable: load(&self.counters.unavailable),
            attachment_failures: load(&self.counters.attachment_failures),
            busy: load(&self.counters.busy),
            released: load(&self.counters.released),
            tracks_stopped: load(&self.counters.tracks_stopped),
            active_sessions: u64::from(self.state() == SessionState::Active),
        }
    }
}

impl std::fmt::Debug for CaptureManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureManager")
            .field("state", &self.state())
            .field("attachment_policy", &self.attachment_policy)
            .field("lease_duration", &self.lease_duration)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FailureKind, LeaseState, ReleaseReason, TrackKind};
    use crate::host::{ElementInfo, MockElement, MockEnvironment};

    fn manager_for(env: &MockEnvironment) -> CaptureManager {
        CaptureManager::new(Arc::new(env.clone()))
    }

    #[tokio::test]
    async fn test_unavailable_skips_request() {
        let env = MockEnvironment::new().without_capability();
        let manager = manager_for(&env);

        let err = manager
            .acquire_session(&CaptureConstraints::default(), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::CaptureUnavailable);
        assert_eq!(env.request_count(), 0);
        assert_eq!(manager.state(), SessionState::Idle);
        assert_eq!(manager.snapshot().unavailable, 1);
    }

    #[tokio::test]
    async fn test_denied_returns_no_session() {
        let env = MockEnvironment::new()
            .rejecting(Rejection::new(RejectionKind::NotAllowed, "Permission denied"));
        let manager = manager_for(&env);

        let err = manager
            .acquire_leased(&CaptureConstraints::default(), None)
            .await
            .unwrap_err();

        match err {
            CaptureError::Denied(rejection) => {
                assert_eq!(rejection.kind, RejectionKind::NotAllowed)
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(env.request_count(), 1);
        assert_eq!(env.live_tracks(), 0);
        assert_eq!(manager.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_invalid_constraints_rejected_before_request() {
        let env = MockEnvironment::new();
        let manager = manager_for(&env);

        let err = manager
            .acquire_session(&CaptureConstraints::with_dimensions(0, 240), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::InvalidConstraints);
        assert_eq!(env.request_count(), 0);
    }

    #[tokio::test]
    async fn test_no_video_track_is_denied() {
        let env = MockEnvironment::new().with_video_tracks(Vec::<String>::new());
        let manager = manager_for(&env);
        let constraints = CaptureConstraints {
            audio: true,
            ..Default::default()
        };

        let err = manager.acquire_session(&constraints, None).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::CaptureDenied);
        assert_eq!(env.live_tracks(), 0);
        assert_eq!(manager.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_release_twice_is_noop() {
        let env = MockEnvironment::new();
        let manager = manager_for(&env);

        let mut session = manager
            .acquire_session(&CaptureConstraints::default(), None)
            .await
            .unwrap();
        assert_eq!(manager.state(), SessionState::Active);
        assert_eq!(env.live_tracks(), 1);

        assert_eq!(manager.release_session(&mut session), 1);
        assert_eq!(manager.release_session(&mut session), 0);
        assert_eq!(env.live_tracks(), 0);
        assert_eq!(manager.state(), SessionState::Idle);
        assert_eq!(manager.snapshot().released, 1);
    }

    #[tokio::test]
    async fn test_second_acquire_while_active_is_busy() {
        let env = MockEnvironment::new();
        let manager = manager_for(&env);

        let mut first = manager
            .acquire_session(&CaptureConstraints::default(), None)
            .await
            .unwrap();
        let err = manager
            .acquire_session(&CaptureConstraints::default(), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::CaptureBusy);
        assert_eq!(env.request_count(), 1);

        first.release();
        let again = manager
            .acquire_session(&CaptureConstraints::default(), None)
            .await;
        assert!(again.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquire_while_acquiring_is_busy() {
        let env = MockEnvironment::new().with_request_delay(Duration::from_millis(500));
        let manager = manager_for(&env);
        let constraints = CaptureConstraints::default();

        let (first, second) = tokio::join!(
            manager.acquire_session(&constraints, None),
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                manager.acquire_session(&constraints, None).await
            }
        );

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err().kind(), FailureKind::CaptureBusy);
        assert_eq!(env.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_surface_playing_before_lease_armed() {
        let play_delay = Duration::from_millis(300);
        let env = MockEnvironment::new().without_elements().with_element(
            MockElement::new(ElementInfo::new("camera-feed", 320, 240)).with_play_delay(play_delay),
        );
        let manager = manager_for(&env);
        let mut surface = env.find_element("camera-feed").unwrap();

        let before = tokio::time::Instant::now();
        let lease = manager
            .acquire_leased(
                &CaptureConstraints::default(),
                Some(surface.as_mut() as &mut dyn DisplaySurface),
            )
            .await
            .unwrap();

        assert!(surface.is_playing());
        let playing_since = env.element("camera-feed").unwrap().playing_since().unwrap();
        assert_eq!(playing_since, before + play_delay);
        assert!(lease.armed_at() >= playing_since);
        assert_eq!(lease.deadline(), lease.armed_at() + DEFAULT_LEASE);
        assert!(lease.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_expiry_stops_playback() {
        let env = MockEnvironment::new();
        let manager = manager_for(&env);
        let mut surface = env.find_element("camera-feed").unwrap();

        let mut lease = manager
            .acquire_leased(
                &CaptureConstraints::default(),
                Some(surface.as_mut() as &mut dyn DisplaySurface),
            )
            .await
            .unwrap();
        assert!(surface.is_playing());

        lease.released().await.unwrap();
        assert_eq!(env.live_tracks(), 0);
        assert!(!surface.is_playing());
        assert!(env.element("camera-feed").unwrap().playing_since().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_lease_releases_after_five_seconds() {
        let env = MockEnvironment::new();
        let manager = manager_for(&env);

        let mut lease = manager
            .acquire_leased(&CaptureConstraints::default(), None)
            .await
            .unwrap();
        assert_eq!(lease.deadline() - lease.armed_at(), DEFAULT_LEASE);

        tokio::time::sleep(Duration::from_millis(4990)).await;
        assert_eq!(env.live_tracks(), 1);
        assert_eq!(manager.state(), SessionState::Active);

        let record = lease.released().await.unwrap();
        assert_eq!(record.reason, ReleaseReason::Expired);
        assert!(record.held_for >= DEFAULT_LEASE);
        assert_eq!(env.live_tracks(), 0);
        assert_eq!(manager.state(), SessionState::Idle);
        assert_eq!(lease.state(), LeaseState::Released(ReleaseReason::Expired));
    }

    #[tokio::test]
    async fn test_attachment_failure_releases_by_default() {
        let env = MockEnvironment::new()
            .without_elements()
            .with_element(
                MockElement::new(ElementInfo::new("camera-feed", 320, 240))
                    .failing_play("NotAllowedError: play() failed"),
            );
        let manager = manager_for(&env);
        let mut surface = env.find_element("camera-feed").unwrap();

        let err = manager
            .acquire_session(
                &CaptureConstraints::default(),
                Some(surface.as_mut() as &mut dyn DisplaySurface),
            )
            .await
            .unwrap_err();

        match err {
            CaptureError::Attachment {
                surface,
                tracks_stopped,
                ..
            } => {
                assert_eq!(surface, "camera-feed");
                assert_eq!(tracks_stopped, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(env.live_tracks(), 0);
        assert_eq!(manager.state(), SessionState::Idle);
        assert_eq!(manager.snapshot().attachment_failures, 1);
    }

    #[tokio::test]
    async fn test_attachment_failure_kept_when_configured() {
        let env = MockEnvironment::new()
            .without_elements()
            .with_element(
                MockElement::new(ElementInfo::new("camera-feed", 320, 240))
                    .failing_play("play() failed"),
            );
        let manager = manager_for(&env).with_attachment_policy(AttachmentPolicy::Keep);
        let mut surface = env.find_element("camera-feed").unwrap();

        let session = manager
            .acquire_session(
                &CaptureConstraints::default(),
                Some(surface.as_mut() as &mut dyn DisplaySurface),
            )
            .await
            .unwrap();

        assert_eq!(session.attachment_error(), Some("play() failed"));
        assert_eq!(session.surface(), None);
        assert_eq!(session.live_track_count(), 1);
        assert_eq!(session.video_tracks().count(), 1);
        assert!(session.tracks().iter().all(|t| t.kind() == TrackKind::Video));
    }
}
