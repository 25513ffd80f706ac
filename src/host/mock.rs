//! Scriptable host environment.
//!
//! Used for tests and for running the diagnostic without camera
//! hardware. Every capture it grants is backed by counters so callers
//! can verify that tracks were really stopped.

use super::{
    AttachError, CapabilityProbe, DisplaySurface, ElementInfo, HostEnvironment, PageLocation,
    SurfaceReset,
};
use crate::capture::{CaptureConstraints, CaptureSession, MediaTrack, Rejection, TrackKind};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Scripted page element.
#[derive(Debug, Clone)]
pub struct MockElement {
    info: ElementInfo,
    play_error: Option<String>,
    play_delay: Duration,
    playing_since: Arc<Mutex<Option<Instant>>>,
}

impl MockElement {
    pub fn new(info: ElementInfo) -> Self {
        Self {
            info,
            play_error: None,
            play_delay: Duration::ZERO,
            playing_since: Arc::new(Mutex::new(None)),
        }
    }

    /// Makes playback on this element fail.
    pub fn failing_play(mut self, reason: impl Into<String>) -> Self {
        self.play_error = Some(reason.into());
        self
    }

    /// Time playback takes to start after the stream is bound.
    pub fn with_play_delay(mut self, delay: Duration) -> Self {
        self.play_delay = delay;
        self
    }

    /// When playback started, if the element is playing.
    pub fn playing_since(&self) -> Option<Instant> {
        *lock(&self.playing_since)
    }
}

#[derive(Debug)]
struct Script {
    capability: CapabilityProbe,
    location: PageLocation,
    rejection: Option<Rejection>,
    video_labels: Vec<String>,
    audio_label: String,
    elements: Vec<MockElement>,
    request_delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            capability: CapabilityProbe::available(),
            location: PageLocation::new("https:", "mirror.local"),
            rejection: None,
            video_labels: vec!["Mock Camera".to_string()],
            audio_label: "Mock Microphone".to_string(),
            elements: vec![MockElement::new(ElementInfo::new("camera-feed", 320, 240))],
            request_delay: Duration::ZERO,
        }
    }
}

/// Host environment with scripted responses.
#[derive(Debug, Clone, Default)]
pub struct MockEnvironment {
    script: Arc<Mutex<Script>>,
    requests: Arc<AtomicUsize>,
    live_tracks: Arc<AtomicUsize>,
}

impl MockEnvironment {
    /// A secure page with one camera and a `camera-feed` element.
    pub fn new() -> Self {
        Self::default()
    }

    fn edit(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut *lock(&self.script));
        self
    }

    /// Removes the camera capture capability.
    pub fn without_capability(self) -> Self {
        self.edit(|s| s.capability = CapabilityProbe::absent())
    }

    /// Sets the raw capability flags.
    pub fn with_capability(self, capability: CapabilityProbe) -> Self {
        self.edit(|s| s.capability = capability)
    }

    /// Rejects every capture request.
    pub fn rejecting(self, rejection: Rejection) -> Self {
        self.edit(|s| s.rejection = Some(rejection))
    }

    /// Serves the page over plain HTTP from a non-loopback host.
    pub fn insecure(self) -> Self {
        self.edit(|s| s.location = PageLocation::new("http:", "192.168.1.20"))
    }

    pub fn with_location(self, location: PageLocation) -> Self {
        self.edit(|s| s.location = location)
    }

    /// Removes all page elements.
    pub fn without_elements(self) -> Self {
        self.edit(|s| s.elements.clear())
    }

    pub fn with_element(self, element: MockElement) -> Self {
        self.edit(|s| s.elements.push(element))
    }

    /// Labels of the video tracks handed out per request.
    pub fn with_video_tracks<I, S>(self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels = labels.into_iter().map(Into::into).collect();
        self.edit(|s| s.video_labels = labels)
    }

    /// Delays every capture request, simulating a permission prompt.
    pub fn with_request_delay(self, delay: Duration) -> Self {
        self.edit(|s| s.request_delay = delay)
    }

    /// Number of capture requests received.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Tracks granted and not yet stopped.
    pub fn live_tracks(&self) -> usize {
        self.live_tracks.load(Ordering::SeqCst)
    }

    /// Scripted element with the given id.
    pub fn element(&self, id: &str) -> Option<MockElement> {
        lock(&self.script)
            .elements
            .iter()
            .find(|e| e.info.id == id)
            .cloned()
    }

    fn make_track(&self, id: String, label: &str, kind: TrackKind) -> MediaTrack {
        self.live_tracks.fetch_add(1, Ordering::SeqCst);
        let live = Arc::clone(&self.live_tracks);
        MediaTrack::new(id, label, kind).with_stopper(move || {
            live.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

#[async_trait]
impl HostEnvironment for MockEnvironment {
    fn capability(&self) -> CapabilityProbe {
        lock(&self.script).capability
    }

    async fn request_capture(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Vec<MediaTrack>, Rejection> {
        let request = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        let (delay, rejection, video_labels, audio_label) = {
            let script = lock(&self.script);
            (
                script.request_delay,
                script.rejection.clone(),
                script.video_labels.clone(),
                script.audio_label.clone(),
            )
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(rejection) = rejection {
            return Err(rejection);
        }

        let mut tracks: Vec<MediaTrack> = video_labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                self.make_track(format!("req{request}-video{i}"), label, TrackKind::Video)
            })
            .collect();
        if constraints.audio {
            let id = format!("req{request}-audio0");
            tracks.push(self.make_track(id, &audio_label, TrackKind::Audio));
        }

        tracing::debug!(
            request,
            tracks = tracks.len(),
            width = constraints.width,
            height = constraints.height,
            "Mock capture granted"
        );
        Ok(tracks)
    }

    fn location(&self) -> PageLocation {
        lock(&self.script).location.clone()
    }

    fn find_element(&self, id: &str) -> Option<Box<dyn DisplaySurface>> {
        self.element(id)
            .map(|element| Box::new(MockSurface { element }) as Box<dyn DisplaySurface>)
    }

    fn video_elements(&self) -> Vec<ElementInfo> {
        lock(&self.script)
            .elements
            .iter()
            .map(|e| e.info.clone())
            .collect()
    }

    fn count_elements(&self, id: &str) -> usize {
        lock(&self.script)
            .elements
            .iter()
            .filter(|e| e.info.id == id)
            .count()
    }
}

struct MockSurface {
    element: MockElement,
}

#[async_trait]
impl DisplaySurface for MockSurface {
    fn info(&self) -> ElementInfo {
        self.element.info.clone()
    }

    async fn attach(&mut self, session: &CaptureSession) -> Result<(), AttachError> {
        if let Some(reason) = &self.element.play_error {
            return Err(AttachError(reason.clone()));
        }
        if session.video_tracks().next().is_none() {
            return Err(AttachError("session has no video track".to_string()));
        }
        if !self.element.play_delay.is_zero() {
            tokio::time::sleep(self.element.play_delay).await;
        }
        *lock(&self.element.playing_since) = Some(Instant::now());
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.element.playing_since().is_some()
    }

    fn detach(&mut self) {
        *lock(&self.element.playing_since) = None;
    }

    fn reset_hook(&self) -> Option<SurfaceReset> {
        let playing_since = Arc::clone(&self.element.playing_since);
        Some(Box::new(move || *lock(&playing_since) = None))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RejectionKind;

    #[tokio::test]
    async fn test_mock_capture_lifecycle() {
        let env = MockEnvironment::new();
        assert!(env.capability().is_available());

        let mut tracks = env
            .request_capture(&CaptureConstraints::default())
            .await
            .unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].kind(), TrackKind::Video);
        assert_eq!(env.live_tracks(), 1);

        tracks[0].stop();
        assert_eq!(env.live_tracks(), 0);
        assert_eq!(env.request_count(), 1);
    }

    #[tokio::test]
    async fn test_audio_track_on_request() {
        let env = MockEnvironment::new();
        let constraints = CaptureConstraints {
            audio: true,
            ..Default::default()
        };
        let tracks = env.request_capture(&constraints).await.unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].kind(), TrackKind::Audio);
    }

    #[tokio::test]
    async fn test_rejection_is_returned() {
        let env = MockEnvironment::new()
            .rejecting(Rejection::new(RejectionKind::NotAllowed, "Permission denied"));
        let err = env
            .request_capture(&CaptureConstraints::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, RejectionKind::NotAllowed);
        assert_eq!(env.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_failing_element_does_not_play() {
        let element = MockElement::new(ElementInfo::new("camera-feed", 640, 480))
            .failing_play("NotAllowedError: play() blocked");
        let env = MockEnvironment::new().without_elements().with_element(element);
        let tracks = env
            .request_capture(&CaptureConstraints::default())
            .await
            .unwrap();
        let session = CaptureSession::new(1, tracks);

        let mut surface = env.find_element("camera-feed").unwrap();
        assert!(surface.attach(&session).await.is_err());
        assert!(!surface.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_delay_and_reset_hook() {
        let element = MockElement::new(ElementInfo::new("camera-feed", 320, 240))
            .with_play_delay(Duration::from_millis(250));
        let env = MockEnvironment::new().without_elements().with_element(element);
        let tracks = env
            .request_capture(&CaptureConstraints::default())
            .await
            .unwrap();
        let session = CaptureSession::new(1, tracks);

        let before = Instant::now();
        let mut surface = env.find_element("camera-feed").unwrap();
        surface.attach(&session).await.unwrap();
        let playing_since = env.element("camera-feed").unwrap().playing_since().unwrap();
        assert_eq!(playing_since, before + Duration::from_millis(250));

        let reset = surface.reset_hook().unwrap();
        reset();
        assert!(!surface.is_playing());
    }

    #[test]
    fn test_element_lookup() {
        let env = MockEnvironment::new();
        assert!(env.find_element("camera-feed").is_some());
        assert!(env.find_element("missing").is_none());
        assert_eq!(env.count_elements("camera-feed"), 1);
        assert_eq!(env.video_elements().len(), 1);

        let env = env.without_elements();
        assert!(env.video_elements().is_empty());
    }
}
