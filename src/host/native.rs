//! Local camera hardware through nokhwa.
//!
//! A local process has no page, so there are no display elements and
//! the location is always treated as secure. Each granted capture is
//! owned by a dedicated thread, since camera handles are not `Send` on
//! every backend.

use super::{CapabilityProbe, DisplaySurface, ElementInfo, HostEnvironment, PageLocation};
use crate::capture::{CaptureConstraints, MediaTrack, Rejection, RejectionKind, TrackKind};
use async_trait::async_trait;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::{Camera, NokhwaError};
use std::sync::mpsc;
use tokio::sync::oneshot;

/// Host environment backed by the machine's cameras.
#[derive(Debug, Clone, Default)]
pub struct NativeEnvironment {
    device_index: u32,
}

impl NativeEnvironment {
    pub fn new(device_index: u32) -> Self {
        Self { device_index }
    }
}

#[async_trait]
impl HostEnvironment for NativeEnvironment {
    fn capability(&self) -> CapabilityProbe {
        match nokhwa::query(ApiBackend::Auto) {
            Ok(devices) => {
                tracing::debug!(devices = devices.len(), "Camera backend available");
                CapabilityProbe::available()
            }
            Err(e) => {
                tracing::debug!(error = %e, "Camera backend unavailable");
                CapabilityProbe::absent()
            }
        }
    }

    async fn request_capture(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Vec<MediaTrack>, Rejection> {
        if constraints.audio {
            tracing::warn!("Audio capture is not supported by the native backend; skipping");
        }
        tracing::debug!(
            facing_mode = %constraints.facing_mode,
            "Facing mode is not selectable on the native backend"
        );

        let index = self.device_index;
        let (width, height) = (constraints.width, constraints.height);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<String, Rejection>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        std::thread::Builder::new()
            .name(format!("camera-probe-{index}"))
            .spawn(move || {
                let mut camera = match open_camera(index, width, height) {
                    Ok(camera) => camera,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if ready_tx.send(Ok(camera.info().human_name())).is_err() {
                    // Requester went away before the stream was handed out.
                    let _ = camera.stop_stream();
                    return;
                }
                // Returns on explicit stop or when the track is dropped.
                let _ = stop_rx.recv();
                if let Err(e) = camera.stop_stream() {
                    tracing::warn!(error = %e, "Failed to stop camera stream");
                }
            })
            .map_err(|e| Rejection::new(RejectionKind::Other, e.to_string()))?;

        let label = ready_rx
            .await
            .map_err(|_| Rejection::new(RejectionKind::Aborted, "capture thread exited"))??;

        let track = MediaTrack::new(format!("native-video{index}"), label, TrackKind::Video)
            .with_stopper(move || {
                let _ = stop_tx.send(());
            });
        Ok(vec![track])
    }

    fn location(&self) -> PageLocation {
        PageLocation::new("native:", "localhost")
    }

    fn find_element(&self, _id: &str) -> Option<Box<dyn DisplaySurface>> {
        None
    }

    fn video_elements(&self) -> Vec<ElementInfo> {
        Vec::new()
    }
}

fn open_camera(index: u32, width: u32, height: u32) -> Result<Camera, Rejection> {
    let format = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, 30);
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));
    let mut camera = Camera::new(CameraIndex::Index(index), requested).map_err(rejection)?;
    camera.open_stream().map_err(rejection)?;
    Ok(camera)
}

fn rejection(error: NokhwaError) -> Rejection {
    let kind = match &error {
        NokhwaError::OpenDeviceError(..) | NokhwaError::OpenStreamError(..) => {
            RejectionKind::NotReadable
        }
        NokhwaError::GetPropertyError { .. } | NokhwaError::SetPropertyError { .. } => {
            RejectionKind::Overconstrained
        }
        NokhwaError::UnsupportedOperationError(..) => RejectionKind::NotFound,
        _ => RejectionKind::Other,
    };
    Rejection::new(kind, error.to_string())
}
