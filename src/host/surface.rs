//! Display surfaces that render a live session.

use crate::capture::CaptureSession;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Playback could not be started on a surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AttachError(pub String);

/// Stops playback on a surface once its session has released the camera.
pub type SurfaceReset = Box<dyn FnOnce() + Send + Sync>;

/// Read-only description of a display element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementInfo {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub autoplay: bool,
    pub muted: bool,
}

impl ElementInfo {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            autoplay: true,
            muted: true,
        }
    }
}

/// An element that can play a live capture session.
#[async_trait]
pub trait DisplaySurface: Send {
    fn info(&self) -> ElementInfo;

    /// Binds the session and starts playback. Completes once playing.
    async fn attach(&mut self, session: &CaptureSession) -> Result<(), AttachError>;

    fn is_playing(&self) -> bool;

    /// Stops playback and unbinds the session.
    fn detach(&mut self);

    /// Hook the session runs when it is released. Surfaces that notice
    /// ended tracks on their own return `None`.
    fn reset_hook(&self) -> Option<SurfaceReset> {
        None
    }
}
