//! Diagnostic routine.

use super::report::{DiagnosticReport, Outcome};
use crate::capture::{CaptureManager, FileConfig, SessionLease};
use crate::host::{DisplaySurface, HostEnvironment};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// A finished diagnostic run.
#[derive(Debug)]
pub struct DiagnosticRun {
    pub report: DiagnosticReport,
    /// Release timer for the acquired session, if any.
    pub lease: Option<SessionLease>,
}

/// Runs the camera checks against a host environment.
#[derive(Debug)]
pub struct Diagnostic {
    manager: CaptureManager,
    config: FileConfig,
}

impl Diagnostic {
    pub fn new(env: Arc<dyn HostEnvironment>, config: FileConfig) -> Self {
        Self {
            manager: CaptureManager::from_config(env, &config),
            config,
        }
    }

    pub fn manager(&self) -> &CaptureManager {
        &self.manager
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    /// Looks up the display element, probes the host, acquires a
    /// session and arms its release timer.
    ///
    /// Never fails: every problem ends up in the report.
    pub async fn run(&self) -> DiagnosticRun {
        let started_at = Utc::now();
        let env = self.manager.environment();
        let element_id = self.config.display.element_id.as_str();
        let constraints = &self.config.constraints;

        info!("=== Camera diagnostic ===");

        let mut surface = env.find_element(element_id);
        let element = surface.as_ref().map(|s| s.info());
        info!(element = element_id, found = element.is_some(), "Video element lookup");
        if let Some(element) = &element {
            info!(
                id = %element.id,
                width = element.width,
                height = element.height,
                autoplay = element.autoplay,
                muted = element.muted,
                "Video element details"
            );
        }

        let capability = env.capability();
        info!(
            media_devices = capability.media_devices,
            get_user_media = capability.get_user_media,
            "Capture support"
        );

        let location = env.location();
        let secure_context = location.is_secure();
        info!(protocol = %location.protocol, secure = secure_context, "Page location");
        if !secure_context {
            warn!("Not a secure context; the host may refuse camera access");
        }

        let result = self
            .manager
            .acquire_session(
                constraints,
                surface.as_deref_mut().map(|s| s as &mut dyn DisplaySurface),
            )
            .await;

        let (outcome, lease) = match result {
            Ok(session) => {
                let outcome = Outcome::Success {
                    session_id: session.id(),
                    tracks: session.track_infos(),
                    attached_to: session.surface().map(str::to_string),
                    attachment_error: session.attachment_error().map(str::to_string),
                };
                info!(
                    session = session.id(),
                    release_after_ms = self.manager.lease_duration().as_millis() as u64,
                    "Camera test successful"
                );
                (outcome, Some(self.manager.lease(session)))
            }
            Err(e) => {
                warn!(kind = ?e.kind(), error = %e, "Camera test failed");
                (Outcome::failure(&e), None)
            }
        };

        let video_elements = env.video_elements();
        let elements_with_id = env.count_elements(element_id);
        info!(
            video_elements = video_elements.len(),
            elements_with_id,
            "Existing video elements"
        );

        let report = DiagnosticReport {
            started_at,
            element_id: element_id.to_string(),
            element_found: element.is_some(),
            element,
            capability,
            protocol: location.protocol,
            secure_context,
            constraints: constraints.clone(),
            outcome,
            release_after_ms: lease
                .as_ref()
                .map(|_| self.manager.lease_duration().as_millis() as u64),
            video_elements,
            elements_with_id,
        };

        DiagnosticRun { report, lease }
    }
}
