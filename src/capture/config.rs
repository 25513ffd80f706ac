//! Capture constraints and diagnostic configuration.
//!
//! Constraints are "ideal" values: the host may satisfy them
//! approximately. Only obviously unusable values are rejected here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Preferred camera orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera, facing the user.
    #[default]
    User,
    /// Rear camera, facing away from the user.
    Environment,
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacingMode::User => f.write_str("user"),
            FacingMode::Environment => f.write_str("environment"),
        }
    }
}

impl std::str::FromStr for FacingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(FacingMode::User),
            "environment" => Ok(FacingMode::Environment),
            other => Err(ConfigError::ParseError(format!(
                "unknown facing mode '{other}'"
            ))),
        }
    }
}

/// Parameters for a capture request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConstraints {
    /// Ideal frame width in pixels.
    pub width: u32,
    /// Ideal frame height in pixels.
    pub height: u32,
    /// Preferred camera orientation.
    pub facing_mode: FacingMode,
    /// Whether to request an audio track as well.
    pub audio: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            facing_mode: FacingMode::User,
            audio: false,
        }
    }
}

impl CaptureConstraints {
    /// Creates constraints with the specified ideal dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Validates the constraint values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid lease duration (must be at least 1ms)")]
    InvalidLeaseDuration,
    #[error("display element id must not be empty")]
    EmptyElementId,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// How long an acquired session is held before it is released.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// Delay between acquisition and automatic release.
    pub release_after_ms: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            release_after_ms: 5000,
        }
    }
}

impl LeaseConfig {
    /// Returns the lease duration.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.release_after_ms)
    }
}

/// Display surface lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Identifier of the element that should render the stream.
    pub element_id: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            element_id: "camera-feed".to_string(),
        }
    }
}

/// What to do with a session whose display surface refused to play it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentPolicy {
    /// Release the session immediately and report a failure.
    #[default]
    Release,
    /// Keep the session, record the error on it and report success.
    Keep,
}

/// Failure-handling policies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Attachment failure handling.
    pub on_attachment_failure: AttachmentPolicy,
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub constraints: CaptureConstraints,
    #[serde(default)]
    pub lease: LeaseConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.constraints.validate()?;
        if self.lease.release_after_ms == 0 {
            return Err(ConfigError::InvalidLeaseDuration);
        }
        if self.display.element_id.is_empty() {
            return Err(ConfigError::EmptyElementId);
        }
        Ok(())
    }
}
