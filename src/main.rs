//! Camera Probe CLI
//!
//! Runs the camera diagnostic against a scripted host or, with the
//! `camera` feature, against the machine's camera.

use camera_probe::{
    capture::{FacingMode, FileConfig, Rejection, RejectionKind},
    diagnostics::Diagnostic,
    host::{HostEnvironment, MockEnvironment},
    metrics::MetricsRegistry,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Scripted host, no hardware needed
    Mock,
    /// Local camera (requires the `camera` feature)
    Native,
}

#[derive(Debug, Parser)]
#[command(name = "camera-probe", version, about = "Camera capture diagnostic")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Backend::Mock)]
    backend: Backend,

    /// Camera index for the native backend
    #[arg(long, default_value_t = 0)]
    device: u32,

    /// Ideal capture width
    #[arg(long)]
    width: Option<u32>,

    /// Ideal capture height
    #[arg(long)]
    height: Option<u32>,

    /// Preferred camera orientation (user or environment)
    #[arg(long)]
    facing: Option<FacingMode>,

    /// Request an audio track too
    #[arg(long, conflicts_with = "no_audio")]
    audio: bool,

    /// Do not request audio, even if the config file does
    #[arg(long)]
    no_audio: bool,

    /// Milliseconds to hold the camera before releasing it
    #[arg(long)]
    hold_ms: Option<u64>,

    /// Id of the element that should render the stream
    #[arg(long)]
    element: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Print Prometheus metrics after the camera is released
    #[arg(long)]
    metrics: bool,

    /// Mock: remove camera capture support
    #[arg(long)]
    mock_no_capability: bool,

    /// Mock: reject capture with this reason (not-allowed, busy, ...)
    #[arg(long, value_name = "KIND")]
    mock_deny: Option<RejectionKind>,

    /// Mock: page has no display element
    #[arg(long)]
    mock_no_element: bool,

    /// Mock: serve the page over plain HTTP
    #[arg(long)]
    mock_insecure: bool,
}

impl Cli {
    fn load_config(&self) -> Result<FileConfig, camera_probe::capture::ConfigError> {
        let mut config = match &self.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut FileConfig) {
        if let Some(width) = self.width {
            config.constraints.width = width;
        }
        if let Some(height) = self.height {
            config.constraints.height = height;
        }
        if let Some(facing) = self.facing {
            config.constraints.facing_mode = facing;
        }
        if self.audio {
            config.constraints.audio = true;
        }
        if self.no_audio {
            config.constraints.audio = false;
        }
        if let Some(ms) = self.hold_ms {
            config.lease.release_after_ms = ms;
        }
        if let Some(element) = &self.element {
            config.display.element_id = element.clone();
        }
    }

    fn environment(&self) -> Result<Arc<dyn HostEnvironment>, String> {
        match self.backend {
            Backend::Mock => {
                let mut env = MockEnvironment::new();
                if self.mock_no_capability {
                    env = env.without_capability();
                }
                if let Some(kind) = self.mock_deny {
                    env = env.rejecting(Rejection::new(kind, "rejected by mock host"));
                }
                if self.mock_no_element {
                    env = env.without_elements();
                }
                if self.mock_insecure {
                    env = env.insecure();
                }
                Ok(Arc::new(env))
            }
            #[cfg(feature = "camera")]
            Backend::Native => Ok(Arc::new(camera_probe::host::NativeEnvironment::new(
                self.device,
            ))),
            #[cfg(not(feature = "camera"))]
            Backend::Native => Err(format!(
                "native backend (device {}) requires the `camera` feature",
                self.device
            )),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Camera Probe v{}", camera_probe::VERSION);

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };
    let env = match cli.environment() {
        Ok(env) => env,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let interrupted = Arc::new(Notify::new());
    let notify = Arc::clone(&interrupted);
    if let Err(e) = ctrlc::set_handler(move || notify.notify_one()) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let diagnostic = Diagnostic::new(env, config);
    let run = diagnostic.run().await;

    if cli.json {
        match serde_json::to_string_pretty(&run.report) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!("Failed to encode report: {}", e),
        }
    } else {
        println!("{}", run.report);
    }

    if let Some(mut lease) = run.lease {
        tokio::select! {
            record = lease.released() => {
                if let Some(record) = record {
                    info!(
                        reason = ?record.reason,
                        tracks = record.tracks_stopped,
                        held_ms = record.held_for.as_millis() as u64,
                        "Camera released"
                    );
                }
            }
            _ = interrupted.notified() => {
                info!("Interrupted; releasing camera now");
                lease.release_now();
                lease.released().await;
            }
        }
    }

    if cli.metrics {
        match MetricsRegistry::new() {
            Ok(registry) => {
                registry.update(&diagnostic.manager().snapshot());
                match registry.encode() {
                    Ok(output) => print!("{}", output),
                    Err(e) => warn!("Failed to encode metrics: {}", e),
                }
            }
            Err(e) => warn!("Failed to create metrics registry: {}", e),
        }
    }

    if run.report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
