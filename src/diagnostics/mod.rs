//! Camera diagnostic routine and its report.
//!
//! The routine only observes the host, apart from the single capture
//! acquisition it delegates to [`CaptureManager`](crate::capture::CaptureManager).

mod report;
mod runner;

pub use report::{DiagnosticReport, Outcome};
pub use runner::{Diagnostic, DiagnosticRun};
