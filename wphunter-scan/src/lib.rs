//! # wphunter scan
//!
//! The scan pipeline and the commands around it: driving `wpprobe`,
//! writing artifacts, environment diagnostics, and artifact reports.

pub mod artifacts;
pub mod doctor;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod wpprobe;

pub use doctor::{CheckStatus, Doctor, DoctorCheck};
pub use error::{ReportError, ScanError, ToolError};
pub use orchestrator::{ScanOrchestrator, ScanOutcome};
pub use report::{ReportStats, build_report, write_report_summary};
pub use wpprobe::{ScanInput, ScanTool, WpprobeRunner};
