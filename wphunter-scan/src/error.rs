//! Error types for the scan pipeline, the wpprobe runner, and reports.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;
use wphunter_core::{EventError, ValidationError};
use wphunter_detect::DetectError;

/// Errors from invoking the external `wpprobe` binary.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("wpprobe binary not found: no executable named {0} on PATH")]
    NotFound(String),

    #[error("failed to start {}: {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} exited with {status}", binary.display())]
    Failed { binary: PathBuf, status: ExitStatus },

    #[error("{} timed out after {secs}s", binary.display())]
    TimedOut { binary: PathBuf, secs: u64 },

    #[error("wpprobe invocation cancelled")]
    Cancelled,

    #[error("I/O error while running wpprobe: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create temporary targets file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported format {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error("scan cancelled")]
    Cancelled,
}

impl ScanError {
    /// Whether the failure comes from configuration rather than execution.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ScanError::Invalid(_) | ScanError::Detect(DetectError::UnknownDetector(_))
        )
    }
}

/// Errors from the `report` command.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("--input is required")]
    MissingInput,

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Event(#[from] EventError),
}
