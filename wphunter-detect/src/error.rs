//! Error types for detectors and the detector registry.

use thiserror::Error;

/// Errors from building or running detectors.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("unknown detector: {0}")]
    UnknownDetector(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status code {0}")]
    UnexpectedStatus(u16),

    #[error("version not discovered in generator tag")]
    VersionNotFound,

    #[error("detection cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}
