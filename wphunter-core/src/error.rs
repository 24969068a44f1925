//! Error types for the wphunter core.
//!
//! Configuration loading, target file reading, and event emission each have
//! their own `thiserror` enum so callers can tell a bad configuration apart
//! from a failed write.

use std::path::PathBuf;

/// Errors raised while resolving a [`RuntimeConfig`](crate::config::RuntimeConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Targets(#[from] TargetsError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// A merged configuration that violates one of its bounds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error(
        "no targets configured; provide --targets, --targets-file, or set WPHUNTER_TARGETS"
    )]
    NoTargets,

    #[error("threads must be between 1 and {max} (got {got})")]
    ThreadsOutOfRange { got: i64, max: i64 },

    #[error("scan mode must be specified")]
    MissingMode,

    #[error("at least one output format must be specified")]
    NoFormats,

    #[error("output directory cannot be empty")]
    EmptyOutputDir,
}

/// Errors from the target list reader, including its path safety gate.
#[derive(Debug, thiserror::Error)]
pub enum TargetsError {
    #[error("targets file path is empty")]
    EmptyPath,

    #[error("targets file path contains a null byte")]
    NullByte,

    #[error("targets file path exceeds {max} bytes")]
    PathTooLong { max: usize },

    #[error("targets file path escapes its base directory: {}", .0.display())]
    Traversal(PathBuf),

    #[error("targets file path points at a protected system location: {}", .0.display())]
    Denied(PathBuf),

    #[error("failed to read targets file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the NDJSON event emitter.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write event: {0}")]
    Write(#[from] std::io::Error),
}
