//! # wphunter core
//!
//! Configuration resolution, target list reading, and the NDJSON event
//! emitter shared by the scan pipeline and the CLI.

pub mod config;
pub mod error;
pub mod events;
pub mod targets;

// Re-export commonly used types at the crate root.
pub use config::{
    DEFAULT_CONFIG_PATH, EnvSource, Loader, MAX_THREADS, Overrides, RuntimeConfig,
    parse_detectors, parse_formats, parse_targets_list,
};
pub use error::{ConfigError, EventError, TargetsError, ValidationError};
pub use events::{Emitter, Event};
pub use targets::read_targets_file;
