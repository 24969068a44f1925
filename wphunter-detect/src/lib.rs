//! # wphunter detectors
//!
//! In-process detectors that inspect one target at a time, a registry that
//! builds them by name, and a sequential runner that never lets a single
//! failing detector discard the results of the others.

pub mod detector;
pub mod error;
pub mod registry;
pub mod runner;
pub mod version;

pub use detector::{Detector, DetectorResult, Severity};
pub use error::DetectError;
pub use registry::{DetectorFactory, DetectorRegistry};
pub use runner::{RunOutcome, run_detectors};
pub use version::VersionDetector;
