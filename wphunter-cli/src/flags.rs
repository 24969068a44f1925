//! Runtime flags shared by `init`, `scan`, and `doctor`.

use std::path::PathBuf;

use clap::Args;
use wphunter_core::{MAX_THREADS, Overrides, parse_detectors, parse_formats, parse_targets_list};

/// Flags that override the config file and environment. Only flags given on
/// the command line become overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct RuntimeFlags {
    /// Comma-separated list of targets
    #[arg(long, value_name = "LIST")]
    pub targets: Option<String>,

    /// File with one target per line (replaces --targets)
    #[arg(long, value_name = "PATH")]
    pub targets_file: Option<PathBuf>,

    /// Scan mode: stealthy, bruteforce, or hybrid
    #[arg(long)]
    pub mode: Option<String>,

    #[arg(
        long,
        allow_negative_numbers = true,
        help = format!("Number of wpprobe threads (1-{MAX_THREADS})")
    )]
    pub threads: Option<i64>,

    /// Directory for scan artifacts
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Comma-separated output formats (json,csv)
    #[arg(long, value_name = "LIST")]
    pub formats: Option<String>,

    /// Comma-separated detectors to run (version)
    #[arg(long, value_name = "LIST")]
    pub detectors: Option<String>,

    /// Skip wpprobe and write placeholder artifacts
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    pub dry_run: Option<bool>,

    /// Write a JSON summary of the run to this path
    #[arg(long, value_name = "PATH")]
    pub summary_file: Option<PathBuf>,
}

impl RuntimeFlags {
    pub fn to_overrides(&self) -> Overrides {
        Overrides {
            targets: self.targets.as_deref().map(parse_targets_list),
            targets_file: self.targets_file.clone(),
            mode: self.mode.clone(),
            threads: self.threads,
            output_dir: self.output_dir.clone(),
            formats: self.formats.as_deref().map(parse_formats),
            detectors: self.detectors.as_deref().map(parse_detectors),
            dry_run: self.dry_run,
            summary_file: self.summary_file.clone(),
        }
    }
}
