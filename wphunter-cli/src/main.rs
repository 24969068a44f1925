//! wphunter CLI: orchestrates wpprobe scans with layered configuration and
//! in-process detectors.
//!
//! Machine-readable events go to stdout as NDJSON; logs and forwarded
//! wpprobe output go to stderr.

mod commands;
mod flags;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use wphunter_core::DEFAULT_CONFIG_PATH;

use crate::flags::RuntimeFlags;

/// wphunter: worker-friendly orchestration around wpprobe
#[derive(Parser, Debug)]
#[command(name = "wphunter", version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Validate the execution environment and configuration
    Init {
        #[command(flatten)]
        flags: RuntimeFlags,

        /// Pass even when wpprobe is missing
        #[arg(long)]
        skip_wpprobe_check: bool,
    },
    /// Run wpprobe and detectors against the configured targets
    Scan {
        #[command(flatten)]
        flags: RuntimeFlags,
    },
    /// Check dependencies, network reachability, and configuration
    Doctor {
        #[command(flatten)]
        flags: RuntimeFlags,

        /// Upper bound for the network checks, in seconds
        #[arg(long, default_value_t = 30, value_name = "SECONDS")]
        timeout: u64,
    },
    /// Generate aggregate stats from a scan artifact
    Report {
        /// Scan artifact to summarize
        #[arg(long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Also write the stats to this file
        #[arg(long, value_name = "PATH")]
        summary_file: Option<PathBuf>,
    },
    /// Refresh the wpprobe vulnerability database
    Update,
}

fn init_tracing(verbose: u8, json: bool) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    match commands::handle_command(cli.command, &cli.config, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(commands::exit_code(&err))
        }
    }
}
