//! CLI subcommand handlers.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;
use wphunter_core::{ConfigError, Emitter, Loader, ValidationError};
use wphunter_detect::DetectorRegistry;
use wphunter_scan::doctor::print_report;
use wphunter_scan::{
    Doctor, DoctorCheck, ReportError, ScanError, ScanOrchestrator, ScanTool, WpprobeRunner,
    build_report, write_report_summary,
};

use crate::Commands;
use crate::flags::RuntimeFlags;

/// Process exit codes.
pub mod exit {
    pub const RUNTIME: u8 = 1;
    pub const CONFIG: u8 = 2;
    pub const REPORT: u8 = 3;
}

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    config_path: &Path,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let loader = Loader::new(config_path);
    match command {
        Commands::Init {
            flags,
            skip_wpprobe_check,
        } => handle_init(&loader, &flags, skip_wpprobe_check).await,
        Commands::Scan { flags } => handle_scan(&loader, &flags, cancel).await,
        Commands::Doctor { flags, timeout } => handle_doctor(&loader, &flags, timeout).await,
        Commands::Report {
            input,
            summary_file,
        } => handle_report(input, summary_file).await,
        Commands::Update => handle_update(cancel).await,
    }
}

/// Map a command failure to the process exit code.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(scan) = err.downcast_ref::<ScanError>() {
        return if scan.is_config_error() {
            exit::CONFIG
        } else {
            exit::RUNTIME
        };
    }
    if err.downcast_ref::<ConfigError>().is_some() || err.downcast_ref::<ValidationError>().is_some()
    {
        return exit::CONFIG;
    }
    if err.downcast_ref::<ReportError>().is_some() {
        return exit::REPORT;
    }
    exit::RUNTIME
}

async fn handle_init(
    loader: &Loader,
    flags: &RuntimeFlags,
    skip_wpprobe_check: bool,
) -> anyhow::Result<()> {
    let cfg = loader.load(&flags.to_overrides())?;
    cfg.validate()?;

    tokio::fs::create_dir_all(&cfg.output_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create output directory {}",
                cfg.output_dir.display()
            )
        })?;

    if !skip_wpprobe_check && !cfg.dry_run {
        let binary = WpprobeRunner::new().ensure_binary()?;
        info!(binary = %binary.display(), "Found wpprobe");
    }

    println!(
        "Environment looks good. Output will be stored in {}",
        cfg.output_dir.display()
    );
    Ok(())
}

async fn handle_scan(
    loader: &Loader,
    flags: &RuntimeFlags,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let cfg = loader.load(&flags.to_overrides())?;

    let runner = WpprobeRunner::new();
    let registry = DetectorRegistry::with_builtins();
    let emitter = Emitter::new(io::stdout());

    let outcome = ScanOrchestrator::new(&runner, &registry, &emitter)
        .run(&cfg, cancel)
        .await?;
    info!(
        artifacts = outcome.artifacts.len(),
        detections = outcome.detections.len(),
        "Scan finished"
    );
    Ok(())
}

async fn handle_doctor(loader: &Loader, flags: &RuntimeFlags, timeout: u64) -> anyhow::Result<()> {
    let cfg = loader
        .load(&flags.to_overrides())
        .context("failed to load configuration")?;

    let runner = WpprobeRunner::new();
    let checks = Doctor::new(&runner)
        .with_timeout(Duration::from_secs(timeout))
        .run(&cfg)
        .await;

    print_report(&checks, &mut io::stdout().lock(), &mut io::stderr().lock())?;
    if checks.iter().any(DoctorCheck::is_failure) {
        anyhow::bail!("doctor checks failed");
    }
    Ok(())
}

async fn handle_report(input: Option<PathBuf>, summary_file: Option<PathBuf>) -> anyhow::Result<()> {
    let input = input
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or(ReportError::MissingInput)?;

    let stats = build_report(&input).await?;
    let emitter = Emitter::new(io::stdout());
    stats.emit(&emitter)?;

    if let Some(path) = summary_file.filter(|p| !p.as_os_str().is_empty()) {
        write_report_summary(&path, &stats).await?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "Summary written to {}", path.display())?;
    }
    Ok(())
}

async fn handle_update(cancel: &CancellationToken) -> anyhow::Result<()> {
    WpprobeRunner::new().update(cancel).await?;
    println!("wpprobe database updated");
    Ok(())
}
