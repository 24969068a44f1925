//! Environment diagnostics.
//!
//! Every check produces a [`DoctorCheck`]; nothing here aborts early.
//! Network checks share one deadline so a list of slow targets cannot
//! stall the command beyond the configured timeout.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};
use wphunter_core::RuntimeConfig;

use crate::wpprobe::ScanTool;

/// Default bound for all network checks together.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Targets checked before the rest are summarized.
const MAX_NETWORK_CHECKS: usize = 3;
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

impl CheckStatus {
    fn marker(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skipped => "SKIP",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// Outcome of one diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoctorCheck {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DoctorCheck {
    fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Pass,
            detail: detail.into(),
            error: None,
        }
    }

    fn skipped(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Skipped,
            ..Self::pass(name, detail)
        }
    }

    fn fail(name: impl Into<String>, detail: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            status: CheckStatus::Fail,
            error: Some(error.to_string()),
            ..Self::pass(name, detail)
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == CheckStatus::Fail
    }
}

/// Runs the diagnostic checks against a loaded configuration.
pub struct Doctor<'a> {
    tool: &'a dyn ScanTool,
    timeout: Duration,
}

impl<'a> Doctor<'a> {
    pub fn new(tool: &'a dyn ScanTool) -> Self {
        Self {
            tool,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run every check in order. The configuration need not be valid.
    pub async fn run(&self, cfg: &RuntimeConfig) -> Vec<DoctorCheck> {
        let deadline = Instant::now() + self.timeout;
        let mut checks = vec![runtime_check()];

        let binary = self.binary_check(cfg.dry_run).await;
        let binary_ok = !binary.is_failure();
        checks.push(binary);

        if binary_ok && !cfg.dry_run {
            checks.push(self.functionality_check().await);
        }

        if !cfg.targets.is_empty() && !cfg.dry_run {
            checks.extend(network_checks(&cfg.targets, deadline).await);
        }

        checks.push(configuration_check(cfg));
        checks.push(output_directory_check(&cfg.output_dir).await);
        checks
    }

    async fn binary_check(&self, dry_run: bool) -> DoctorCheck {
        const NAME: &str = "wpprobe-binary";
        if dry_run {
            return DoctorCheck::skipped(NAME, "dry-run mode");
        }
        if let Err(e) = self.tool.ensure_binary() {
            return DoctorCheck::fail(NAME, "not found in PATH", e);
        }
        match self.tool.version().await {
            Ok(version) => DoctorCheck::pass(NAME, version),
            Err(e) => {
                debug!(error = %e, "Could not read wpprobe version");
                DoctorCheck::pass(NAME, "available")
            }
        }
    }

    async fn functionality_check(&self) -> DoctorCheck {
        const NAME: &str = "wpprobe-functionality";
        match self.tool.check_help().await {
            Ok(()) => DoctorCheck::pass(NAME, "binary is executable"),
            Err(e) => DoctorCheck::fail(NAME, "binary found but not executable", e),
        }
    }
}

fn runtime_check() -> DoctorCheck {
    DoctorCheck::pass(
        "runtime",
        format!(
            "wphunter {} ({}/{})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        ),
    )
}

/// HEAD each of the first few targets without following redirects.
async fn network_checks(targets: &[String], deadline: Instant) -> Vec<DoctorCheck> {
    let mut checks = Vec::new();

    let client = match reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Failed to create HTTP client");
            return targets
                .iter()
                .take(MAX_NETWORK_CHECKS)
                .map(|target| DoctorCheck::fail(format!("network:{target}"), "unreachable", &e))
                .collect();
        }
    };

    for target in targets.iter().take(MAX_NETWORK_CHECKS) {
        let name = format!("network:{target}");
        let url = match reqwest::Url::parse(target) {
            Ok(url) => url,
            Err(e) => {
                checks.push(DoctorCheck::fail(name, "invalid URL", e));
                continue;
            }
        };

        let check = match tokio::time::timeout_at(deadline, client.head(url).send()).await {
            Ok(Ok(resp)) => DoctorCheck::pass(name, format!("HTTP {}", resp.status().as_u16())),
            Ok(Err(e)) => DoctorCheck::fail(name, "unreachable", e),
            Err(_) => DoctorCheck::fail(name, "unreachable", "deadline exceeded"),
        };
        checks.push(check);
    }

    if targets.len() > MAX_NETWORK_CHECKS {
        checks.push(DoctorCheck::skipped(
            "network",
            format!("({} more targets)", targets.len() - MAX_NETWORK_CHECKS),
        ));
    }
    checks
}

fn configuration_check(cfg: &RuntimeConfig) -> DoctorCheck {
    const NAME: &str = "configuration";
    match cfg.validate() {
        Ok(()) => DoctorCheck::pass(
            NAME,
            format!("{} targets, mode={}", cfg.targets.len(), cfg.mode),
        ),
        Err(e) => DoctorCheck::fail(NAME, "invalid configuration", e),
    }
}

async fn output_directory_check(dir: &Path) -> DoctorCheck {
    const NAME: &str = "output-directory";
    let detail = dir.display().to_string();
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => DoctorCheck::pass(NAME, detail),
        Err(e) => DoctorCheck::fail(NAME, detail, e),
    }
}

/// Print checks as `[STATUS] name: detail`, with failure reasons on `err`.
pub fn print_report(
    checks: &[DoctorCheck],
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<()> {
    writeln!(out, "Running environment diagnostics...")?;
    for check in checks {
        writeln!(out, "[{}] {}: {}", check.status, check.name, check.detail)?;
        if let Some(reason) = &check.error {
            writeln!(err, "  error: {reason}")?;
        }
    }
    if !checks.iter().any(DoctorCheck::is_failure) {
        writeln!(out, "All checks passed. System is ready.")?;
    }
    Ok(())
}
