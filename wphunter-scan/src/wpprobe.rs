//! Driving the external `wpprobe` binary.
//!
//! The orchestrator only relies on the invocation contract: given a targets
//! file, mode, thread count, and output path, `wpprobe scan` writes its
//! results to that path and exits zero. Its output is never parsed; stdout
//! and stderr lines are forwarded to our stderr so the NDJSON stream on
//! stdout stays clean.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ToolError;

/// Default binary name looked up on `PATH`.
pub const WPPROBE_BINARY: &str = "wpprobe";

const VERSION_TIMEOUT: Duration = Duration::from_secs(5);
const HELP_TIMEOUT: Duration = Duration::from_secs(3);

/// One `wpprobe scan` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanInput {
    pub targets_file: PathBuf,
    pub mode: String,
    pub threads: i64,
    pub output_path: PathBuf,
}

impl ScanInput {
    /// Command-line arguments for `wpprobe`.
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "scan".into(),
            "-f".into(),
            self.targets_file.clone().into_os_string(),
            "--mode".into(),
            self.mode.clone().into(),
            "-o".into(),
            self.output_path.clone().into_os_string(),
            "-t".into(),
            self.threads.to_string().into(),
        ]
    }
}

/// Operations the pipeline and the doctor need from the scan tool.
#[async_trait]
pub trait ScanTool: Send + Sync {
    /// Resolve the binary, failing when it is not installed.
    fn ensure_binary(&self) -> Result<PathBuf, ToolError>;

    /// Run one scan to completion.
    async fn scan(&self, cancel: &CancellationToken, input: &ScanInput) -> Result<(), ToolError>;

    /// Refresh the tool's vulnerability database.
    async fn update(&self, cancel: &CancellationToken) -> Result<(), ToolError>;

    /// First line of `--version` output.
    async fn version(&self) -> Result<String, ToolError>;

    /// Confirm the binary executes by running `--help`.
    async fn check_help(&self) -> Result<(), ToolError>;
}

/// Runs the real `wpprobe` binary.
#[derive(Debug, Clone)]
pub struct WpprobeRunner {
    binary: String,
    /// Overrides `PATH` for lookup when set.
    search_path: Option<OsString>,
}

impl WpprobeRunner {
    pub fn new() -> Self {
        Self {
            binary: WPPROBE_BINARY.to_string(),
            search_path: None,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    async fn run_forwarding(
        &self,
        cancel: &CancellationToken,
        args: &[OsString],
    ) -> Result<(), ToolError> {
        let binary = self.ensure_binary()?;
        debug!(binary = %binary.display(), args = ?args, "Running wpprobe");

        let mut child = Command::new(&binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                binary: binary.clone(),
                source,
            })?;

        let forwarders: Vec<_> = [
            child.stdout.take().map(|pipe| tokio::spawn(forward_lines(pipe))),
            child.stderr.take().map(|pipe| tokio::spawn(forward_lines(pipe))),
        ]
        .into_iter()
        .flatten()
        .collect();

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                warn!(binary = %binary.display(), "Cancelling wpprobe");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill wpprobe");
                }
                return Err(ToolError::Cancelled);
            }
        };

        for task in forwarders {
            if let Err(e) = task.await {
                debug!(error = %e, "Output forwarder ended abnormally");
            }
        }

        if !status.success() {
            return Err(ToolError::Failed { binary, status });
        }
        Ok(())
    }

    async fn run_captured(&self, arg: &str, limit: Duration) -> Result<String, ToolError> {
        let binary = self.ensure_binary()?;
        let mut command = Command::new(&binary);
        command.arg(arg).stdin(Stdio::null()).kill_on_drop(true);

        let output = tokio::time::timeout(limit, command.output())
            .await
            .map_err(|_| ToolError::TimedOut {
                binary: binary.clone(),
                secs: limit.as_secs(),
            })?
            .map_err(|source| ToolError::Spawn {
                binary: binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                binary,
                status: output.status,
            });
        }

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            text = String::from_utf8_lossy(&output.stderr).into_owned();
        }
        Ok(text)
    }
}

impl Default for WpprobeRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanTool for WpprobeRunner {
    fn ensure_binary(&self) -> Result<PathBuf, ToolError> {
        let search_path = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"));
        find_executable(&self.binary, search_path.as_deref())
            .ok_or_else(|| ToolError::NotFound(self.binary.clone()))
    }

    async fn scan(&self, cancel: &CancellationToken, input: &ScanInput) -> Result<(), ToolError> {
        info!(
            output = %input.output_path.display(),
            mode = %input.mode,
            threads = input.threads,
            "Starting wpprobe scan"
        );
        self.run_forwarding(cancel, &input.args()).await
    }

    async fn update(&self, cancel: &CancellationToken) -> Result<(), ToolError> {
        info!("Updating wpprobe database");
        self.run_forwarding(cancel, &[OsString::from("update")]).await
    }

    async fn version(&self) -> Result<String, ToolError> {
        let text = self.run_captured("--version", VERSION_TIMEOUT).await?;
        Ok(text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("unknown")
            .to_string())
    }

    async fn check_help(&self) -> Result<(), ToolError> {
        self.run_captured("--help", HELP_TIMEOUT).await.map(|_| ())
    }
}

/// Locate `name` in the directories of `search_path`.
///
/// A name containing a path separator is checked as-is.
pub fn find_executable(name: &str, search_path: Option<&std::ffi::OsStr>) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains(std::path::MAIN_SEPARATOR) {
        let candidate = PathBuf::from(name);
        return is_executable(&candidate).then_some(candidate);
    }
    std::env::split_paths(search_path?)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

async fn forward_lines<R>(pipe: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(pipe).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        eprintln!("{line}");
    }
}
