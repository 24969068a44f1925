//! The scan pipeline.
//!
//! Steps run strictly in order and any hard error aborts the rest:
//! validate, prepare the output directory, materialize targets, announce,
//! check the tool, produce one artifact per format, run detectors, write
//! the summary, announce completion. Detector failures are absorbed into
//! synthetic results and never abort the run.

use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use wphunter_core::{Emitter, Event, RuntimeConfig};
use wphunter_detect::{DetectError, DetectorRegistry, DetectorResult, run_detectors};

use crate::artifacts::{
    ScanSummary, artifact_timestamp, detections_path, generated_at, scan_artifact_path,
    write_detections, write_placeholder, write_summary, write_targets_file,
};
use crate::error::{ScanError, ToolError};
use crate::wpprobe::{ScanInput, ScanTool};

/// What a completed scan produced.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Scan artifacts in format order, followed by the detections file if any.
    pub artifacts: Vec<PathBuf>,
    pub detections: Vec<DetectorResult>,
}

/// Runs one scan against a validated configuration.
pub struct ScanOrchestrator<'a, W> {
    tool: &'a dyn ScanTool,
    registry: &'a DetectorRegistry,
    emitter: &'a Emitter<W>,
}

impl<'a, W: Write + Send> ScanOrchestrator<'a, W> {
    pub fn new(
        tool: &'a dyn ScanTool,
        registry: &'a DetectorRegistry,
        emitter: &'a Emitter<W>,
    ) -> Self {
        Self {
            tool,
            registry,
            emitter,
        }
    }

    pub async fn run(
        &self,
        cfg: &RuntimeConfig,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome, ScanError> {
        cfg.validate()?;

        tokio::fs::create_dir_all(&cfg.output_dir)
            .await
            .map_err(|source| ScanError::Io {
                path: cfg.output_dir.clone(),
                source,
            })?;

        // Removed when dropped, on every return path.
        let targets_file = write_targets_file(&cfg.targets)?;
        debug!(path = %targets_file.display(), "Targets materialized");

        self.emitter.emit(
            Event::new("scan-start")
                .with_message("Starting scan")
                .with_field("targets", cfg.targets.len())
                .with_field("mode", cfg.mode.as_str())
                .with_field("dryRun", cfg.dry_run),
        )?;

        if !cfg.dry_run {
            self.tool.ensure_binary()?;
        }

        let now = Utc::now();
        let timestamp = artifact_timestamp(now);
        let mut outcome = ScanOutcome::default();

        for format in &cfg.formats {
            let format = format.trim().to_lowercase();
            if format.is_empty() {
                continue;
            }
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            let path = scan_artifact_path(&cfg.output_dir, &timestamp, &format);
            if cfg.dry_run {
                write_placeholder(&path, &format, &cfg.targets, now).await?;
            } else {
                let input = ScanInput {
                    targets_file: targets_file.to_path_buf(),
                    mode: cfg.mode.clone(),
                    threads: cfg.threads,
                    output_path: path.clone(),
                };
                match self.tool.scan(cancel, &input).await {
                    Ok(()) => {}
                    Err(ToolError::Cancelled) => return Err(ScanError::Cancelled),
                    Err(e) => return Err(e.into()),
                }
            }

            info!(path = %path.display(), format = %format, "Artifact written");
            self.emitter.emit(
                Event::new("artifact-written")
                    .with_field("path", path.display().to_string())
                    .with_field("format", format.as_str()),
            )?;
            outcome.artifacts.push(path);
        }

        if !cfg.detectors.is_empty() {
            if cfg.dry_run {
                self.emitter.emit(
                    Event::new("detectors-skipped")
                        .with_message("Detectors skipped in dry-run mode")
                        .with_field("detectors", cfg.detectors.clone()),
                )?;
            } else {
                self.run_detection(cfg, cancel, &timestamp, &mut outcome)
                    .await?;
            }
        }

        if let Some(summary_path) = &cfg.summary_file {
            let summary = ScanSummary {
                generated_at: generated_at(Utc::now()),
                targets: &cfg.targets,
                mode: &cfg.mode,
                artifacts: &outcome.artifacts,
                dry_run: cfg.dry_run,
                detectors: &cfg.detectors,
                detections: &outcome.detections,
            };
            write_summary(summary_path, &summary).await?;
            debug!(path = %summary_path.display(), "Summary written");
        }

        self.emitter.emit(
            Event::new("scan-finished")
                .with_message("Scan complete")
                .with_field("artifacts", outcome.artifacts.len()),
        )?;

        Ok(outcome)
    }

    /// Build and run detectors, then persist and announce their results.
    ///
    /// Results gathered before a cancellation are still written before the
    /// cancellation error is returned.
    async fn run_detection(
        &self,
        cfg: &RuntimeConfig,
        cancel: &CancellationToken,
        timestamp: &str,
        outcome: &mut ScanOutcome,
    ) -> Result<(), ScanError> {
        let detectors = self.registry.build(&cfg.detectors)?;
        let run = run_detectors(cancel, &detectors, &cfg.targets).await;

        let path = detections_path(&cfg.output_dir, timestamp);
        write_detections(&path, &run.results).await?;
        self.emitter.emit(
            Event::new("artifact-written")
                .with_field("path", path.display().to_string())
                .with_field("format", "json")
                .with_field("kind", "detections"),
        )?;
        outcome.artifacts.push(path);

        for result in &run.results {
            self.emitter.emit(
                Event::new("detection")
                    .with_message(result.summary.as_str())
                    .with_field("target", result.target.as_str())
                    .with_field("detector", result.detector.as_str())
                    .with_field("severity", result.severity.as_str())
                    .with_field("confidence", Value::from(result.confidence)),
            )?;
        }
        info!(results = run.results.len(), "Detectors finished");
        outcome.detections = run.results;

        match run.error {
            Some(DetectError::Cancelled) => Err(ScanError::Cancelled),
            Some(other) => Err(other.into()),
            None => Ok(()),
        }
    }
}
