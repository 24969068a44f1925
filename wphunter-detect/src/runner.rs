//! Sequential detector execution.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::detector::{Detector, DetectorResult};
use crate::error::DetectError;

/// Results of a detector run.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Findings in target-major, detector-minor order.
    pub results: Vec<DetectorResult>,
    /// Set when the run stopped early because `cancel` fired.
    pub error: Option<DetectError>,
}

impl RunOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, Some(DetectError::Cancelled))
    }
}

/// Run every detector against every target, in order.
///
/// A detector error becomes a synthetic `info` result and the loop moves on.
/// Cancellation is checked before each call and raced against the call in
/// flight; on cancellation the results gathered so far are returned together
/// with [`DetectError::Cancelled`], and the interrupted call contributes
/// nothing.
pub async fn run_detectors(
    cancel: &CancellationToken,
    detectors: &[Arc<dyn Detector>],
    targets: &[String],
) -> RunOutcome {
    let mut outcome = RunOutcome::default();
    if detectors.is_empty() || targets.is_empty() {
        return outcome;
    }

    for target in targets {
        for detector in detectors {
            if cancel.is_cancelled() {
                outcome.error = Some(DetectError::Cancelled);
                return outcome;
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = detector.detect(cancel, target) => Some(result),
            };

            // A call that finished while cancellation fired is discarded too.
            let result = match result {
                Some(result) if !cancel.is_cancelled() => result,
                _ => {
                    debug!(target = %target, detector = detector.name(), "Detector run cancelled");
                    outcome.error = Some(DetectError::Cancelled);
                    return outcome;
                }
            };

            match result {
                Ok(found) => outcome.results.push(found),
                Err(e) => {
                    warn!(target = %target, detector = detector.name(), error = %e, "Detector failed");
                    outcome
                        .results
                        .push(DetectorResult::from_error(target, detector.name(), &e));
                }
            }
        }
    }

    outcome
}
